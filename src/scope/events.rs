//! Event delegation on scope roots.

use std::collections::{BTreeSet, HashMap};

use super::action::{
    TRIGGER_SELECTOR, document_base, is_anchor, is_external, parse_bool, raw_action,
    watched_events,
};
use super::{enclosing_scope, is_scope, scope_label};
use crate::Result;
use crate::config::Confirmation;
use crate::dom::NodeId;
use crate::page::Page;
use crate::runtime_state::{LocationNavigation, LocationNavigationKind, TaskKind};
use crate::url::{LocationParts, resolve_url};

/// Event types each scope root listens for.
#[derive(Debug, Default)]
pub(crate) struct ListenerStore {
    bound: HashMap<NodeId, BTreeSet<String>>,
}

impl ListenerStore {
    pub(crate) fn bind(&mut self, scope: NodeId, events: impl IntoIterator<Item = String>) {
        self.bound.entry(scope).or_default().extend(events);
    }

    pub(crate) fn unbind(&mut self, scope: NodeId) {
        self.bound.remove(&scope);
    }

    pub(crate) fn is_bound(&self, scope: NodeId, event_type: &str) -> bool {
        self.bound
            .get(&scope)
            .is_some_and(|events| events.contains(event_type))
    }

    pub(crate) fn events(&self, scope: NodeId) -> Vec<String> {
        self.bound
            .get(&scope)
            .map(|events| events.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct EventState {
    pub(crate) event_type: String,
    pub(crate) target: NodeId,
    pub(crate) default_prevented: bool,
}

impl EventState {
    fn new(event_type: &str, target: NodeId) -> Self {
        Self {
            event_type: event_type.to_string(),
            target,
            default_prevented: false,
        }
    }
}

fn is_submit_control(page: &Page, node: NodeId) -> bool {
    let kind = page
        .dom
        .attr(node, "type")
        .map(str::to_ascii_lowercase);
    match page.dom.tag_name(node) {
        Some("button") => kind.as_deref().is_none_or(|kind| kind == "submit"),
        Some("input") => matches!(kind.as_deref(), Some("submit" | "image")),
        _ => false,
    }
}

impl Page {
    /// Bubbles `event_type` from `target` to the root, then runs the
    /// default action unless a scope prevented it.
    pub(crate) fn dispatch_event(&mut self, target: NodeId, event_type: &str) -> Result<EventState> {
        let mut event = EventState::new(event_type, target);
        let mut path = Vec::new();
        let mut cursor = Some(target);
        while let Some(node) = cursor {
            path.push(node);
            cursor = self.dom.parent(node);
        }
        self.trace_event_line(format!(
            "[event] dispatch {event_type} target={}",
            self.node_label(target)
        ));

        for node in path {
            if is_scope(&self.dom, node)
                && self.dom.is_connected(node)
                && self.listeners.is_bound(node, event_type)
            {
                self.handle_scope_event(node, &mut event)?;
            }
        }

        self.trace_event_line(format!(
            "[event] done {event_type} default_prevented={}",
            event.default_prevented
        ));
        if !event.default_prevented {
            self.run_default_action(&event)?;
        }
        Ok(event)
    }

    fn handle_scope_event(&mut self, scope: NodeId, event: &mut EventState) -> Result<()> {
        if enclosing_scope(&self.dom, event.target) != Some(scope) {
            return Ok(());
        }
        if parse_bool(self.dom.attr(scope, "data-disabled")) {
            self.trace_event_line(format!(
                "[event] {} disabled, ignoring {}",
                scope_label(&self.dom, scope),
                event.event_type
            ));
            return Ok(());
        }

        let trigger = if event.event_type == "submit" {
            Some(event.target)
        } else {
            self.dom.closest(event.target, TRIGGER_SELECTOR)?
        };
        let Some(trigger) = trigger else {
            return Ok(());
        };
        if !watched_events(&self.dom, trigger).contains(&event.event_type) {
            return Ok(());
        }

        let Some(action) = raw_action(&self.dom, trigger) else {
            return Ok(());
        };
        let eligible = resolve_url(&action, &document_base(&self.dom, &self.location))
            .ok()
            .filter(|url| !is_external(url, &self.location) && !is_anchor(url) && !is_anchor(&action));
        if eligible.is_none() {
            self.trace_event_line(format!(
                "[event] {} not intercepting {action}",
                scope_label(&self.dom, scope)
            ));
            return Ok(());
        }

        event.default_prevented = true;
        self.trace_event_line(format!(
            "[event] {} handling {} on {}",
            scope_label(&self.dom, scope),
            event.event_type,
            self.node_label(trigger)
        ));

        let confirm = self
            .dom
            .attr(trigger, "data-scope-confirm")
            .filter(|message| !message.is_empty())
            .map(str::to_string);
        match confirm {
            Some(message) => {
                self.request_confirmation(scope, trigger, &event.event_type, &message);
                Ok(())
            }
            None => self.trigger_load(scope, trigger, &event.event_type),
        }
    }

    /// Clicks load immediately; every other event goes through the debounce.
    fn trigger_load(&mut self, scope: NodeId, trigger: NodeId, event_type: &str) -> Result<()> {
        if event_type == "click" {
            self.load(scope, trigger)
        } else {
            self.debounce_load(scope, trigger);
            Ok(())
        }
    }

    fn debounce_load(&mut self, scope: NodeId, trigger: NodeId) {
        let previous = self
            .scopes
            .get_mut(scope)
            .and_then(|state| state.debounce_timer.take());
        if let Some(previous) = previous {
            self.scheduler.cancel(previous);
        }
        let delay_ms = self.config.settings.debounce_time;
        let timer_id = self
            .scheduler
            .schedule(delay_ms, TaskKind::DebouncedLoad { scope, trigger });
        if let Some(state) = self.scopes.get_mut(scope) {
            state.debounce_timer = Some(timer_id);
        }
        self.trace_timer_line(format!(
            "[timer] debounce {} id={timer_id} delay_ms={delay_ms}",
            scope_label(&self.dom, scope)
        ));
    }

    pub(crate) fn run_debounced_load(&mut self, scope: NodeId, trigger: NodeId) -> Result<()> {
        let Some(state) = self.scopes.get_mut(scope) else {
            return Ok(());
        };
        state.debounce_timer = None;
        self.load(scope, trigger)
    }

    fn request_confirmation(&mut self, scope: NodeId, trigger: NodeId, event_type: &str, message: &str) {
        self.platform_mocks.confirm_messages.push(message.to_string());
        let answer = match self.config.confirm_handler.clone() {
            Some(handler) => handler(message),
            None => Confirmation::from(
                self.platform_mocks
                    .confirm_responses
                    .pop_front()
                    .unwrap_or(self.platform_mocks.default_confirm_response),
            ),
        };
        self.scheduler.schedule(
            0,
            TaskKind::ConfirmationSettled {
                scope,
                trigger,
                event_type: event_type.to_string(),
                accepted: answer == Confirmation::Accepted,
            },
        );
        self.trace_event_line(format!("[event] confirm {message:?} answer={answer:?}"));
    }

    pub(crate) fn settle_confirmation(
        &mut self,
        scope: NodeId,
        trigger: NodeId,
        event_type: &str,
        accepted: bool,
    ) -> Result<()> {
        if !accepted || !self.scopes.contains(scope) {
            return Ok(());
        }
        self.trigger_load(scope, trigger, event_type)
    }

    /// Installs `{click, submit}` plus every event named by a
    /// `data-scope-on` descendant.
    pub(crate) fn listen_to_events(&mut self, scope: NodeId) {
        let mut events = vec!["click".to_string(), "submit".to_string()];
        for node in self.dom.descendants(scope) {
            if self.dom.has_attr(node, "data-scope-on") {
                events.extend(watched_events(&self.dom, node));
            }
        }
        self.listeners.bind(scope, events);
    }

    fn run_default_action(&mut self, event: &EventState) -> Result<()> {
        match event.event_type.as_str() {
            "click" => {
                if let Some(link) = self.dom.closest(event.target, "a[href]")? {
                    let href = self.dom.attr(link, "href").unwrap_or_default().to_string();
                    self.navigate(LocationNavigationKind::Assign, &href);
                    return Ok(());
                }
                let control = self.dom.closest(event.target, "button,input")?;
                if let Some(control) = control.filter(|control| is_submit_control(self, *control)) {
                    if let Some(form) = self.dom.closest(control, "form")? {
                        self.dispatch_event(form, "submit")?;
                    }
                }
                Ok(())
            }
            "submit" if self.dom.is_tag(event.target, "form") => {
                let action = self
                    .dom
                    .attr(event.target, "action")
                    .unwrap_or_default()
                    .to_string();
                self.navigate(LocationNavigationKind::Submit, &action);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Records a browser navigation. Only same-document fragment moves
    /// change the location; anything else would unload the page.
    fn navigate(&mut self, kind: LocationNavigationKind, href: &str) {
        let base = document_base(&self.dom, &self.location);
        let Ok(to) = resolve_url(href, &base) else {
            self.trace_line(format!("[history] ignore navigation to {href}"));
            return;
        };
        self.trace_line(format!("[history] navigate {kind:?} to={to}"));
        let same_document = LocationParts::parse(&to)
            .zip(LocationParts::parse(&self.location))
            .is_some_and(|(next, current)| {
                !next.hash.is_empty() && next.without_hash() == current.without_hash()
            });
        self.location_state.navigations.push(LocationNavigation {
            kind,
            from: self.location.clone(),
            to: to.clone(),
        });
        if same_document && kind == LocationNavigationKind::Assign {
            self.location = to;
        }
    }
}
