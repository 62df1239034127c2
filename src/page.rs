//! The page: document, virtual clock, transport and the public test API.

use crate::config::{ScopeConfig, ScopeSettings};
use crate::dom::{Dom, NodeId};
use crate::history::{HistoryStack, NavigationState};
use crate::html::parse_html;
use crate::runtime_state::{
    FetchCall, LocationNavigation, LocationState, PendingTimer, PlatformMockState,
    ScheduledTask, SchedulerState, TaskKind, TraceState,
};
use crate::scope::action::{ResolvedAction, resolve_action};
use crate::scope::assets::AssetRegistry;
use crate::scope::events::ListenerStore;
use crate::scope::lifecycle::{LoadCoordinator, LoadOptions};
use crate::scope::registry::{ScopeRegistry, ScopeStatus};
use crate::scope::{connected_scopes, enclosing_scope, is_scope, scope_label};
use crate::transport::{Method, MockResponse, MockTransport, Transport};
use crate::url::{LocationParts, resolve_url};
use crate::{Error, Result};

const DEFAULT_URL: &str = "https://app.test/";

/// Configures and builds a [`Page`].
#[derive(Debug, Default)]
pub struct PageBuilder {
    url: Option<String>,
    html: String,
    config: ScopeConfig,
    transport: Option<Box<dyn Transport>>,
    trace: bool,
}

impl PageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn html(mut self, html: &str) -> Self {
        self.html = html.to_string();
        self
    }

    pub fn config(mut self, config: ScopeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn settings(mut self, settings: ScopeSettings) -> Self {
        self.config.settings = settings;
        self
    }

    /// Replaces the built-in [`MockTransport`]; `set_fetch_*` mocks then have no effect.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }

    pub fn build(self) -> Result<Page> {
        self.config.settings.validate()?;
        let raw_url = self.url.as_deref().unwrap_or(DEFAULT_URL);
        let location = LocationParts::parse(raw_url)
            .ok_or_else(|| Error::InvalidUrl(raw_url.to_string()))?
            .href();
        let dom = parse_html(&self.html)?;
        let mocks = MockTransport::new();
        let transport = self
            .transport
            .unwrap_or_else(|| Box::new(mocks.clone()));
        let trace_state = TraceState {
            enabled: self.trace || self.config.settings.debug,
            ..TraceState::default()
        };

        let mut page = Page {
            dom,
            history: HistoryStack::new(&location),
            location,
            config: self.config,
            transport,
            mocks,
            scheduler: SchedulerState::default(),
            trace_state,
            platform_mocks: PlatformMockState::default(),
            location_state: LocationState::default(),
            scopes: ScopeRegistry::default(),
            listeners: ListenerStore::default(),
            loads: LoadCoordinator::default(),
            assets: AssetRegistry::default(),
        };
        page.sync_scopes()?;
        Ok(page)
    }
}

/// A document hosting `<sco-pe>` elements, driven on a virtual clock.
///
/// Scopes connect when the page is built and initialize on the first task
/// run, so call [`Page::flush`] before interacting.
#[derive(Debug)]
pub struct Page {
    pub(crate) dom: Dom,
    pub(crate) location: String,
    pub(crate) config: ScopeConfig,
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) mocks: MockTransport,
    pub(crate) scheduler: SchedulerState,
    pub(crate) trace_state: TraceState,
    pub(crate) platform_mocks: PlatformMockState,
    pub(crate) location_state: LocationState,
    pub(crate) history: HistoryStack,
    pub(crate) scopes: ScopeRegistry,
    pub(crate) listeners: ListenerStore,
    pub(crate) loads: LoadCoordinator,
    pub(crate) assets: AssetRegistry,
}

impl Page {
    pub fn builder() -> PageBuilder {
        PageBuilder::new()
    }

    pub fn from_html(html: &str) -> Result<Self> {
        PageBuilder::new().html(html).build()
    }

    pub fn from_html_with_url(url: &str, html: &str) -> Result<Self> {
        PageBuilder::new().url(url).html(html).build()
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn title(&self) -> String {
        self.dom.title()
    }

    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    // User actions

    pub fn click(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if self.dom.has_attr(target, "disabled") {
            return Ok(());
        }
        self.dispatch_event(target, "click")?;
        Ok(())
    }

    /// Submits the form at `selector`, or the form owning that element.
    pub fn submit(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let form = self
            .dom
            .closest(target, "form")?
            .ok_or_else(|| Error::Runtime(format!("{selector} is not inside a form")))?;
        self.dispatch_event(form, "submit")?;
        Ok(())
    }

    /// Replaces the control's value and fires `input`.
    pub fn type_text(&mut self, selector: &str, text: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.dom.set_value(target, text)?;
        self.dispatch_event(target, "input")?;
        Ok(())
    }

    /// Sets the control's value without firing events.
    pub fn set_value(&mut self, selector: &str, value: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.dom.set_value(target, value)
    }

    pub fn set_checked(&mut self, selector: &str, checked: bool) -> Result<()> {
        let target = self.select_one(selector)?;
        self.dom.set_checked(target, checked)?;
        self.dispatch_event(target, "change")?;
        Ok(())
    }

    pub fn dispatch(&mut self, selector: &str, event_type: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.dispatch_event(target, event_type)?;
        Ok(())
    }

    /// Sets a scope's `src`, reloading it when initialized.
    pub fn set_src(&mut self, selector: &str, src: &str) -> Result<()> {
        let scope = self.select_scope(selector)?;
        self.set_scope_src(scope, src)
    }

    /// Fetches `url` for the scope at `selector` and returns the body text
    /// without merging it. Supersedes the scope's own pending load.
    pub fn fetch_self(
        &mut self,
        selector: &str,
        url: &str,
        method: Method,
        body: Option<&str>,
    ) -> Result<String> {
        let scope = self.select_scope(selector)?;
        if !self.scopes.contains(scope) {
            return Err(Error::Runtime(format!("{selector} is not connected")));
        }
        self.fetch_scope_text(scope, url, method, body.map(str::to_string))
    }

    /// Removes the element at `selector` from the document.
    pub fn remove(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.dom.remove_node(target);
        self.sync_scopes()
    }

    /// Replaces the inner HTML of `selector`, connecting any new scopes.
    pub fn set_inner_html(&mut self, selector: &str, html: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.dom.set_inner_html(target, html)?;
        self.sync_scopes()
    }

    /// What the trigger at `selector` would request right now.
    pub fn resolve_action(&self, selector: &str) -> Result<ResolvedAction> {
        let trigger = self.select_one(selector)?;
        let scope = enclosing_scope(&self.dom, trigger)
            .ok_or_else(|| Error::Runtime(format!("{selector} is not inside a scope")))?;
        resolve_action(&self.dom, &self.location, scope, trigger)
    }

    pub fn scope_status(&self, selector: &str) -> Result<Option<ScopeStatus>> {
        let scope = self.select_scope(selector)?;
        Ok(self.scopes.get(scope).map(|state| state.status))
    }

    pub fn bound_events(&self, selector: &str) -> Result<Vec<String>> {
        let scope = self.select_scope(selector)?;
        Ok(self.listeners.events(scope))
    }

    pub fn scope_count(&self) -> usize {
        connected_scopes(&self.dom).len()
    }

    // History

    pub fn history_back(&mut self) -> Result<()> {
        self.history_go(-1)
    }

    pub fn history_forward(&mut self) -> Result<()> {
        self.history_go(1)
    }

    /// Moves through session history. An entry pushed by a scope reloads
    /// that scope from the restored URL.
    pub fn history_go(&mut self, delta: i64) -> Result<()> {
        let Some(entry) = self.history.go(delta).cloned() else {
            self.trace_line(format!("[history] go {delta} out of range"));
            return Ok(());
        };
        self.location = entry.url.clone();
        self.trace_line(format!("[history] popstate url={}", entry.url));
        let Some(state) = entry.state.filter(|state| !state.id.is_empty()) else {
            return Ok(());
        };
        let scope = connected_scopes(&self.dom)
            .into_iter()
            .find(|scope| self.dom.attr(*scope, "id") == Some(state.id.as_str()));
        let Some(scope) = scope else {
            self.trace_line(format!("[history] no scope #{} to restore", state.id));
            return Ok(());
        };
        let location = self.location.clone();
        self.load_url(scope, &location, LoadOptions::get())
    }

    pub(crate) fn push_history(&mut self, id: &str, url: &str) {
        self.history.push(
            url,
            Some(NavigationState {
                id: id.to_string(),
                url: url.to_string(),
            }),
        );
        self.location = url.to_string();
        self.trace_line(format!("[history] push #{id} url={url}"));
    }

    // Timers

    pub fn now_ms(&self) -> i64 {
        self.scheduler.now_ms
    }

    pub fn pending_timers(&self) -> Vec<PendingTimer> {
        let mut timers = self
            .scheduler
            .task_queue
            .iter()
            .map(|task| PendingTimer {
                id: task.id,
                due_at: task.due_at,
                order: task.order,
                kind: task.kind.label(),
            })
            .collect::<Vec<_>>();
        timers.sort_by_key(|timer| (timer.due_at, timer.order));
        timers
    }

    pub fn clear_timer(&mut self, timer_id: i64) -> bool {
        let cleared = self.scheduler.cancel(timer_id);
        if cleared {
            for scope in self.scopes.ids() {
                if let Some(state) = self.scopes.get_mut(scope) {
                    if state.debounce_timer == Some(timer_id) {
                        state.debounce_timer = None;
                    }
                }
            }
        }
        self.trace_timer_line(format!("[timer] clear id={timer_id} cleared={cleared}"));
        cleared
    }

    pub fn advance_time(&mut self, delta_ms: i64) -> Result<()> {
        if delta_ms < 0 {
            return Err(Error::Runtime(
                "advance_time requires non-negative milliseconds".into(),
            ));
        }
        let from = self.scheduler.now_ms;
        self.scheduler.now_ms = self.scheduler.now_ms.saturating_add(delta_ms);
        let ran = self.run_timer_queue(Some(self.scheduler.now_ms), false)?;
        self.trace_timer_line(format!(
            "[timer] advance delta_ms={delta_ms} from={from} to={} ran_due={ran}",
            self.scheduler.now_ms
        ));
        Ok(())
    }

    pub fn advance_time_to(&mut self, target_ms: i64) -> Result<()> {
        if target_ms < self.scheduler.now_ms {
            return Err(Error::Runtime(format!(
                "advance_time_to requires target >= now_ms (target={target_ms}, now_ms={})",
                self.scheduler.now_ms
            )));
        }
        let from = self.scheduler.now_ms;
        self.scheduler.now_ms = target_ms;
        let ran = self.run_timer_queue(Some(target_ms), false)?;
        self.trace_timer_line(format!(
            "[timer] advance_to from={from} to={target_ms} ran_due={ran}"
        ));
        Ok(())
    }

    /// Runs every queued task, moving the clock forward as needed.
    pub fn flush(&mut self) -> Result<()> {
        let from = self.scheduler.now_ms;
        let ran = self.run_timer_queue(None, true)?;
        self.trace_timer_line(format!(
            "[timer] flush from={from} to={} ran={ran}",
            self.scheduler.now_ms
        ));
        Ok(())
    }

    pub fn run_next_timer(&mut self) -> Result<bool> {
        let Some(next_idx) = self.scheduler.next_task_index(None) else {
            self.trace_timer_line("[timer] run_next none".into());
            return Ok(false);
        };
        let task = self.scheduler.task_queue.remove(next_idx);
        if task.due_at > self.scheduler.now_ms {
            self.scheduler.now_ms = task.due_at;
        }
        self.execute_task(task)?;
        Ok(true)
    }

    pub fn run_due_timers(&mut self) -> Result<usize> {
        let ran = self.run_timer_queue(Some(self.scheduler.now_ms), false)?;
        self.trace_timer_line(format!(
            "[timer] run_due now_ms={} ran={ran}",
            self.scheduler.now_ms
        ));
        Ok(ran)
    }

    pub fn set_timer_step_limit(&mut self, max_steps: usize) -> Result<()> {
        if max_steps == 0 {
            return Err(Error::Runtime(
                "set_timer_step_limit requires at least 1 step".into(),
            ));
        }
        self.scheduler.timer_step_limit = max_steps;
        Ok(())
    }

    fn run_timer_queue(&mut self, due_limit: Option<i64>, advance_clock: bool) -> Result<usize> {
        let mut steps = 0usize;
        while let Some(next_idx) = self.scheduler.next_task_index(due_limit) {
            steps += 1;
            if steps > self.scheduler.timer_step_limit {
                return Err(Error::Runtime(format!(
                    "task queue exceeded max steps: limit={}, now_ms={}, pending_tasks={}",
                    self.scheduler.timer_step_limit,
                    self.scheduler.now_ms,
                    self.scheduler.task_queue.len()
                )));
            }
            let task = self.scheduler.task_queue.remove(next_idx);
            if advance_clock && task.due_at > self.scheduler.now_ms {
                self.scheduler.now_ms = task.due_at;
            }
            self.execute_task(task)?;
        }
        Ok(steps)
    }

    fn execute_task(&mut self, task: ScheduledTask) -> Result<()> {
        stacker::grow(32 * 1024 * 1024, || self.execute_task_impl(task))
    }

    fn execute_task_impl(&mut self, task: ScheduledTask) -> Result<()> {
        self.trace_timer_line(format!(
            "[timer] run id={} kind={} due_at={} now_ms={}",
            task.id,
            task.kind.label(),
            task.due_at,
            self.scheduler.now_ms
        ));
        match task.kind {
            TaskKind::InitializeScope { scope } => self.initialize_scope(scope),
            TaskKind::DebouncedLoad { scope, trigger } => self.run_debounced_load(scope, trigger),
            TaskKind::ConfirmationSettled {
                scope,
                trigger,
                event_type,
                accepted,
            } => self.settle_confirmation(scope, trigger, &event_type, accepted),
            TaskKind::FetchSettled(pending) => self.complete_fetch(pending),
        }
    }

    // Mocks

    /// Routes `url` (resolved against the location) to a 200 response.
    pub fn set_fetch_mock(&mut self, url: &str, body: &str) {
        self.set_fetch_response(url, MockResponse::ok(body));
    }

    pub fn set_fetch_response(&mut self, url: &str, response: MockResponse) {
        let key = self.mock_key(url);
        self.mocks.route(key, response);
    }

    /// Makes requests to `url` fail with a network error.
    pub fn set_fetch_error(&mut self, url: &str, message: &str) {
        let key = self.mock_key(url);
        self.mocks.fail(key, message);
    }

    pub fn clear_fetch_mocks(&mut self) {
        self.mocks.clear();
    }

    /// Handle to the built-in transport's routes.
    pub fn mock_transport(&self) -> MockTransport {
        self.mocks.clone()
    }

    /// Every request issued so far, including ones later aborted.
    pub fn take_fetch_calls(&mut self) -> Vec<FetchCall> {
        std::mem::take(&mut self.platform_mocks.fetch_calls)
    }

    pub fn enqueue_confirm_response(&mut self, accepted: bool) {
        self.platform_mocks.confirm_responses.push_back(accepted);
    }

    pub fn set_default_confirm_response(&mut self, accepted: bool) {
        self.platform_mocks.default_confirm_response = accepted;
    }

    pub fn take_confirm_messages(&mut self) -> Vec<String> {
        std::mem::take(&mut self.platform_mocks.confirm_messages)
    }

    pub fn take_alert_messages(&mut self) -> Vec<String> {
        std::mem::take(&mut self.platform_mocks.alert_messages)
    }

    pub fn take_location_navigations(&mut self) -> Vec<LocationNavigation> {
        std::mem::take(&mut self.location_state.navigations)
    }

    pub fn reload_count(&self) -> usize {
        self.location_state.reload_count
    }

    /// Ids of inline scripts inserted by merges, oldest first.
    pub fn take_executed_scripts(&mut self) -> Vec<String> {
        std::mem::take(&mut self.platform_mocks.executed_scripts)
    }

    fn mock_key(&self, url: &str) -> String {
        resolve_url(url, &self.location).unwrap_or_else(|_| url.to_string())
    }

    // Assertions

    pub fn assert_text(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.text_content(target);
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual,
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_exists(&self, selector: &str) -> Result<()> {
        let _ = self.select_one(selector)?;
        Ok(())
    }

    pub fn assert_missing(&self, selector: &str) -> Result<()> {
        if let Some(found) = self.dom.query_selector(selector)? {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: "no match".into(),
                actual: "element present".into(),
                dom_snippet: self.node_snippet(found),
            });
        }
        Ok(())
    }

    pub fn count(&self, selector: &str) -> Result<usize> {
        Ok(self.dom.query_selector_all(selector)?.len())
    }

    pub fn text(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(self.dom.text_content(target))
    }

    pub fn dump_dom(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(self.dom.dump_node(target))
    }

    pub(crate) fn select_one(&self, selector: &str) -> Result<NodeId> {
        self.dom
            .query_selector(selector)?
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))
    }

    fn select_scope(&self, selector: &str) -> Result<NodeId> {
        let node = self.select_one(selector)?;
        if !is_scope(&self.dom, node) {
            return Err(Error::Runtime(format!("{selector} is not a scope")));
        }
        Ok(node)
    }

    fn node_snippet(&self, node_id: NodeId) -> String {
        self.dom.dump_node(node_id).chars().take(200).collect()
    }

    pub(crate) fn node_label(&self, node_id: NodeId) -> String {
        if is_scope(&self.dom, node_id) {
            return scope_label(&self.dom, node_id);
        }
        let tag = self.dom.tag_name(node_id).unwrap_or("#node");
        match self.dom.attr(node_id, "id").filter(|id| !id.is_empty()) {
            Some(id) => format!("{tag}#{id}"),
            None => tag.to_string(),
        }
    }

    // Trace

    pub fn enable_trace(&mut self, enabled: bool) {
        self.trace_state.enabled = enabled;
    }

    pub fn take_trace_logs(&mut self) -> Vec<String> {
        self.trace_state.logs.drain(..).collect()
    }

    pub fn set_trace_stderr(&mut self, enabled: bool) {
        self.trace_state.to_stderr = enabled;
    }

    pub fn set_trace_events(&mut self, enabled: bool) {
        self.trace_state.events = enabled;
    }

    pub fn set_trace_timers(&mut self, enabled: bool) {
        self.trace_state.timers = enabled;
    }

    pub fn set_trace_log_limit(&mut self, max_entries: usize) -> Result<()> {
        if max_entries == 0 {
            return Err(Error::Runtime(
                "set_trace_log_limit requires at least 1 entry".into(),
            ));
        }
        self.trace_state.log_limit = max_entries;
        while self.trace_state.logs.len() > self.trace_state.log_limit {
            self.trace_state.logs.pop_front();
        }
        Ok(())
    }

    pub(crate) fn trace_event_line(&mut self, line: String) {
        if self.trace_state.enabled && self.trace_state.events {
            self.trace_line(line);
        }
    }

    pub(crate) fn trace_timer_line(&mut self, line: String) {
        if self.trace_state.enabled && self.trace_state.timers {
            self.trace_line(line);
        }
    }

    pub(crate) fn trace_line(&mut self, line: String) {
        tracing::debug!(target: "fragment_scope", "{line}");
        if self.trace_state.enabled {
            if self.trace_state.to_stderr {
                eprintln!("[sco-pe] {line}");
            }
            if self.trace_state.logs.len() >= self.trace_state.log_limit {
                self.trace_state.logs.pop_front();
            }
            self.trace_state.logs.push_back(line);
        }
    }
}

/// A scope handed to the load hook.
pub struct ScopeView<'a> {
    page: &'a mut Page,
    scope: NodeId,
}

impl<'a> ScopeView<'a> {
    pub(crate) fn new(page: &'a mut Page, scope: NodeId) -> Self {
        Self { page, scope }
    }

    pub fn scope(&self) -> NodeId {
        self.scope
    }

    pub fn id(&self) -> Option<&str> {
        self.page.dom.attr(self.scope, "id")
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.page.dom.attr(self.scope, name)
    }

    pub fn location(&self) -> &str {
        &self.page.location
    }

    pub fn dom(&self) -> &Dom {
        &self.page.dom
    }

    /// Text content of the whole scope.
    pub fn text(&self) -> String {
        self.page.dom.text_content(self.scope)
    }

    /// Elements inside the scope matching `selector`.
    pub fn query(&self, selector: &str) -> Result<Vec<NodeId>> {
        self.page.dom.query_selector_all_from(self.scope, selector)
    }

    pub fn set_text(&mut self, selector: &str, text: &str) -> Result<()> {
        let target = self
            .query(selector)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))?;
        self.page.dom.set_text_content(target, text)
    }

    pub fn set_attr(&mut self, name: &str, value: &str) -> Result<()> {
        self.page.dom.set_attr(self.scope, name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_relative_urls_and_bad_settings() {
        assert!(matches!(
            Page::from_html_with_url("/relative", ""),
            Err(Error::InvalidUrl(_))
        ));
        let settings = ScopeSettings {
            debounce_time: -1,
            ..ScopeSettings::default()
        };
        assert!(matches!(
            Page::builder().settings(settings).build(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn scopes_connect_loading_and_initialize_on_flush() -> Result<()> {
        let mut page = Page::from_html("<sco-pe id='a'><p>static</p></sco-pe>")?;
        assert_eq!(page.scope_status("#a")?, Some(ScopeStatus::Loading));
        assert_eq!(page.pending_timers().len(), 1);
        assert_eq!(page.pending_timers()[0].kind, "initialize");
        page.flush()?;
        assert_eq!(page.scope_status("#a")?, Some(ScopeStatus::Loaded));
        page.assert_exists("sco-pe.scope-loaded:not(.scope-loading)")?;
        assert!(page.take_fetch_calls().is_empty());
        Ok(())
    }

    #[test]
    fn time_controls_validate_arguments() -> Result<()> {
        let mut page = Page::from_html("")?;
        assert!(page.advance_time(-1).is_err());
        page.advance_time(10)?;
        assert!(page.advance_time_to(5).is_err());
        assert!(page.set_timer_step_limit(0).is_err());
        assert!(page.set_trace_log_limit(0).is_err());
        assert_eq!(page.now_ms(), 10);
        Ok(())
    }

    #[test]
    fn trace_log_limit_keeps_newest_lines() -> Result<()> {
        let mut page = Page::builder()
            .html("<sco-pe id='a'></sco-pe><sco-pe id='b'></sco-pe>")
            .trace(true)
            .build()?;
        page.set_trace_stderr(false);
        page.flush()?;
        page.set_trace_log_limit(2)?;
        let logs = page.take_trace_logs();
        assert_eq!(logs.len(), 2);
        assert!(logs[1].starts_with("[timer] flush"));
        Ok(())
    }
}
