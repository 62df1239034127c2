//! Issuing, superseding and completing scope loads.

use super::action::{ResolvedAction, TriggerKind, document_base, resolve_action};
use super::merge::HeaderOutcome;
use super::registry::ScopeStatus;
use super::{LOADED_CLASS, LOADING_CLASS, scope_label};
use crate::dom::NodeId;
use crate::page::{Page, ScopeView};
use crate::runtime_state::{FetchCall, TaskKind};
use crate::transport::{AbortController, AbortSignal, Method, Request, TransportError};
use crate::url::resolve_url;
use crate::{Error, Result};

/// Holds the page-wide token shared by untargeted loads.
#[derive(Debug, Default)]
pub(crate) struct LoadCoordinator {
    global: Option<AbortController>,
}

impl LoadCoordinator {
    /// Aborts the previous untargeted load and hands out a fresh signal.
    pub(crate) fn begin_global(&mut self) -> AbortSignal {
        if let Some(previous) = self.global.take() {
            previous.abort();
        }
        let controller = AbortController::new();
        let signal = controller.signal();
        self.global = Some(controller);
        signal
    }
}

#[derive(Debug, Clone)]
pub(crate) struct LoadOptions {
    pub(crate) method: Method,
    pub(crate) body: Option<String>,
    /// Scope-local signal; `None` joins the page-wide token.
    pub(crate) signal: Option<AbortSignal>,
    /// Run `after_load` once the response has been merged.
    pub(crate) settle: bool,
}

impl LoadOptions {
    pub(crate) fn get() -> Self {
        Self {
            method: Method::Get,
            body: None,
            signal: None,
            settle: false,
        }
    }
}

/// A request waiting on the virtual clock.
#[derive(Debug, Clone)]
pub(crate) struct PendingFetch {
    pub(crate) scope: NodeId,
    pub(crate) request: Request,
    pub(crate) settle: bool,
}

impl Page {
    /// Loads `src` into the scope. With `skip_prerendered`, a scope that
    /// already has content keeps it.
    pub(crate) fn load_content(&mut self, scope: NodeId, skip_prerendered: bool) -> Result<()> {
        let src = self
            .dom
            .attr(scope, "src")
            .map(str::trim)
            .filter(|src| !src.is_empty())
            .map(str::to_string);
        let prerendered = skip_prerendered && !self.dom.is_node_empty(scope);
        let Some(src) = src.filter(|_| !prerendered) else {
            return self.after_load(scope);
        };

        let url = resolve_url(&src, &document_base(&self.dom, &self.location))?;
        let signal = self.begin_scope_load(scope);
        self.load_url(
            scope,
            &url,
            LoadOptions {
                signal: Some(signal),
                settle: true,
                ..LoadOptions::get()
            },
        )
    }

    /// Aborts the scope-local load in flight and hands out a fresh signal.
    fn begin_scope_load(&mut self, scope: NodeId) -> AbortSignal {
        let controller = AbortController::new();
        let signal = controller.signal();
        if let Some(previous) = self
            .scopes
            .get_mut(scope)
            .and_then(|state| state.abort_controller.replace(controller))
        {
            previous.abort();
            self.trace_line(format!(
                "[fetch] abort previous load for {}",
                scope_label(&self.dom, scope)
            ));
        }
        signal
    }

    /// Fetches `url` on the scope's own token and returns the body unmerged.
    /// The request completes immediately instead of waiting on the clock.
    pub(crate) fn fetch_scope_text(
        &mut self,
        scope: NodeId,
        url: &str,
        method: Method,
        body: Option<String>,
    ) -> Result<String> {
        let url = resolve_url(url, &document_base(&self.dom, &self.location))?;
        let request = Request {
            url,
            method,
            body,
            signal: self.begin_scope_load(scope),
        };
        self.platform_mocks.fetch_calls.push(FetchCall {
            method: request.method.clone(),
            url: request.url.clone(),
            body: request.body.clone(),
        });
        self.trace_line(format!(
            "[fetch] fetch_self {} {} scope={}",
            request.method,
            request.url,
            scope_label(&self.dom, scope)
        ));
        match self.transport.fetch(&request) {
            Ok(response) => Ok(response.body),
            Err(TransportError::Network(message)) => Err(Error::Transport {
                url: request.url,
                message,
            }),
            Err(err @ TransportError::Aborted) => Err(Error::Transport {
                url: request.url,
                message: err.to_string(),
            }),
        }
    }

    /// Handles an intercepted trigger for `scope`.
    pub(crate) fn load(&mut self, scope: NodeId, trigger: NodeId) -> Result<()> {
        if !self.scopes.contains(scope) || !self.dom.is_connected(trigger) {
            return Ok(());
        }
        let action = match resolve_action(&self.dom, &self.location, scope, trigger) {
            Ok(action) => action,
            Err(err) => {
                self.trace_line(format!(
                    "[scope] {} skip load: {err}",
                    scope_label(&self.dom, scope)
                ));
                return Ok(());
            }
        };

        if let Some(target) = &action.target {
            let Some(target_scope) = self.dom.by_id(target) else {
                self.trace_line(format!("[scope] missing target #{target}"));
                return Ok(());
            };
            self.trace_line(format!(
                "[scope] delegate {} to #{target}",
                action.full_url
            ));
            return self.set_scope_src(target_scope, &action.full_url);
        }

        if action.push_history {
            if let Some(id) = self.dom.attr(scope, "id").map(str::to_string) {
                self.push_history(&id, &action.url);
            }
        }
        if action.kind == TriggerKind::Link {
            self.mark_active_link(scope, trigger)?;
        }
        let ResolvedAction {
            request_url,
            method,
            body,
            ..
        } = action;
        self.load_url(
            scope,
            &request_url,
            LoadOptions {
                method,
                body,
                ..LoadOptions::get()
            },
        )
    }

    fn mark_active_link(&mut self, scope: NodeId, link: NodeId) -> Result<()> {
        let active_class = self.config.settings.active_class.clone();
        for node in self.dom.descendants(scope) {
            if self.dom.class_contains(node, &active_class) {
                self.dom.class_remove(node, &active_class)?;
            }
        }
        self.dom.class_add(link, &active_class)
    }

    /// Queues a fetch for `scope`; it completes after the transport's latency.
    pub(crate) fn load_url(&mut self, scope: NodeId, url: &str, options: LoadOptions) -> Result<()> {
        let signal = match options.signal {
            Some(signal) => signal,
            None => self.loads.begin_global(),
        };
        let request = Request {
            url: url.to_string(),
            method: options.method,
            body: options.body,
            signal,
        };
        self.platform_mocks.fetch_calls.push(FetchCall {
            method: request.method.clone(),
            url: request.url.clone(),
            body: request.body.clone(),
        });
        let delay_ms = self.transport.latency_ms(&request);
        self.trace_line(format!(
            "[fetch] issue {} {} scope={} delay_ms={delay_ms}",
            request.method,
            request.url,
            scope_label(&self.dom, scope)
        ));
        self.scheduler.schedule(
            delay_ms,
            TaskKind::FetchSettled(PendingFetch {
                scope,
                request,
                settle: options.settle,
            }),
        );
        Ok(())
    }

    pub(crate) fn complete_fetch(&mut self, pending: PendingFetch) -> Result<()> {
        let PendingFetch {
            scope,
            request,
            settle,
        } = pending;
        if request.signal.aborted() {
            self.trace_line(format!("[fetch] discard aborted {}", request.url));
            return Ok(());
        }
        let response = match self.transport.fetch(&request) {
            Ok(response) => response,
            Err(TransportError::Aborted) => {
                self.trace_line(format!("[fetch] discard aborted {}", request.url));
                return Ok(());
            }
            Err(TransportError::Network(message)) => {
                self.trace_line(format!("[fetch] failed {} {message}", request.url));
                return Err(Error::Transport {
                    url: request.url,
                    message,
                });
            }
        };
        self.trace_line(format!(
            "[fetch] settle {} status={} bytes={}",
            request.url,
            response.status,
            response.body.len()
        ));

        if self.process_headers(&response)? == HeaderOutcome::Reload {
            return Ok(());
        }
        let settled = self.process_response(scope, &response.body)?;
        if settle && !settled && self.scopes.contains(scope) {
            self.after_load(scope)?;
        }
        Ok(())
    }

    pub(crate) fn after_load(&mut self, scope: NodeId) -> Result<()> {
        self.listen_to_events(scope);

        let active_class = self.config.settings.active_class.clone();
        let base = document_base(&self.dom, &self.location);
        let current = self
            .dom
            .descendants(scope)
            .into_iter()
            .filter(|node| self.dom.is_tag(*node, "a"))
            .filter(|node| {
                self.dom
                    .attr(*node, "href")
                    .and_then(|href| resolve_url(href, &base).ok())
                    .is_some_and(|url| url == self.location)
            })
            .collect::<Vec<_>>();
        for anchor in current {
            self.dom.class_add(anchor, &active_class)?;
        }

        if let Some(hook) = self.config.on_load.clone() {
            let mut view = ScopeView::new(self, scope);
            hook(&mut view)?;
        }

        self.dom.class_remove(scope, LOADING_CLASS)?;
        self.dom.class_add(scope, LOADED_CLASS)?;
        if let Some(state) = self.scopes.get_mut(scope) {
            state.status = ScopeStatus::Loaded;
        }
        self.trace_line(format!(
            "[scope] loaded {}",
            scope_label(&self.dom, scope)
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_a_global_load_aborts_the_previous_one() {
        let mut coordinator = LoadCoordinator::default();
        let first = coordinator.begin_global();
        let second = coordinator.begin_global();
        assert!(first.aborted());
        assert!(!second.aborted());
    }
}
