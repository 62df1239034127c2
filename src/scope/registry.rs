use std::collections::BTreeMap;

use super::{LOADING_CLASS, connected_scopes, scope_label};
use crate::Result;
use crate::dom::NodeId;
use crate::page::Page;
use crate::runtime_state::TaskKind;
use crate::transport::AbortController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeStatus {
    Loading,
    Loaded,
}

#[derive(Debug)]
pub(crate) struct ScopeState {
    pub(crate) initialized: bool,
    pub(crate) status: ScopeStatus,
    pub(crate) abort_controller: Option<AbortController>,
    pub(crate) debounce_timer: Option<i64>,
}

impl ScopeState {
    fn new() -> Self {
        Self {
            initialized: false,
            status: ScopeStatus::Loading,
            abort_controller: None,
            debounce_timer: None,
        }
    }
}

/// Per-scope runtime state, keyed by the live scope element.
#[derive(Debug, Default)]
pub(crate) struct ScopeRegistry {
    states: BTreeMap<NodeId, ScopeState>,
}

impl ScopeRegistry {
    pub(crate) fn contains(&self, scope: NodeId) -> bool {
        self.states.contains_key(&scope)
    }

    pub(crate) fn get(&self, scope: NodeId) -> Option<&ScopeState> {
        self.states.get(&scope)
    }

    pub(crate) fn get_mut(&mut self, scope: NodeId) -> Option<&mut ScopeState> {
        self.states.get_mut(&scope)
    }

    pub(crate) fn ids(&self) -> Vec<NodeId> {
        self.states.keys().copied().collect()
    }

    fn insert(&mut self, scope: NodeId) {
        self.states.insert(scope, ScopeState::new());
    }

    fn remove(&mut self, scope: NodeId) -> Option<ScopeState> {
        self.states.remove(&scope)
    }
}

impl Page {
    /// Brings the registry in line with the connected tree: scopes that left
    /// are torn down, scopes that appeared are connected in document order.
    pub(crate) fn sync_scopes(&mut self) -> Result<()> {
        let live = connected_scopes(&self.dom);
        for scope in self.scopes.ids() {
            if !live.contains(&scope) {
                self.disconnect_scope(scope);
            }
        }
        for scope in live {
            if !self.scopes.contains(scope) {
                self.connect_scope(scope)?;
            }
        }
        Ok(())
    }

    fn connect_scope(&mut self, scope: NodeId) -> Result<()> {
        self.dom.class_add(scope, LOADING_CLASS)?;
        self.scopes.insert(scope);
        let task_id = self
            .scheduler
            .schedule(0, TaskKind::InitializeScope { scope });
        self.trace_line(format!(
            "[scope] connect {} init_task={task_id}",
            scope_label(&self.dom, scope)
        ));
        Ok(())
    }

    fn disconnect_scope(&mut self, scope: NodeId) {
        let Some(state) = self.scopes.remove(scope) else {
            return;
        };
        if let Some(timer_id) = state.debounce_timer {
            self.scheduler.cancel(timer_id);
        }
        if let Some(controller) = state.abort_controller {
            controller.abort();
        }
        self.listeners.unbind(scope);
        self.trace_line(format!(
            "[scope] disconnect {}",
            scope_label(&self.dom, scope)
        ));
    }

    pub(crate) fn initialize_scope(&mut self, scope: NodeId) -> Result<()> {
        if !self.scopes.contains(scope) {
            return Ok(());
        }
        self.load_content(scope, true)?;
        if let Some(state) = self.scopes.get_mut(scope) {
            state.initialized = true;
        }
        self.trace_line(format!(
            "[scope] created {}",
            scope_label(&self.dom, scope)
        ));
        Ok(())
    }

    /// Sets `src`; an initialized scope reloads from it.
    pub(crate) fn set_scope_src(&mut self, scope: NodeId, src: &str) -> Result<()> {
        self.dom.set_attr(scope, "src", src)?;
        if self.scopes.get(scope).is_some_and(|state| state.initialized) {
            self.load_content(scope, false)?;
        }
        Ok(())
    }
}
