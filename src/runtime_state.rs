use std::collections::VecDeque;

use crate::dom::NodeId;
use crate::scope::lifecycle::PendingFetch;
use crate::transport::Method;

#[derive(Debug)]
pub(crate) struct SchedulerState {
    pub(crate) now_ms: i64,
    pub(crate) next_task_id: i64,
    pub(crate) next_task_order: i64,
    pub(crate) task_queue: Vec<ScheduledTask>,
    pub(crate) timer_step_limit: usize,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self {
            now_ms: 0,
            next_task_id: 1,
            next_task_order: 0,
            task_queue: Vec::new(),
            timer_step_limit: 10_000,
        }
    }
}

impl SchedulerState {
    pub(crate) fn schedule(&mut self, delay_ms: i64, kind: TaskKind) -> i64 {
        let id = self.next_task_id;
        self.next_task_id += 1;
        let order = self.next_task_order;
        self.next_task_order += 1;
        self.task_queue.push(ScheduledTask {
            id,
            due_at: self.now_ms.saturating_add(delay_ms.max(0)),
            order,
            kind,
        });
        id
    }

    pub(crate) fn cancel(&mut self, task_id: i64) -> bool {
        let before = self.task_queue.len();
        self.task_queue.retain(|task| task.id != task_id);
        before != self.task_queue.len()
    }

    pub(crate) fn next_task_index(&self, due_limit: Option<i64>) -> Option<usize> {
        self.task_queue
            .iter()
            .enumerate()
            .filter(|(_, task)| due_limit.is_none_or(|limit| task.due_at <= limit))
            .min_by_key(|(_, task)| (task.due_at, task.order))
            .map(|(idx, _)| idx)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ScheduledTask {
    pub(crate) id: i64,
    pub(crate) due_at: i64,
    pub(crate) order: i64,
    pub(crate) kind: TaskKind,
}

#[derive(Debug, Clone)]
pub(crate) enum TaskKind {
    InitializeScope {
        scope: NodeId,
    },
    DebouncedLoad {
        scope: NodeId,
        trigger: NodeId,
    },
    ConfirmationSettled {
        scope: NodeId,
        trigger: NodeId,
        event_type: String,
        accepted: bool,
    },
    FetchSettled(PendingFetch),
}

impl TaskKind {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            TaskKind::InitializeScope { .. } => "initialize",
            TaskKind::DebouncedLoad { .. } => "debounce",
            TaskKind::ConfirmationSettled { .. } => "confirm",
            TaskKind::FetchSettled(_) => "fetch",
        }
    }
}

/// Snapshot of a queued task, ordered by `(due_at, order)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTimer {
    pub id: i64,
    pub due_at: i64,
    pub order: i64,
    pub kind: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationNavigationKind {
    /// Default action of an unintercepted link.
    Assign,
    /// Default action of an unintercepted form submission.
    Submit,
    Reload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationNavigation {
    pub kind: LocationNavigationKind,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    pub method: Method,
    pub url: String,
    pub body: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct PlatformMockState {
    pub(crate) fetch_calls: Vec<FetchCall>,
    pub(crate) alert_messages: Vec<String>,
    pub(crate) confirm_messages: Vec<String>,
    pub(crate) confirm_responses: VecDeque<bool>,
    pub(crate) default_confirm_response: bool,
    pub(crate) executed_scripts: Vec<String>,
}

#[derive(Debug, Default)]
pub(crate) struct LocationState {
    pub(crate) navigations: Vec<LocationNavigation>,
    pub(crate) reload_count: usize,
}

#[derive(Debug)]
pub(crate) struct TraceState {
    pub(crate) enabled: bool,
    pub(crate) events: bool,
    pub(crate) timers: bool,
    pub(crate) logs: VecDeque<String>,
    pub(crate) log_limit: usize,
    pub(crate) to_stderr: bool,
}

impl Default for TraceState {
    fn default() -> Self {
        Self {
            enabled: false,
            events: true,
            timers: true,
            logs: VecDeque::new(),
            log_limit: 10_000,
            to_stderr: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_task_prefers_due_time_then_insertion_order() {
        let mut scheduler = SchedulerState::default();
        let late = scheduler.schedule(10, TaskKind::InitializeScope { scope: NodeId(1) });
        let first = scheduler.schedule(0, TaskKind::InitializeScope { scope: NodeId(2) });
        let second = scheduler.schedule(0, TaskKind::InitializeScope { scope: NodeId(3) });

        let order = std::iter::from_fn(|| {
            let idx = scheduler.next_task_index(None)?;
            Some(scheduler.task_queue.remove(idx).id)
        })
        .collect::<Vec<_>>();
        assert_eq!(order, vec![first, second, late]);
    }

    #[test]
    fn due_limit_hides_future_tasks() {
        let mut scheduler = SchedulerState::default();
        let id = scheduler.schedule(5, TaskKind::InitializeScope { scope: NodeId(1) });
        assert_eq!(scheduler.next_task_index(Some(4)), None);
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
    }
}
