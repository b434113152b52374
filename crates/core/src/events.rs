use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::models::{FailedTask, Output, Task};

/// 调度与执行过程中产生的事件
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    TaskScheduled { task: Task },
    TaskUnscheduled { name: String },
    TaskUpdated { task: Task },
    TaskPaused { name: String },
    TaskResumed { name: String },
    TaskExecuted { task: Task, output: Output },
    TaskFailed { failed: FailedTask },
    WorkerStarted,
    WorkerCycleCompleted,
    WorkerStopped,
}

impl SchedulerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SchedulerEvent::TaskScheduled { .. } => "task_scheduled",
            SchedulerEvent::TaskUnscheduled { .. } => "task_unscheduled",
            SchedulerEvent::TaskUpdated { .. } => "task_updated",
            SchedulerEvent::TaskPaused { .. } => "task_paused",
            SchedulerEvent::TaskResumed { .. } => "task_resumed",
            SchedulerEvent::TaskExecuted { .. } => "task_executed",
            SchedulerEvent::TaskFailed { .. } => "task_failed",
            SchedulerEvent::WorkerStarted => "worker_started",
            SchedulerEvent::WorkerCycleCompleted => "worker_cycle_completed",
            SchedulerEvent::WorkerStopped => "worker_stopped",
        }
    }
}

/// 事件监听器，同步回调
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &SchedulerEvent);
}

impl<F> EventListener for F
where
    F: Fn(&SchedulerEvent) + Send + Sync,
{
    fn on_event(&self, event: &SchedulerEvent) {
        self(event)
    }
}

/// 事件分发器
///
/// 克隆后共享同一组监听器，监听器可以在运行中追加。
#[derive(Clone, Default)]
pub struct EventDispatcher {
    listeners: Arc<RwLock<Vec<Arc<dyn EventListener>>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        listeners.push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// 按注册顺序通知所有监听器
    pub fn dispatch(&self, event: &SchedulerEvent) {
        // 先复制一份，回调里可以继续注册监听器
        let listeners: Vec<Arc<dyn EventListener>> = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        debug!("分发事件 {} 给 {} 个监听器", event.name(), listeners.len());
        for listener in listeners {
            listener.on_event(event);
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_dispatch_in_registration_order() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            let seen = Arc::clone(&seen);
            dispatcher.add_listener(Arc::new(move |event: &SchedulerEvent| {
                seen.lock().unwrap().push(format!("{id}:{}", event.name()));
            }));
        }

        dispatcher.dispatch(&SchedulerEvent::WorkerStarted);

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["0:worker_started", "1:worker_started", "2:worker_started"]
        );
    }

    #[test]
    fn test_clones_share_listeners() {
        let dispatcher = EventDispatcher::new();
        let clone = dispatcher.clone();

        clone.add_listener(Arc::new(|_: &SchedulerEvent| {}));

        assert_eq!(dispatcher.listener_count(), 1);
    }
}
