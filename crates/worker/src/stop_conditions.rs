//! 停止条件
//!
//! 以事件监听器的形式实现，满足条件时通过 [`WorkerHandle`] 停止执行器。
//! 执行器会根据 `WorkerOptions` 自动挂载，也可以手动注册到事件分发器。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tracing::info;

use crontask_core::{EventListener, SchedulerEvent};

use crate::worker::WorkerHandle;

/// 执行（含失败）指定数量的任务后停止
#[derive(Debug)]
pub struct StopWorkerOnTaskLimit {
    limit: usize,
    consumed: AtomicUsize,
    handle: WorkerHandle,
}

impl StopWorkerOnTaskLimit {
    pub fn new(limit: usize, handle: WorkerHandle) -> Self {
        Self {
            limit,
            consumed: AtomicUsize::new(0),
            handle,
        }
    }
}

impl EventListener for StopWorkerOnTaskLimit {
    fn on_event(&self, event: &SchedulerEvent) {
        if !matches!(
            event,
            SchedulerEvent::TaskExecuted { .. } | SchedulerEvent::TaskFailed { .. }
        ) {
            return;
        }

        let consumed = self.consumed.fetch_add(1, Ordering::SeqCst) + 1;
        if consumed >= self.limit {
            info!("已执行 {} 个任务，达到上限，停止执行器", consumed);
            self.handle.stop();
        }
    }
}

/// 运行超过指定时长后停止，每个事件都会检查
#[derive(Debug)]
pub struct StopWorkerOnTimeLimit {
    limit: Duration,
    started: Instant,
    handle: WorkerHandle,
}

impl StopWorkerOnTimeLimit {
    pub fn new(limit: Duration, handle: WorkerHandle) -> Self {
        Self {
            limit,
            started: Instant::now(),
            handle,
        }
    }
}

impl EventListener for StopWorkerOnTimeLimit {
    fn on_event(&self, _event: &SchedulerEvent) {
        if self.started.elapsed() >= self.limit && !self.handle.is_stopped() {
            info!("运行时间超过 {:?}，停止执行器", self.limit);
            self.handle.stop();
        }
    }
}

/// 失败指定数量的任务后停止
#[derive(Debug)]
pub struct StopWorkerOnFailureLimit {
    limit: usize,
    failures: AtomicUsize,
    handle: WorkerHandle,
}

impl StopWorkerOnFailureLimit {
    pub fn new(limit: usize, handle: WorkerHandle) -> Self {
        Self {
            limit,
            failures: AtomicUsize::new(0),
            handle,
        }
    }
}

impl EventListener for StopWorkerOnFailureLimit {
    fn on_event(&self, event: &SchedulerEvent) {
        if !matches!(event, SchedulerEvent::TaskFailed { .. }) {
            return;
        }

        let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= self.limit {
            info!("已失败 {} 个任务，停止执行器", failures);
            self.handle.stop();
        }
    }
}
