use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use tracing::debug;

use crontask_core::models::Task;
use crontask_core::TaskExecutionTracker;

/// statm中的数值以页为单位
const PAGE_SIZE: u64 = 4096;

/// 基于单调时钟的执行跟踪器
///
/// 记录每个任务的执行耗时（毫秒），在Linux上同时记录进程常驻内存。
/// 未开启 `tracked` 的任务不做任何记录。
#[derive(Debug, Default)]
pub struct ExecutionTracker {
    started: Mutex<HashMap<String, Instant>>,
}

impl ExecutionTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskExecutionTracker for ExecutionTracker {
    fn start_tracking(&self, task: &Task) {
        if !task.is_tracked() {
            return;
        }
        self.started
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(task.name().to_string(), Instant::now());
    }

    fn end_tracking(&self, task: &mut Task) {
        let started = self
            .started
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(task.name());
        let Some(started) = started else {
            return;
        };

        let elapsed = started.elapsed().as_secs_f64() * 1000.0;
        task.set_execution_computation_time(Some(elapsed));
        if let Some(memory) = resident_memory() {
            task.set_execution_memory_usage(Some(memory));
        }
        debug!("任务 {} 执行耗时 {:.3}ms", task.name(), elapsed);
    }
}

/// 当前进程的常驻内存（字节），无法读取时返回 `None`
fn resident_memory() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(pages * PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracks_computation_time() {
        let tracker = ExecutionTracker::new();
        let mut task = Task::null("foo").unwrap();

        tracker.start_tracking(&task);
        std::thread::sleep(std::time::Duration::from_millis(5));
        tracker.end_tracking(&mut task);

        assert!(task.execution_computation_time().unwrap() >= 5.0);
        if cfg!(target_os = "linux") {
            assert!(task.execution_memory_usage().unwrap() > 0);
        }
    }

    #[test]
    fn test_untracked_task_is_ignored() {
        let tracker = ExecutionTracker::new();
        let mut task = Task::null("foo").unwrap();
        task.set_tracked(false);

        tracker.start_tracking(&task);
        tracker.end_tracking(&mut task);

        assert_eq!(task.execution_computation_time(), None);
        assert_eq!(task.execution_memory_usage(), None);
    }

    #[test]
    fn test_end_without_start_is_noop() {
        let tracker = ExecutionTracker::new();
        let mut task = Task::null("foo").unwrap();

        tracker.end_tracking(&mut task);

        assert_eq!(task.execution_computation_time(), None);
    }
}
