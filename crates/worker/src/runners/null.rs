use async_trait::async_trait;

use crontask_core::models::{ExecutionState, Output, Task, TaskKind};
use crontask_core::{SchedulerResult, TaskRunner};

use super::succeed;

/// 空任务执行器，总是成功
#[derive(Debug, Default)]
pub struct NullTaskRunner;

impl NullTaskRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TaskRunner for NullTaskRunner {
    fn name(&self) -> &str {
        "null"
    }

    fn support(&self, task: &Task) -> bool {
        matches!(task.kind(), TaskKind::Null)
    }

    async fn run(&self, task: &mut Task) -> SchedulerResult<Output> {
        task.set_execution_state(Some(ExecutionState::Running));
        Ok(succeed(task, None))
    }
}
