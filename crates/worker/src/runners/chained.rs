use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crontask_core::models::{ExecutionState, Output, Task, TaskKind};
use crontask_core::{SchedulerError, SchedulerResult, TaskRunner};

use super::{errored, succeed, unsupported};

/// 链式任务执行器
///
/// 按顺序把子任务交给各自的执行器，遇到第一个失败的子任务即停止。
/// 子任务执行后的状态会写回链式任务。
pub struct ChainedTaskRunner {
    runners: Vec<Arc<dyn TaskRunner>>,
}

impl ChainedTaskRunner {
    pub fn new(runners: Vec<Arc<dyn TaskRunner>>) -> Self {
        Self { runners }
    }

    fn runner_for(&self, task: &Task) -> Option<Arc<dyn TaskRunner>> {
        self.runners.iter().find(|runner| runner.support(task)).cloned()
    }

    fn store_subtask(task: &mut Task, index: usize, subtask: Task) {
        if let TaskKind::Chained(config) = task.kind_mut() {
            if let Some(slot) = config.tasks.get_mut(index) {
                *slot = subtask;
            }
        }
    }
}

impl std::fmt::Debug for ChainedTaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.runners.iter().map(|r| r.name()).collect();
        f.debug_struct("ChainedTaskRunner")
            .field("runners", &names)
            .finish()
    }
}

#[async_trait]
impl TaskRunner for ChainedTaskRunner {
    fn name(&self) -> &str {
        "chained"
    }

    fn support(&self, task: &Task) -> bool {
        matches!(task.kind(), TaskKind::Chained(_))
    }

    async fn run(&self, task: &mut Task) -> SchedulerResult<Output> {
        let TaskKind::Chained(config) = task.kind() else {
            return Err(unsupported(self.name(), task));
        };
        let subtasks = config.tasks.clone();

        task.set_execution_state(Some(ExecutionState::Running));

        let mut outputs = Vec::with_capacity(subtasks.len());
        for (index, mut subtask) in subtasks.into_iter().enumerate() {
            let Some(runner) = self.runner_for(&subtask) else {
                task.set_execution_state(Some(ExecutionState::Errored));
                return Err(SchedulerError::UndefinedRunner {
                    name: subtask.name().to_string(),
                });
            };

            debug!("执行子任务: chain={}, task={}", task.name(), subtask.name());
            let result = runner.run(&mut subtask).await;
            let name = subtask.name().to_string();
            Self::store_subtask(task, index, subtask);

            match result {
                Ok(output) if output.is_success() => {
                    if let Some(text) = output.output() {
                        outputs.push(text.to_string());
                    }
                }
                Ok(output) => {
                    warn!("链式任务 {} 的子任务 {} 执行失败", task.name(), name);
                    let reason = output.output().unwrap_or_default();
                    return Ok(errored(task, format!("子任务 {name} 执行失败: {reason}")));
                }
                Err(e) => {
                    task.set_execution_state(Some(ExecutionState::Errored));
                    return Err(e);
                }
            }
        }

        let output = (!outputs.is_empty()).then(|| outputs.join("\n"));
        Ok(succeed(task, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runners::{CallbackTaskRunner, NullTaskRunner};

    fn runner() -> ChainedTaskRunner {
        let callbacks = CallbackTaskRunner::new()
            .with_callback("hello", |_| Ok("hello".to_string()))
            .with_callback("fail", |_| Err("bad".to_string()));
        ChainedTaskRunner::new(vec![Arc::new(NullTaskRunner::new()), Arc::new(callbacks)])
    }

    fn subtask_state(task: &Task, index: usize) -> Option<ExecutionState> {
        match task.kind() {
            TaskKind::Chained(config) => config.tasks[index].execution_state(),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_runs_every_subtask_in_order() {
        let mut chain = Task::chained(
            "chain",
            vec![
                Task::callback("first", "hello", vec![]).unwrap(),
                Task::null("second").unwrap(),
            ],
        )
        .unwrap();

        let output = runner().run(&mut chain).await.unwrap();

        assert!(output.is_success());
        assert_eq!(output.output(), Some("hello"));
        assert_eq!(chain.execution_state(), Some(ExecutionState::Succeed));
        assert_eq!(subtask_state(&chain, 1), Some(ExecutionState::Succeed));
    }

    #[tokio::test]
    async fn test_stops_at_first_failing_subtask() {
        let mut chain = Task::chained(
            "chain",
            vec![
                Task::callback("broken", "fail", vec![]).unwrap(),
                Task::null("never").unwrap(),
            ],
        )
        .unwrap();

        let output = runner().run(&mut chain).await.unwrap();

        assert!(!output.is_success());
        assert_eq!(chain.execution_state(), Some(ExecutionState::Errored));
        assert_eq!(subtask_state(&chain, 0), Some(ExecutionState::Errored));
        assert_eq!(subtask_state(&chain, 1), None);
    }

    #[tokio::test]
    async fn test_subtask_without_runner_is_undefined() {
        let mut chain =
            Task::chained("chain", vec![Task::shell("ls", ["ls"]).unwrap()]).unwrap();

        let err = runner().run(&mut chain).await.unwrap_err();

        assert!(matches!(err, SchedulerError::UndefinedRunner { ref name } if name == "ls"));
        assert_eq!(chain.execution_state(), Some(ExecutionState::Errored));
    }
}
