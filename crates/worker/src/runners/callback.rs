use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crontask_core::models::{ExecutionState, Output, Task, TaskKind};
use crontask_core::{SchedulerError, SchedulerResult, TaskRunner};

use super::{errored, succeed, unsupported};

/// 进程内回调，返回 `Err` 表示任务失败
pub type Callback = Arc<dyn Fn(&[Value]) -> Result<String, String> + Send + Sync>;

/// 回调任务执行器
///
/// 任务里只保存回调名称，实际函数需要事先注册到执行器。
#[derive(Default)]
pub struct CallbackTaskRunner {
    callbacks: RwLock<HashMap<String, Callback>>,
}

impl CallbackTaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册回调，同名回调会被覆盖
    pub fn register<F>(&self, name: impl Into<String>, callback: F)
    where
        F: Fn(&[Value]) -> Result<String, String> + Send + Sync + 'static,
    {
        let name = name.into();
        info!("注册回调: {}", name);
        self.callbacks
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name, Arc::new(callback));
    }

    pub fn with_callback<F>(self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&[Value]) -> Result<String, String> + Send + Sync + 'static,
    {
        self.register(name, callback);
        self
    }

    fn lookup(&self, name: &str) -> Option<Callback> {
        self.callbacks
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
    }
}

impl std::fmt::Debug for CallbackTaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let callbacks = self
            .callbacks
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f.debug_struct("CallbackTaskRunner")
            .field("callbacks", &callbacks.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl TaskRunner for CallbackTaskRunner {
    fn name(&self) -> &str {
        "callback"
    }

    fn support(&self, task: &Task) -> bool {
        matches!(task.kind(), TaskKind::Callback(_))
    }

    async fn run(&self, task: &mut Task) -> SchedulerResult<Output> {
        let TaskKind::Callback(config) = task.kind() else {
            return Err(unsupported(self.name(), task));
        };
        let config = config.clone();

        task.set_execution_state(Some(ExecutionState::Running));

        let Some(callback) = self.lookup(&config.callback) else {
            task.set_execution_state(Some(ExecutionState::Errored));
            return Err(SchedulerError::TaskExecution(format!(
                "回调 {} 未注册",
                config.callback
            )));
        };

        debug!("执行回调任务: task={}, callback={}", task.name(), config.callback);
        match callback(&config.arguments) {
            Ok(output) => Ok(succeed(task, Some(output.trim().to_string()))),
            Err(reason) => Ok(errored(task, reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn runner() -> CallbackTaskRunner {
        CallbackTaskRunner::new()
            .with_callback("sum", |args| {
                let total: i64 = args.iter().filter_map(Value::as_i64).sum();
                Ok(total.to_string())
            })
            .with_callback("fail", |_| Err("nope".to_string()))
    }

    #[tokio::test]
    async fn test_registered_callback_runs_with_arguments() {
        let mut task = Task::callback("sum", "sum", vec![json!(1), json!(2), json!(3)]).unwrap();

        let output = runner().run(&mut task).await.unwrap();

        assert!(output.is_success());
        assert_eq!(output.output(), Some("6"));
        assert_eq!(task.execution_state(), Some(ExecutionState::Succeed));
    }

    #[tokio::test]
    async fn test_callback_failure_is_errored_output() {
        let mut task = Task::callback("fail", "fail", vec![]).unwrap();

        let output = runner().run(&mut task).await.unwrap();

        assert!(!output.is_success());
        assert_eq!(output.output(), Some("nope"));
        assert_eq!(task.execution_state(), Some(ExecutionState::Errored));
    }

    #[tokio::test]
    async fn test_unregistered_callback_is_an_error() {
        let mut task = Task::callback("missing", "missing", vec![]).unwrap();

        let err = runner().run(&mut task).await.unwrap_err();

        assert!(matches!(err, SchedulerError::TaskExecution(_)));
        assert_eq!(task.execution_state(), Some(ExecutionState::Errored));
    }
}
