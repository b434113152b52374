use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::{debug, info};

use crontask_core::models::{ExecutionState, Output, Task, TaskKind};
use crontask_core::{SchedulerError, SchedulerResult, TaskRunner};

use super::{errored, succeed, unsupported};

/// 已注册命令的处理器
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// 返回 `Err` 表示命令执行失败，内容作为错误输出
    async fn handle(
        &self,
        arguments: &[String],
        options: &BTreeMap<String, String>,
    ) -> Result<String, String>;
}

/// 命令任务执行器，按名称分派到注册的处理器
#[derive(Default)]
pub struct CommandTaskRunner {
    handlers: RwLock<HashMap<String, Arc<dyn CommandHandler>>>,
}

impl CommandTaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, command: impl Into<String>, handler: Arc<dyn CommandHandler>) {
        let command = command.into();
        info!("注册命令: {}", command);
        self.handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(command, handler);
    }

    pub fn with_handler(self, command: impl Into<String>, handler: Arc<dyn CommandHandler>) -> Self {
        self.register(command, handler);
        self
    }

    pub fn commands(&self) -> Vec<String> {
        let mut commands: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        commands.sort();
        commands
    }
}

impl std::fmt::Debug for CommandTaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandTaskRunner")
            .field("commands", &self.commands())
            .finish()
    }
}

#[async_trait]
impl TaskRunner for CommandTaskRunner {
    fn name(&self) -> &str {
        "command"
    }

    fn support(&self, task: &Task) -> bool {
        matches!(task.kind(), TaskKind::Command(_))
    }

    async fn run(&self, task: &mut Task) -> SchedulerResult<Output> {
        let TaskKind::Command(config) = task.kind() else {
            return Err(unsupported(self.name(), task));
        };
        let config = config.clone();

        task.set_execution_state(Some(ExecutionState::Running));

        let handler = self
            .handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&config.command)
            .cloned();
        let Some(handler) = handler else {
            task.set_execution_state(Some(ExecutionState::Errored));
            return Err(SchedulerError::TaskExecution(format!(
                "命令 {} 未注册",
                config.command
            )));
        };

        debug!("执行命令任务: task={}, command={}", task.name(), config.command);
        match handler.handle(&config.arguments, &config.options).await {
            Ok(output) => Ok(succeed(task, Some(output))),
            Err(reason) => Ok(errored(task, reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl CommandHandler for Echo {
        async fn handle(
            &self,
            arguments: &[String],
            options: &BTreeMap<String, String>,
        ) -> Result<String, String> {
            if options.contains_key("fail") {
                return Err("asked to fail".to_string());
            }
            Ok(arguments.join(" "))
        }
    }

    fn command_task(options: &[(&str, &str)]) -> Task {
        let mut task = Task::command("echo", "app:echo").unwrap();
        if let TaskKind::Command(config) = task.kind_mut() {
            config.arguments = vec!["hello".to_string(), "world".to_string()];
            config.options = options
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
        }
        task
    }

    #[tokio::test]
    async fn test_dispatches_to_registered_handler() {
        let runner = CommandTaskRunner::new().with_handler("app:echo", Arc::new(Echo));
        let mut task = command_task(&[]);

        let output = runner.run(&mut task).await.unwrap();

        assert_eq!(output.output(), Some("hello world"));
        assert_eq!(task.execution_state(), Some(ExecutionState::Succeed));
        assert_eq!(runner.commands(), vec!["app:echo"]);
    }

    #[tokio::test]
    async fn test_handler_failure_is_errored_output() {
        let runner = CommandTaskRunner::new().with_handler("app:echo", Arc::new(Echo));
        let mut task = command_task(&[("fail", "1")]);

        let output = runner.run(&mut task).await.unwrap();

        assert!(!output.is_success());
        assert_eq!(task.execution_state(), Some(ExecutionState::Errored));
    }

    #[tokio::test]
    async fn test_unknown_command_is_an_error() {
        let mut task = command_task(&[]);

        let err = CommandTaskRunner::new().run(&mut task).await.unwrap_err();

        assert!(matches!(err, SchedulerError::TaskExecution(_)));
    }
}
