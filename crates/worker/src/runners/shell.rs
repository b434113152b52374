use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crontask_core::models::{ExecutionState, Output, ShellTaskConfig, Task, TaskKind};
use crontask_core::models::task_kind::DEFAULT_SHELL_TIMEOUT_SECONDS;
use crontask_core::{SchedulerError, SchedulerResult, TaskRunner};

use super::{errored, succeed, unsupported};

/// Shell任务执行器
///
/// 直接启动程序而不经过shell解释，`command` 的第一项为程序名。
#[derive(Debug, Default)]
pub struct ShellTaskRunner;

impl ShellTaskRunner {
    pub fn new() -> Self {
        Self
    }

    fn build_command(config: &ShellTaskConfig) -> SchedulerResult<Command> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| SchedulerError::Validation("Shell任务的命令不能为空".to_string()))?;

        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(ref dir) = config.cwd {
            cmd.current_dir(dir);
        }
        cmd.envs(&config.environment_variables);
        Ok(cmd)
    }

    fn spawn_in_background(task: &mut Task, mut cmd: Command) -> Output {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        match cmd.spawn() {
            Ok(mut child) => {
                let name = task.name().to_string();
                tokio::spawn(async move {
                    match child.wait().await {
                        Ok(status) => debug!("后台任务 {} 结束: {}", name, status),
                        Err(e) => warn!("等待后台任务 {} 结束失败: {}", name, e),
                    }
                });

                task.set_execution_state(Some(ExecutionState::Incomplete));
                Output::success(
                    task.clone(),
                    Some("任务在后台运行，无法获取输出".to_string()),
                )
            }
            Err(e) => errored(task, format!("启动Shell命令失败: {e}")),
        }
    }
}

#[async_trait]
impl TaskRunner for ShellTaskRunner {
    fn name(&self) -> &str {
        "shell"
    }

    fn support(&self, task: &Task) -> bool {
        matches!(task.kind(), TaskKind::Shell(_))
    }

    async fn run(&self, task: &mut Task) -> SchedulerResult<Output> {
        let TaskKind::Shell(config) = task.kind() else {
            return Err(unsupported(self.name(), task));
        };
        let config = config.clone();
        let mut cmd = Self::build_command(&config)?;

        task.set_execution_state(Some(ExecutionState::Running));
        info!("执行Shell任务: task={}, command={:?}", task.name(), config.command);

        if task.is_background() {
            return Ok(Self::spawn_in_background(task, cmd));
        }

        let timeout = config.timeout.unwrap_or(DEFAULT_SHELL_TIMEOUT_SECONDS);
        let limit = Duration::try_from_secs_f64(timeout).map_err(|e| {
            SchedulerError::Validation(format!("Shell任务超时时间无效 {timeout}: {e}"))
        })?;

        cmd.stdin(Stdio::null()).kill_on_drop(true);
        let output = match tokio::time::timeout(limit, cmd.output()).await {
            Err(_) => {
                warn!("Shell任务 {} 执行超时 ({}s)", task.name(), timeout);
                return Ok(errored(task, format!("命令执行超时 ({timeout}s)")));
            }
            Ok(Err(e)) => return Ok(errored(task, format!("启动Shell命令失败: {e}"))),
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            info!(
                "Shell任务执行失败: task={}, exit_code={:?}",
                task.name(),
                output.status.code()
            );
            return Ok(errored(task, String::from_utf8_lossy(&output.stderr)));
        }

        let stdout = task
            .has_output()
            .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string());
        info!("Shell任务执行完成: task={}", task.name());
        Ok(succeed(task, stdout))
    }
}
