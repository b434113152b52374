//! 内置任务执行器
//!
//! 每个执行器只处理一种任务类型。执行器在开始前把任务置为 `RUNNING`，
//! 返回前写入终态；任务本身失败时返回 `Output::error`。

pub mod callback;
pub mod chained;
pub mod command;
pub mod http;
pub mod null;
pub mod shell;

pub use callback::{Callback, CallbackTaskRunner};
pub use chained::ChainedTaskRunner;
pub use command::{CommandHandler, CommandTaskRunner};
pub use http::HttpTaskRunner;
pub use null::NullTaskRunner;
pub use shell::ShellTaskRunner;

use std::sync::Arc;

use crontask_core::models::{ExecutionState, Output, Task};
use crontask_core::{SchedulerError, TaskRunner};

pub(crate) fn succeed(task: &mut Task, output: Option<String>) -> Output {
    task.set_execution_state(Some(ExecutionState::Succeed));
    Output::success(task.clone(), output)
}

pub(crate) fn errored(task: &mut Task, output: impl Into<String>) -> Output {
    task.set_execution_state(Some(ExecutionState::Errored));
    Output::error(task.clone(), Some(output.into()))
}

pub(crate) fn unsupported(runner: &str, task: &Task) -> SchedulerError {
    SchedulerError::Internal(format!(
        "执行器 {} 不支持 {} 类型的任务 {}",
        runner,
        task.kind().type_name(),
        task.name()
    ))
}

/// 不依赖外部注册的默认执行器，按注册顺序排列
pub fn default_runners() -> Vec<Arc<dyn TaskRunner>> {
    let basic: Vec<Arc<dyn TaskRunner>> = vec![
        Arc::new(ShellTaskRunner::new()),
        Arc::new(HttpTaskRunner::new()),
        Arc::new(NullTaskRunner::new()),
    ];

    let mut runners = basic.clone();
    runners.push(Arc::new(ChainedTaskRunner::new(basic)));
    runners
}
