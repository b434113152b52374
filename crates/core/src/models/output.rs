use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    Success,
    Error,
}

/// 任务执行结果，创建后不可修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    task: Task,
    output: Option<String>,
    kind: OutputKind,
}

impl Output {
    pub fn success(task: Task, output: Option<String>) -> Self {
        Self {
            task,
            output,
            kind: OutputKind::Success,
        }
    }

    pub fn error(task: Task, output: Option<String>) -> Self {
        Self {
            task,
            output,
            kind: OutputKind::Error,
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn kind(&self) -> OutputKind {
        self.kind
    }

    pub fn is_success(&self) -> bool {
        self.kind == OutputKind::Success
    }
}

/// 执行失败的任务记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTask {
    /// 失败的任务快照
    pub task: Task,
    /// 失败原因
    pub reason: String,
    /// 失败时间
    pub failed_at: DateTime<Utc>,
}

impl FailedTask {
    pub fn new(task: Task, reason: impl Into<String>) -> Self {
        Self {
            task,
            reason: reason.into(),
            failed_at: Utc::now(),
        }
    }

    /// 在失败注册表中的键名
    pub fn key(&self) -> String {
        format!("{}.failed", self.task.name())
    }
}
