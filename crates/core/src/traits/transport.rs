//! 任务存储层接口定义
//!
//! `Transport` 是任务持久化的统一抽象，调度器只通过它读写任务。
//!
//! ## 错误约定
//!
//! - 领域错误（`TaskNotFound`、`Conflict`、`Validation`）原样返回
//! - 后端故障统一包装为 `SchedulerError::Transport`，并保留底层原因
//!
//! 组合Transport（故障转移、轮询、长尾）只关心成功与失败，
//! 任何错误都会让它们尝试下一个后端或直接报告传输层错误。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use crontask_core::traits::Transport;
//!
//! async fn pause_backup(transport: &dyn Transport) -> SchedulerResult<()> {
//!     transport.pause("backup").await?;
//!     let task = transport.get("backup").await?;
//!     assert!(!task.is_enabled());
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;

use crate::models::{Task, TaskList};
use crate::SchedulerResult;

/// 任务存储抽象接口
#[async_trait]
pub trait Transport: Send + Sync {
    /// 按名称获取任务，不存在时返回 `TaskNotFound`
    async fn get(&self, name: &str) -> SchedulerResult<Task>;

    /// 获取全部任务的快照
    async fn list(&self) -> SchedulerResult<TaskList>;

    /// 创建任务，同名任务已存在时返回 `Conflict`
    async fn create(&self, task: Task) -> SchedulerResult<()>;

    /// 用新的任务定义替换名为 `name` 的任务
    async fn update(&self, name: &str, task: Task) -> SchedulerResult<()>;

    /// 删除任务，不存在时返回 `TaskNotFound`
    async fn delete(&self, name: &str) -> SchedulerResult<()>;

    /// 暂停任务，已暂停时返回 `Conflict`
    async fn pause(&self, name: &str) -> SchedulerResult<()>;

    /// 恢复任务，已启用时返回 `Conflict`
    async fn resume(&self, name: &str) -> SchedulerResult<()>;

    /// 清空全部任务
    async fn clear(&self) -> SchedulerResult<()>;

    /// 用于日志的Transport名称
    fn name(&self) -> &str;
}
