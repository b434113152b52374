use async_trait::async_trait;

use crate::SchedulerResult;

/// 互斥锁存储
///
/// `try_acquire` 不阻塞：锁已被占用时立即返回 `false`，调用方应跳过本次操作。
#[async_trait]
pub trait LockStore: Send + Sync {
    async fn try_acquire(&self, key: &str) -> SchedulerResult<bool>;

    async fn release(&self, key: &str) -> SchedulerResult<()>;
}
