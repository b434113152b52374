use async_trait::async_trait;

use crate::models::TaskMessage;
use crate::SchedulerResult;

/// 消息队列抽象接口
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// 发布任务消息
    async fn publish(&self, message: TaskMessage) -> SchedulerResult<()>;

    /// 取出一条消息，队列为空时返回 `None`
    async fn consume(&self) -> SchedulerResult<Option<TaskMessage>>;

    /// 获取队列中的消息数量
    async fn len(&self) -> SchedulerResult<usize>;
}
