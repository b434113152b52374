use std::sync::Arc;

use tracing::{debug, info};

use crontask_core::{MessageQueue, SchedulerResult, TaskMessage};

use crate::worker::Worker;

/// 异步任务消息处理器
///
/// 执行器空闲时直接执行消息中的任务；执行器正在运行时把消息重新投递回队列。
pub struct TaskMessageHandler {
    worker: Arc<Worker>,
    queue: Arc<dyn MessageQueue>,
}

impl TaskMessageHandler {
    pub fn new(worker: Arc<Worker>, queue: Arc<dyn MessageQueue>) -> Self {
        Self { worker, queue }
    }

    pub async fn handle(&self, message: TaskMessage) -> SchedulerResult<()> {
        if self.worker.is_running() {
            debug!("执行器正在运行，任务 {} 重新投递", message.task.name());
            return self.queue.publish(message.redelivered()).await;
        }

        debug!("处理任务消息: id={}, task={}", message.id, message.task.name());
        self.worker.run_task(message.task).await
    }

    /// 处理当前队列中的消息，返回处理的数量
    ///
    /// 只处理调用时已在队列中的消息，处理过程中重新投递的消息留到下次。
    pub async fn consume_pending(&self) -> SchedulerResult<usize> {
        let pending = self.queue.len().await?;
        let mut handled = 0;

        for _ in 0..pending {
            let Some(message) = self.queue.consume().await? else {
                break;
            };
            self.handle(message).await?;
            handled += 1;
        }

        if handled > 0 {
            info!("处理了 {} 条任务消息", handled);
        }
        Ok(handled)
    }
}

impl std::fmt::Debug for TaskMessageHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskMessageHandler")
            .field("worker", &self.worker)
            .finish()
    }
}
