use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crontask_core::{MessageQueue, SchedulerError, SchedulerResult, TaskMessage};

/// 内存消息队列实现
///
/// 使用 Tokio channel 在进程内投递任务消息，适用于单进程部署和测试。
#[derive(Debug)]
pub struct InMemoryMessageQueue {
    sender: mpsc::UnboundedSender<TaskMessage>,
    receiver: Mutex<mpsc::UnboundedReceiver<TaskMessage>>,
    /// 队列大小统计
    size: AtomicUsize,
}

impl InMemoryMessageQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            size: AtomicUsize::new(0),
        }
    }
}

impl Default for InMemoryMessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    async fn publish(&self, message: TaskMessage) -> SchedulerResult<()> {
        let name = message.task.name().to_string();
        self.sender
            .send(message)
            .map_err(|e| SchedulerError::Internal(format!("发布消息失败: {e}")))?;
        self.size.fetch_add(1, Ordering::SeqCst);
        debug!("发布任务消息: {}", name);
        Ok(())
    }

    async fn consume(&self) -> SchedulerResult<Option<TaskMessage>> {
        let mut receiver = self.receiver.lock().await;
        match receiver.try_recv() {
            Ok(message) => {
                self.size.fetch_sub(1, Ordering::SeqCst);
                Ok(Some(message))
            }
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                Err(SchedulerError::Internal("消息队列已关闭".to_string()))
            }
        }
    }

    async fn len(&self) -> SchedulerResult<usize> {
        Ok(self.size.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crontask_core::Task;

    #[tokio::test]
    async fn test_publish_and_consume_in_order() {
        let queue = InMemoryMessageQueue::new();
        queue
            .publish(TaskMessage::new(Task::null("a").unwrap()))
            .await
            .unwrap();
        queue
            .publish(TaskMessage::new(Task::null("b").unwrap()))
            .await
            .unwrap();

        assert_eq!(queue.len().await.unwrap(), 2);
        assert_eq!(queue.consume().await.unwrap().unwrap().task.name(), "a");
        assert_eq!(queue.consume().await.unwrap().unwrap().task.name(), "b");
        assert!(queue.consume().await.unwrap().is_none());
        assert_eq!(queue.len().await.unwrap(), 0);
    }
}
