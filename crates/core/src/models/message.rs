use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Task;
use crate::SchedulerResult;

/// 异步投递的任务消息
///
/// 被标记为 `queued` 的任务在调度时不写入Transport，
/// 而是包装成消息发布到消息队列，由执行端消费执行。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    /// 消息ID
    pub id: String,
    /// 待执行的任务
    pub task: Task,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 被重新投递的次数
    #[serde(default)]
    pub redeliveries: u32,
}

impl TaskMessage {
    pub fn new(task: Task) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task,
            created_at: Utc::now(),
            redeliveries: 0,
        }
    }

    /// 重新投递时递增计数
    pub fn redelivered(mut self) -> Self {
        self.redeliveries += 1;
        self
    }

    pub fn serialize(&self) -> SchedulerResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn deserialize(payload: &str) -> SchedulerResult<Self> {
        let message: TaskMessage = serde_json::from_str(payload)?;
        message.task.validate()?;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serialization() {
        let message = TaskMessage::new(Task::null("foo").unwrap()).redelivered();
        let restored = TaskMessage::deserialize(&message.serialize().unwrap()).unwrap();

        assert_eq!(restored, message);
        assert_eq!(restored.redeliveries, 1);
        assert!(TaskMessage::deserialize("not json").is_err());
    }
}
