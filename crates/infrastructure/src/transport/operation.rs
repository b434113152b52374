use crontask_core::{SchedulerError, SchedulerResult, Task, TaskList, Transport};

/// 组合Transport转发给后端的操作
#[derive(Debug, Clone)]
pub enum TransportOperation {
    Get(String),
    List,
    Create(Task),
    Update(String, Task),
    Delete(String),
    Pause(String),
    Resume(String),
    Clear,
}

/// 操作结果
#[derive(Debug, Clone)]
pub enum TransportReply {
    Task(Task),
    List(TaskList),
    Done,
}

impl TransportOperation {
    pub fn name(&self) -> &'static str {
        match self {
            TransportOperation::Get(_) => "get",
            TransportOperation::List => "list",
            TransportOperation::Create(_) => "create",
            TransportOperation::Update(..) => "update",
            TransportOperation::Delete(_) => "delete",
            TransportOperation::Pause(_) => "pause",
            TransportOperation::Resume(_) => "resume",
            TransportOperation::Clear => "clear",
        }
    }

    /// 在指定后端上执行操作
    pub async fn apply(&self, transport: &dyn Transport) -> SchedulerResult<TransportReply> {
        match self {
            TransportOperation::Get(name) => transport.get(name).await.map(TransportReply::Task),
            TransportOperation::List => transport.list().await.map(TransportReply::List),
            TransportOperation::Create(task) => transport
                .create(task.clone())
                .await
                .map(|_| TransportReply::Done),
            TransportOperation::Update(name, task) => transport
                .update(name, task.clone())
                .await
                .map(|_| TransportReply::Done),
            TransportOperation::Delete(name) => {
                transport.delete(name).await.map(|_| TransportReply::Done)
            }
            TransportOperation::Pause(name) => {
                transport.pause(name).await.map(|_| TransportReply::Done)
            }
            TransportOperation::Resume(name) => {
                transport.resume(name).await.map(|_| TransportReply::Done)
            }
            TransportOperation::Clear => transport.clear().await.map(|_| TransportReply::Done),
        }
    }
}

impl TransportReply {
    pub fn into_task(self) -> SchedulerResult<Task> {
        match self {
            TransportReply::Task(task) => Ok(task),
            other => Err(unexpected(&other)),
        }
    }

    pub fn into_list(self) -> SchedulerResult<TaskList> {
        match self {
            TransportReply::List(list) => Ok(list),
            other => Err(unexpected(&other)),
        }
    }

    pub fn into_done(self) -> SchedulerResult<()> {
        match self {
            TransportReply::Done => Ok(()),
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(reply: &TransportReply) -> SchedulerError {
    let kind = match reply {
        TransportReply::Task(_) => "task",
        TransportReply::List(_) => "list",
        TransportReply::Done => "done",
    };
    SchedulerError::Internal(format!("Transport返回了意外的结果类型: {kind}"))
}

/// 为提供 `execute(TransportOperation)` 的组合Transport实现 `Transport`
macro_rules! composite_transport {
    ($ty:ty) => {
        #[async_trait::async_trait]
        impl crontask_core::Transport for $ty {
            async fn get(&self, name: &str) -> crontask_core::SchedulerResult<crontask_core::Task> {
                self.execute($crate::transport::TransportOperation::Get(name.to_string()))
                    .await?
                    .into_task()
            }

            async fn list(&self) -> crontask_core::SchedulerResult<crontask_core::TaskList> {
                self.execute($crate::transport::TransportOperation::List)
                    .await?
                    .into_list()
            }

            async fn create(&self, task: crontask_core::Task) -> crontask_core::SchedulerResult<()> {
                self.execute($crate::transport::TransportOperation::Create(task))
                    .await?
                    .into_done()
            }

            async fn update(
                &self,
                name: &str,
                task: crontask_core::Task,
            ) -> crontask_core::SchedulerResult<()> {
                self.execute($crate::transport::TransportOperation::Update(
                    name.to_string(),
                    task,
                ))
                .await?
                .into_done()
            }

            async fn delete(&self, name: &str) -> crontask_core::SchedulerResult<()> {
                self.execute($crate::transport::TransportOperation::Delete(name.to_string()))
                    .await?
                    .into_done()
            }

            async fn pause(&self, name: &str) -> crontask_core::SchedulerResult<()> {
                self.execute($crate::transport::TransportOperation::Pause(name.to_string()))
                    .await?
                    .into_done()
            }

            async fn resume(&self, name: &str) -> crontask_core::SchedulerResult<()> {
                self.execute($crate::transport::TransportOperation::Resume(name.to_string()))
                    .await?
                    .into_done()
            }

            async fn clear(&self) -> crontask_core::SchedulerResult<()> {
                self.execute($crate::transport::TransportOperation::Clear)
                    .await?
                    .into_done()
            }

            fn name(&self) -> &str {
                &self.name
            }
        }
    };
}

pub(crate) use composite_transport;
