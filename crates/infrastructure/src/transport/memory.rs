use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crontask_core::{
    SchedulePolicyOrchestrator, SchedulerError, SchedulerResult, Task, TaskList, Transport,
    DEFAULT_POLICY,
};

/// 内存Transport
///
/// 任务保存在进程内，`list()` 返回按配置策略排序后的快照。
pub struct InMemoryTransport {
    name: String,
    tasks: RwLock<TaskList>,
    policy: String,
    orchestrator: Arc<SchedulePolicyOrchestrator>,
}

impl InMemoryTransport {
    pub fn new(policy: &str, orchestrator: Arc<SchedulePolicyOrchestrator>) -> SchedulerResult<Self> {
        if !orchestrator.supports(policy) {
            return Err(SchedulerError::Configuration(format!(
                "不支持的调度策略: {policy}"
            )));
        }

        Ok(Self {
            name: format!("memory://{policy}"),
            tasks: RwLock::new(TaskList::new()),
            policy: policy.to_string(),
            orchestrator,
        })
    }

    pub fn policy(&self) -> &str {
        &self.policy
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self {
            name: format!("memory://{DEFAULT_POLICY}"),
            tasks: RwLock::new(TaskList::new()),
            policy: DEFAULT_POLICY.to_string(),
            orchestrator: Arc::new(SchedulePolicyOrchestrator::with_default_policies()),
        }
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn get(&self, name: &str) -> SchedulerResult<Task> {
        self.tasks
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| SchedulerError::not_found(name))
    }

    async fn list(&self) -> SchedulerResult<TaskList> {
        let snapshot = self.tasks.read().await.clone();
        self.orchestrator.sort(&self.policy, snapshot)
    }

    async fn create(&self, task: Task) -> SchedulerResult<()> {
        let mut tasks = self.tasks.write().await;
        debug!("内存Transport创建任务: {}", task.name());
        tasks.push(task)
    }

    async fn update(&self, name: &str, task: Task) -> SchedulerResult<()> {
        self.tasks.write().await.replace(name, task)?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> SchedulerResult<()> {
        self.tasks
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| SchedulerError::not_found(name))
    }

    async fn pause(&self, name: &str) -> SchedulerResult<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(name)
            .ok_or_else(|| SchedulerError::not_found(name))?;
        task.pause()
    }

    async fn resume(&self, name: &str) -> SchedulerResult<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(name)
            .ok_or_else(|| SchedulerError::not_found(name))?;
        task.resume()
    }

    async fn clear(&self) -> SchedulerResult<()> {
        self.tasks.write().await.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_create_get_delete() {
        let transport = InMemoryTransport::default();
        transport.create(Task::null("foo").unwrap()).await.unwrap();

        assert_eq!(transport.get("foo").await.unwrap().name(), "foo");
        assert!(transport
            .create(Task::null("foo").unwrap())
            .await
            .unwrap_err()
            .is_conflict());

        transport.delete("foo").await.unwrap();
        assert!(transport.get("foo").await.unwrap_err().is_not_found());
        assert!(transport.delete("foo").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_pause_resume_conflicts() {
        let transport = InMemoryTransport::default();
        transport.create(Task::null("foo").unwrap()).await.unwrap();

        transport.pause("foo").await.unwrap();
        assert!(transport.pause("foo").await.unwrap_err().is_conflict());
        assert!(!transport.get("foo").await.unwrap().is_enabled());

        transport.resume("foo").await.unwrap();
        assert!(transport.resume("foo").await.unwrap_err().is_conflict());
        assert!(transport.pause("bar").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_sorted_by_policy() {
        let orchestrator = Arc::new(SchedulePolicyOrchestrator::with_default_policies());
        let transport = InMemoryTransport::new("batch", orchestrator).unwrap();

        let mut low = Task::null("low").unwrap();
        low.set_priority(-5).unwrap();
        let mut high = Task::null("high").unwrap();
        high.set_priority(50).unwrap();
        let mut older = Task::null("older").unwrap();
        older.set_scheduled_at(Some(Utc::now() - Duration::hours(1)));

        for task in [low, older, high] {
            transport.create(task).await.unwrap();
        }

        assert_eq!(transport.list().await.unwrap().names(), vec!["high", "older", "low"]);
    }

    #[tokio::test]
    async fn test_unknown_policy_is_rejected() {
        let orchestrator = Arc::new(SchedulePolicyOrchestrator::with_default_policies());
        assert!(InMemoryTransport::new("random", orchestrator).is_err());
    }

    #[tokio::test]
    async fn test_update_and_clear() {
        let transport = InMemoryTransport::default();
        transport.create(Task::null("foo").unwrap()).await.unwrap();

        let mut updated = Task::null("foo").unwrap();
        updated.set_expression("0 * * * *").unwrap();
        transport.update("foo", updated).await.unwrap();
        assert_eq!(transport.get("foo").await.unwrap().expression(), "0 * * * *");
        assert!(transport
            .update("bar", Task::null("bar").unwrap())
            .await
            .unwrap_err()
            .is_not_found());

        transport.clear().await.unwrap();
        assert!(transport.list().await.unwrap().is_empty());
    }
}
