use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crontask_core::{
    EventDispatcher, LockStore, MessageQueue, SchedulePolicyOrchestrator, SchedulerEvent,
    SchedulerResult, Task, TaskList, TaskMessage, Transport, DEFAULT_POLICY,
};

/// 计算到期任务时使用的锁
pub const DUE_TASKS_LOCK: &str = "crontask.due_tasks";

/// 调度器
///
/// 负责任务的登记与状态管理，并计算当前分钟需要执行的任务。
pub struct Scheduler {
    transport: Arc<dyn Transport>,
    timezone: Tz,
    events: EventDispatcher,
    message_queue: Option<Arc<dyn MessageQueue>>,
    orchestrator: Arc<SchedulePolicyOrchestrator>,
    policy: String,
    due_task_lock: Option<Arc<dyn LockStore>>,
}

impl Scheduler {
    pub fn new(transport: Arc<dyn Transport>, timezone: Tz) -> Self {
        Self {
            transport,
            timezone,
            events: EventDispatcher::new(),
            message_queue: None,
            orchestrator: Arc::new(SchedulePolicyOrchestrator::with_default_policies()),
            policy: DEFAULT_POLICY.to_string(),
            due_task_lock: None,
        }
    }

    pub fn with_event_dispatcher(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    pub fn with_message_queue(mut self, queue: Arc<dyn MessageQueue>) -> Self {
        self.message_queue = Some(queue);
        self
    }

    /// 设置到期任务的排序策略，策略名必须被编排器支持
    pub fn with_policy(
        mut self,
        orchestrator: Arc<SchedulePolicyOrchestrator>,
        policy: &str,
    ) -> SchedulerResult<Self> {
        if !orchestrator.supports(policy) {
            return Err(crontask_core::SchedulerError::Configuration(format!(
                "不支持的调度策略: {policy}"
            )));
        }
        self.orchestrator = orchestrator;
        self.policy = policy.to_string();
        Ok(self)
    }

    pub fn with_due_task_lock(mut self, lock: Arc<dyn LockStore>) -> Self {
        self.due_task_lock = Some(lock);
        self
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    /// 登记任务
    ///
    /// 标记为 `queued` 且配置了消息队列的任务会发布到队列，其余写入Transport。
    pub async fn schedule(&self, mut task: Task) -> SchedulerResult<()> {
        let now = Utc::now();
        task.set_scheduled_at(Some(now));
        if task.arrival_time().is_none() {
            task.set_arrival_time(Some(now));
        }
        if task.timezone().is_none() {
            task.set_timezone(Some(self.timezone));
        }

        match (&self.message_queue, task.is_queued()) {
            (Some(queue), true) => {
                queue.publish(TaskMessage::new(task.clone())).await?;
                info!("任务 {} 已发布到消息队列", task.name());
            }
            (None, true) => {
                warn!("任务 {} 需要异步执行但没有配置消息队列，直接写入存储", task.name());
                self.transport.create(task.clone()).await?;
            }
            _ => {
                self.transport.create(task.clone()).await?;
                info!("任务 {} 已登记", task.name());
            }
        }

        self.events.dispatch(&SchedulerEvent::TaskScheduled { task });
        Ok(())
    }

    pub async fn unschedule(&self, name: &str) -> SchedulerResult<()> {
        self.transport.delete(name).await?;
        info!("任务 {} 已注销", name);
        self.events.dispatch(&SchedulerEvent::TaskUnscheduled {
            name: name.to_string(),
        });
        Ok(())
    }

    pub async fn update(&self, name: &str, task: Task) -> SchedulerResult<()> {
        self.transport.update(name, task.clone()).await?;
        debug!("任务 {} 已更新", name);
        self.events.dispatch(&SchedulerEvent::TaskUpdated { task });
        Ok(())
    }

    pub async fn pause(&self, name: &str) -> SchedulerResult<()> {
        self.transport.pause(name).await?;
        info!("任务 {} 已暂停", name);
        self.events.dispatch(&SchedulerEvent::TaskPaused {
            name: name.to_string(),
        });
        Ok(())
    }

    pub async fn resume(&self, name: &str) -> SchedulerResult<()> {
        self.transport.resume(name).await?;
        info!("任务 {} 已恢复", name);
        self.events.dispatch(&SchedulerEvent::TaskResumed {
            name: name.to_string(),
        });
        Ok(())
    }

    pub async fn get_tasks(&self) -> SchedulerResult<TaskList> {
        self.transport.list().await
    }

    pub async fn get_due_tasks(&self) -> SchedulerResult<TaskList> {
        self.get_due_tasks_at(Utc::now()).await
    }

    /// 计算在 `now` 所在分钟到期的任务，按策略排序
    ///
    /// 配置了锁而锁被占用时返回空列表。
    pub async fn get_due_tasks_at(&self, now: DateTime<Utc>) -> SchedulerResult<TaskList> {
        let Some(lock) = &self.due_task_lock else {
            return self.compute_due_tasks(now).await;
        };

        if !lock.try_acquire(DUE_TASKS_LOCK).await? {
            debug!("到期任务锁被占用，本轮不返回任务");
            return Ok(TaskList::new());
        }

        let result = self.compute_due_tasks(now).await;
        if let Err(e) = lock.release(DUE_TASKS_LOCK).await {
            warn!("释放到期任务锁失败: {}", e);
        }
        result
    }

    async fn compute_due_tasks(&self, now: DateTime<Utc>) -> SchedulerResult<TaskList> {
        let mut tasks = self.transport.list().await?;
        let total = tasks.len();

        tasks.filter(|task| self.is_due(task, now));
        debug!("{} 个任务中有 {} 个到期", total, tasks.len());

        self.orchestrator.sort(&self.policy, tasks)
    }

    fn is_due(&self, task: &Task, now: DateTime<Utc>) -> bool {
        if !task.is_enabled() {
            return false;
        }

        let cron = match task.cron() {
            Ok(cron) => cron,
            Err(e) => {
                warn!("任务 {} 的CRON表达式无效，跳过: {}", task.name(), e);
                return false;
            }
        };

        let timezone = task.timezone().unwrap_or(self.timezone);
        if !cron.matches(&now.with_timezone(&timezone)) {
            return false;
        }

        if task
            .last_execution()
            .is_some_and(|last| same_minute(last, now))
        {
            debug!("任务 {} 在本分钟内已执行过", task.name());
            return false;
        }

        if task.execution_start_date().is_some_and(|start| now < start) {
            debug!("任务 {} 尚未到达执行窗口", task.name());
            return false;
        }
        if task.execution_end_date().is_some_and(|end| now > end) {
            debug!("任务 {} 已超过执行窗口", task.name());
            return false;
        }

        true
    }

    /// 任务的下一次执行时间
    pub async fn next_execution_time(&self, name: &str) -> SchedulerResult<Option<DateTime<Utc>>> {
        let task = self.transport.get(name).await?;
        let timezone = task.timezone().unwrap_or(self.timezone);
        let next = task
            .cron()?
            .next_after(&Utc::now().with_timezone(&timezone))
            .map(|at| at.with_timezone(&Utc));
        Ok(next)
    }
}

fn same_minute(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.timestamp().div_euclid(60) == b.timestamp().div_euclid(60)
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("transport", &self.transport.name())
            .field("timezone", &self.timezone)
            .field("policy", &self.policy)
            .finish()
    }
}
