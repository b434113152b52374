use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crontask_core::models::{ExecutionState, FailedTask, Task};
use crontask_core::{
    EventListener, LockStore, SchedulerError, SchedulerEvent, SchedulerResult,
    TaskExecutionTracker, TaskRunner,
};
use crontask_dispatcher::Scheduler;
use crontask_infrastructure::InMemoryLockStore;

use crate::options::WorkerOptions;
use crate::stop_conditions::{
    StopWorkerOnFailureLimit, StopWorkerOnTaskLimit, StopWorkerOnTimeLimit,
};
use crate::tracker::ExecutionTracker;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 执行器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug)]
struct WorkerState {
    stop_requested: AtomicBool,
    status: Mutex<WorkerStatus>,
    wake: Notify,
}

impl WorkerState {
    fn new() -> Self {
        Self {
            stop_requested: AtomicBool::new(false),
            status: Mutex::new(WorkerStatus::Idle),
            wake: Notify::new(),
        }
    }

    fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        {
            let mut status = lock(&self.status);
            if *status == WorkerStatus::Idle {
                *status = WorkerStatus::Stopped;
            }
        }
        self.wake.notify_one();
    }

    fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    fn status(&self) -> WorkerStatus {
        *lock(&self.status)
    }

    fn set_status(&self, status: WorkerStatus) {
        *lock(&self.status) = status;
    }
}

/// 停止句柄，可以在其他任务或事件监听器中停止执行器
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    state: Arc<WorkerState>,
}

impl WorkerHandle {
    /// 请求停止，执行器在当前任务结束后退出
    pub fn stop(&self) {
        self.state.request_stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.state.is_stop_requested()
    }
}

/// Worker构建器
pub struct WorkerBuilder {
    scheduler: Arc<Scheduler>,
    runners: Vec<Arc<dyn TaskRunner>>,
    tracker: Option<Arc<dyn TaskExecutionTracker>>,
    lock_store: Option<Arc<dyn LockStore>>,
}

impl WorkerBuilder {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self {
            scheduler,
            runners: Vec::new(),
            tracker: None,
            lock_store: None,
        }
    }

    /// 注册任务执行器，先注册的优先匹配
    pub fn register_runner(mut self, runner: Arc<dyn TaskRunner>) -> Self {
        info!("注册任务执行器: {}", runner.name());
        self.runners.push(runner);
        self
    }

    pub fn register_runners<I>(self, runners: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn TaskRunner>>,
    {
        runners
            .into_iter()
            .fold(self, |builder, runner| builder.register_runner(runner))
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn TaskExecutionTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// 单次任务使用的锁，默认为进程内锁
    pub fn with_lock_store(mut self, lock_store: Arc<dyn LockStore>) -> Self {
        self.lock_store = Some(lock_store);
        self
    }

    pub fn build(self) -> Worker {
        Worker {
            scheduler: self.scheduler,
            runners: self.runners,
            tracker: self
                .tracker
                .unwrap_or_else(|| Arc::new(ExecutionTracker::new())),
            lock_store: self
                .lock_store
                .unwrap_or_else(|| Arc::new(InMemoryLockStore::new())),
            state: Arc::new(WorkerState::new()),
            failed_tasks: Mutex::new(Vec::new()),
            last_executed_task: Mutex::new(None),
            options: Mutex::new(WorkerOptions::default()),
        }
    }
}

/// 任务执行器
///
/// 在单个循环里依次执行到期任务：每轮从调度器获取按策略排序的到期任务，
/// 逐个交给第一个支持它的执行器，然后休眠 `sleep_duration_delay` 进入下一轮。
/// 执行结果以事件的形式发送到调度器的事件分发器。
pub struct Worker {
    scheduler: Arc<Scheduler>,
    runners: Vec<Arc<dyn TaskRunner>>,
    tracker: Arc<dyn TaskExecutionTracker>,
    lock_store: Arc<dyn LockStore>,
    state: Arc<WorkerState>,
    failed_tasks: Mutex<Vec<FailedTask>>,
    last_executed_task: Mutex<Option<Task>>,
    options: Mutex<WorkerOptions>,
}

impl Worker {
    pub fn builder(scheduler: Arc<Scheduler>) -> WorkerBuilder {
        WorkerBuilder::new(scheduler)
    }

    /// 运行执行循环，直到被停止或遇到无法继续的错误
    pub async fn execute(&self, options: WorkerOptions) -> SchedulerResult<()> {
        *lock(&self.options) = options.clone();

        if self.state.is_stop_requested() {
            info!("执行器已停止，不再执行任务");
            return Ok(());
        }
        if self.state.status() == WorkerStatus::Running {
            return Err(SchedulerError::Conflict("执行器已经在运行".to_string()));
        }

        let conditions = self.stop_conditions(&options);
        self.state.set_status(WorkerStatus::Running);
        info!("执行器启动，已注册 {} 个任务执行器", self.runners.len());
        self.emit(&SchedulerEvent::WorkerStarted, &conditions);

        match self.run_cycles(&options, &conditions).await {
            Ok(()) => {
                self.state.set_status(WorkerStatus::Stopped);
                info!("执行器已停止");
                self.emit(&SchedulerEvent::WorkerStopped, &conditions);
                Ok(())
            }
            Err(e) => {
                self.state.set_status(WorkerStatus::Idle);
                error!("执行器异常退出: {}", e);
                Err(e)
            }
        }
    }

    async fn run_cycles(
        &self,
        options: &WorkerOptions,
        conditions: &[Arc<dyn EventListener>],
    ) -> SchedulerResult<()> {
        loop {
            if self.state.is_stop_requested() {
                return Ok(());
            }

            let tasks = self.scheduler.get_due_tasks().await?;
            debug!("本轮有 {} 个到期任务", tasks.len());

            for task in tasks {
                self.handle_task(task, conditions).await?;
                if self.state.is_stop_requested() {
                    break;
                }
            }

            self.emit(&SchedulerEvent::WorkerCycleCompleted, conditions);
            if self.state.is_stop_requested() {
                return Ok(());
            }

            self.sleep(options.sleep_duration_delay).await;
        }
    }

    async fn sleep(&self, delay: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.state.wake.notified() => {}
        }
    }

    /// 在循环之外执行单个任务，用于消费异步投递的任务
    pub async fn run_task(&self, task: Task) -> SchedulerResult<()> {
        self.handle_task(task, &[]).await
    }

    async fn handle_task(
        &self,
        mut task: Task,
        conditions: &[Arc<dyn EventListener>],
    ) -> SchedulerResult<()> {
        if !task.is_enabled() {
            info!(
                "任务 {} 已暂停，如需执行请先恢复: expression={}, state={}",
                task.name(),
                task.expression(),
                task.state()
            );
            return Ok(());
        }

        let lock_key = task.is_single_run().then(|| task.name().to_string());
        if let Some(ref key) = lock_key {
            match self.lock_store.try_acquire(key).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!("单次任务 {} 正在其他地方执行，跳过", key);
                    return Ok(());
                }
                Err(e) => {
                    warn!("获取任务锁 {} 失败，跳过: {}", key, e);
                    return Ok(());
                }
            }
        }

        let result = self.execute_task(&mut task, conditions).await;

        if let Some(ref key) = lock_key {
            if let Err(e) = self.lock_store.release(key).await {
                warn!("释放任务锁 {} 失败: {}", key, e);
            }
        }
        result
    }

    async fn execute_task(
        &self,
        task: &mut Task,
        conditions: &[Arc<dyn EventListener>],
    ) -> SchedulerResult<()> {
        let Some(runner) = self.runners.iter().find(|r| r.support(task)).cloned() else {
            error!("没有找到支持任务 {} 的执行器", task.name());
            return Err(SchedulerError::UndefinedRunner {
                name: task.name().to_string(),
            });
        };

        let now = Utc::now();
        task.set_arrival_time(Some(now));
        task.set_execution_start_time(Some(now));

        if let Some(delay) = task.execution_delay().filter(|delay| *delay > 0) {
            debug!("任务 {} 延迟 {}µs 执行", task.name(), delay);
            tokio::time::sleep(Duration::from_micros(delay)).await;
        }

        if let Some(relative) = task.execution_relative_deadline() {
            let deadline = i64::try_from(relative)
                .ok()
                .and_then(chrono::Duration::try_seconds)
                .and_then(|offset| now.checked_add_signed(offset));
            task.set_execution_absolute_deadline(deadline);
        }

        self.tracker.start_tracking(task);
        debug!("使用执行器 {} 执行任务 {}", runner.name(), task.name());

        let outcome = AssertUnwindSafe(runner.run(task)).catch_unwind().await;
        match outcome {
            Ok(Ok(output)) => {
                let end = Utc::now();
                task.set_execution_end_time(Some(end));
                task.set_last_execution(Some(end));
                self.tracker.end_tracking(task);
                *lock(&self.last_executed_task) = Some(task.clone());

                self.persist(task, output.is_success()).await;

                self.emit(
                    &SchedulerEvent::TaskExecuted {
                        task: task.clone(),
                        output,
                    },
                    conditions,
                );
            }
            Ok(Err(e)) => {
                let reason = match e {
                    SchedulerError::TaskExecution(message) => message,
                    other => other.to_string(),
                };
                self.record_failure(task, reason, conditions);
            }
            Err(panic) => {
                task.set_execution_state(Some(ExecutionState::Errored));
                self.record_failure(task, panic_message(panic.as_ref()), conditions);
            }
        }

        Ok(())
    }

    /// 回写执行记录；执行成功的单次任务直接注销
    async fn persist(&self, task: &Task, success: bool) {
        if task.is_queued() {
            return;
        }

        if task.is_single_run() && success {
            if let Err(e) = self.scheduler.unschedule(task.name()).await {
                warn!("注销单次任务 {} 失败: {}", task.name(), e);
            }
            return;
        }

        // 执行期间任务可能被暂停或修改，只把执行记录合并到最新的副本上
        let mut current = match self.scheduler.transport().get(task.name()).await {
            Ok(current) => current,
            Err(e) if e.is_not_found() => {
                debug!("任务 {} 已被注销，不再保存执行记录", task.name());
                return;
            }
            Err(e) => {
                warn!("读取任务 {} 失败，执行记录未保存: {}", task.name(), e);
                return;
            }
        };
        current.merge_execution_record(task);

        if let Err(e) = self.scheduler.update(task.name(), current).await {
            warn!("保存任务 {} 的执行记录失败: {}", task.name(), e);
        }
    }

    fn record_failure(&self, task: &Task, reason: String, conditions: &[Arc<dyn EventListener>]) {
        error!("任务 {} 执行失败: {}", task.name(), reason);

        let failed = FailedTask::new(task.clone(), reason);
        {
            let mut failed_tasks = lock(&self.failed_tasks);
            failed_tasks.retain(|existing| existing.key() != failed.key());
            failed_tasks.push(failed.clone());
        }
        *lock(&self.last_executed_task) = Some(task.clone());

        self.emit(&SchedulerEvent::TaskFailed { failed }, conditions);
    }

    fn stop_conditions(&self, options: &WorkerOptions) -> Vec<Arc<dyn EventListener>> {
        let handle = self.stop_handle();
        let mut conditions: Vec<Arc<dyn EventListener>> = Vec::new();

        if let Some(limit) = options.task_limit {
            conditions.push(Arc::new(StopWorkerOnTaskLimit::new(limit, handle.clone())));
        }
        if let Some(limit) = options.time_limit {
            conditions.push(Arc::new(StopWorkerOnTimeLimit::new(limit, handle.clone())));
        }
        if let Some(limit) = options.failure_limit {
            conditions.push(Arc::new(StopWorkerOnFailureLimit::new(limit, handle)));
        }
        conditions
    }

    fn emit(&self, event: &SchedulerEvent, conditions: &[Arc<dyn EventListener>]) {
        self.scheduler.events().dispatch(event);
        for condition in conditions {
            condition.on_event(event);
        }
    }

    pub fn stop(&self) {
        info!("收到停止请求");
        self.state.request_stop();
    }

    pub fn stop_handle(&self) -> WorkerHandle {
        WorkerHandle {
            state: Arc::clone(&self.state),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.status() == WorkerStatus::Running
    }

    pub fn status(&self) -> WorkerStatus {
        self.state.status()
    }

    pub fn failed_tasks(&self) -> Vec<FailedTask> {
        lock(&self.failed_tasks).clone()
    }

    /// 按 `<name>.failed` 查找失败记录
    pub fn failed_task(&self, key: &str) -> Option<FailedTask> {
        lock(&self.failed_tasks)
            .iter()
            .find(|failed| failed.key() == key)
            .cloned()
    }

    pub fn last_executed_task(&self) -> Option<Task> {
        lock(&self.last_executed_task).clone()
    }

    pub fn options(&self) -> WorkerOptions {
        lock(&self.options).clone()
    }

    pub fn runners(&self) -> &[Arc<dyn TaskRunner>] {
        &self.runners
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let runners: Vec<&str> = self.runners.iter().map(|r| r.name()).collect();
        f.debug_struct("Worker")
            .field("runners", &runners)
            .field("status", &self.status())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "执行器发生panic".to_string()
    }
}
