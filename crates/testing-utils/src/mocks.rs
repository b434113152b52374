//! Mock implementations of the collaborator traits
//!
//! In-memory, scriptable stand-ins used by unit and integration tests
//! without touching a real backend.

use async_trait::async_trait;
use crontask_core::models::{ExecutionState, Output, Task, TaskList};
use crontask_core::{
    EventListener, SchedulerError, SchedulerEvent, SchedulerResult, TaskRunner, Transport,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mock implementation of Transport with scripted failures and call recording
#[derive(Debug, Clone)]
pub struct MockTransport {
    name: String,
    tasks: Arc<Mutex<TaskList>>,
    calls: Arc<Mutex<Vec<String>>>,
    failures_remaining: Arc<AtomicUsize>,
    always_fail: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tasks: Arc::new(Mutex::new(TaskList::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            failures_remaining: Arc::new(AtomicUsize::new(0)),
            always_fail: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_tasks(name: &str, tasks: Vec<Task>) -> Self {
        let transport = Self::new(name);
        *transport.tasks.lock().unwrap() = tasks.into_iter().collect();
        transport
    }

    /// Fail the next `count` calls, then behave normally
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Fail every call from now on
    pub fn fail_always(&self) {
        self.always_fail.store(true, Ordering::SeqCst);
    }

    pub fn recover(&self) {
        self.always_fail.store(false, Ordering::SeqCst);
        self.failures_remaining.store(0, Ordering::SeqCst);
    }

    /// Recorded calls as `operation` or `operation:name`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls excluding `list`, which composite transports use for bookkeeping
    pub fn operation_count(&self) -> usize {
        self.calls().iter().filter(|call| *call != "list").count()
    }

    pub fn count(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    pub fn names(&self) -> Vec<String> {
        self.tasks.lock().unwrap().names()
    }

    fn record(&self, call: String) -> SchedulerResult<()> {
        self.calls.lock().unwrap().push(call);

        if self.always_fail.load(Ordering::SeqCst) {
            return Err(SchedulerError::transport(format!("{} is down", self.name)));
        }
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(SchedulerError::transport(format!("{} is down", self.name)));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, name: &str) -> SchedulerResult<Task> {
        self.record(format!("get:{name}"))?;
        self.tasks
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| SchedulerError::not_found(name))
    }

    async fn list(&self) -> SchedulerResult<TaskList> {
        self.record("list".to_string())?;
        Ok(self.tasks.lock().unwrap().clone())
    }

    async fn create(&self, task: Task) -> SchedulerResult<()> {
        self.record(format!("create:{}", task.name()))?;
        self.tasks.lock().unwrap().push(task)
    }

    async fn update(&self, name: &str, task: Task) -> SchedulerResult<()> {
        self.record(format!("update:{name}"))?;
        self.tasks.lock().unwrap().replace(name, task).map(|_| ())
    }

    async fn delete(&self, name: &str) -> SchedulerResult<()> {
        self.record(format!("delete:{name}"))?;
        self.tasks
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| SchedulerError::not_found(name))
    }

    async fn pause(&self, name: &str) -> SchedulerResult<()> {
        self.record(format!("pause:{name}"))?;
        let mut tasks = self.tasks.lock().unwrap();
        tasks
            .get_mut(name)
            .ok_or_else(|| SchedulerError::not_found(name))?
            .pause()
    }

    async fn resume(&self, name: &str) -> SchedulerResult<()> {
        self.record(format!("resume:{name}"))?;
        let mut tasks = self.tasks.lock().unwrap();
        tasks
            .get_mut(name)
            .ok_or_else(|| SchedulerError::not_found(name))?
            .resume()
    }

    async fn clear(&self) -> SchedulerResult<()> {
        self.record("clear".to_string())?;
        self.tasks.lock().unwrap().clear();
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Runner that succeeds and records the names of the tasks it ran
#[derive(Debug, Clone, Default)]
pub struct RecordingRunner {
    runs: Arc<Mutex<Vec<String>>>,
    error_output_for: Arc<Mutex<Vec<String>>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `Output::error` for the named task instead of a success
    pub fn with_error_output_for(self, name: &str) -> Self {
        self.error_output_for.lock().unwrap().push(name.to_string());
        self
    }

    pub fn runs(&self) -> Vec<String> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskRunner for RecordingRunner {
    fn name(&self) -> &str {
        "recording"
    }

    fn support(&self, _task: &Task) -> bool {
        true
    }

    async fn run(&self, task: &mut Task) -> SchedulerResult<Output> {
        task.set_execution_state(Some(ExecutionState::Running));
        self.runs.lock().unwrap().push(task.name().to_string());

        let errored = self
            .error_output_for
            .lock()
            .unwrap()
            .iter()
            .any(|name| name == task.name());
        if errored {
            task.set_execution_state(Some(ExecutionState::Errored));
            return Ok(Output::error(task.clone(), Some("error".to_string())));
        }

        task.set_execution_state(Some(ExecutionState::Succeed));
        Ok(Output::success(task.clone(), Some("ok".to_string())))
    }
}

/// Runner that fails the named tasks with an `Err`, or panics when asked to
#[derive(Debug, Clone)]
pub struct FailingRunner {
    failing: Vec<String>,
    panic: bool,
}

impl FailingRunner {
    pub fn new(failing: &[&str]) -> Self {
        Self {
            failing: failing.iter().map(|name| name.to_string()).collect(),
            panic: false,
        }
    }

    pub fn panicking(failing: &[&str]) -> Self {
        Self {
            panic: true,
            ..Self::new(failing)
        }
    }
}

#[async_trait]
impl TaskRunner for FailingRunner {
    fn name(&self) -> &str {
        "failing"
    }

    fn support(&self, task: &Task) -> bool {
        self.failing.iter().any(|name| name == task.name())
    }

    async fn run(&self, task: &mut Task) -> SchedulerResult<Output> {
        task.set_execution_state(Some(ExecutionState::Running));
        if self.panic {
            panic!("runner exploded on {}", task.name());
        }
        task.set_execution_state(Some(ExecutionState::Errored));
        Err(SchedulerError::TaskExecution(format!(
            "{} failed on purpose",
            task.name()
        )))
    }
}

/// Listener that keeps every event it receives
#[derive(Debug, Clone, Default)]
pub struct RecordingEventListener {
    events: Arc<Mutex<Vec<SchedulerEvent>>>,
}

impl RecordingEventListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SchedulerEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.name()).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.names().into_iter().filter(|n| *n == name).count()
    }
}

impl EventListener for RecordingEventListener {
    fn on_event(&self, event: &SchedulerEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
