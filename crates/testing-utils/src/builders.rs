//! Test data builders for creating test tasks
//!
//! Builders start from a valid null task scheduled every minute and panic on
//! invalid input, which is what tests want.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use crontask_core::models::{Task, TaskKind};

/// Builder for creating test Task entities
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new() -> Self {
        Self {
            task: Task::null("test_task").expect("valid null task"),
        }
    }

    /// Start from a shell task running `command`
    pub fn shell(command: &[&str]) -> Self {
        Self {
            task: Task::shell("test_task", command.iter().copied()).expect("valid shell task"),
        }
    }

    pub fn with_kind(mut self, kind: TaskKind) -> Self {
        let name = self.task.name().to_string();
        let mut task = Task::new(name, kind).expect("valid task kind");
        task.set_expression(self.task.expression()).expect("valid expression");
        self.task = task;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.task.rename(name).expect("valid name");
        self
    }

    pub fn with_expression(mut self, expression: &str) -> Self {
        self.task.set_expression(expression).expect("valid expression");
        self
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.task.set_timezone(Some(timezone));
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.task.set_priority(priority).expect("valid priority");
        self
    }

    pub fn with_nice(mut self, nice: i32) -> Self {
        self.task.set_nice(Some(nice)).expect("valid nice");
        self
    }

    pub fn with_scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.task.set_scheduled_at(Some(at));
        self
    }

    pub fn with_execution_delay(mut self, micros: u64) -> Self {
        self.task.set_execution_delay(Some(micros));
        self
    }

    pub fn with_relative_deadline(mut self, seconds: u64) -> Self {
        self.task.set_execution_relative_deadline(Some(seconds));
        self
    }

    /// Set an execution window, past dates included
    ///
    /// Goes through the JSON form, which is how stored tasks with past
    /// windows come back from a transport.
    pub fn with_execution_window(
        self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        let mut value = serde_json::to_value(&self.task).expect("serializable task");
        let object = value.as_object_mut().expect("task serializes to an object");
        if let Some(start) = start {
            object.insert("execution_start_date".into(), serde_json::json!(start));
        }
        if let Some(end) = end {
            object.insert("execution_end_date".into(), serde_json::json!(end));
        }
        Self {
            task: serde_json::from_value(value).expect("valid task json"),
        }
    }

    pub fn single_run(mut self) -> Self {
        self.task.set_single_run(true);
        self
    }

    pub fn queued(mut self) -> Self {
        self.task.set_queued(true);
        self
    }

    pub fn untracked(mut self) -> Self {
        self.task.set_tracked(false);
        self
    }

    pub fn paused(mut self) -> Self {
        self.task.pause().expect("task starts enabled");
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

impl Default for TaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Shortcut for a named null task
pub fn null_task(name: &str) -> Task {
    TaskBuilder::new().with_name(name).build()
}
