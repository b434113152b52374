pub mod config;
pub mod cron_utils;
pub mod errors;
pub mod events;
pub mod logging;
pub mod models;
pub mod policy;
pub mod traits;

pub use cron_utils::CronExpression;
pub use errors::{BoxError, SchedulerError, SchedulerResult};
pub use events::{EventDispatcher, EventListener, SchedulerEvent};
pub use logging::{init_logging, LogConfig};
pub use models::{
    ExecutionState, FailedTask, Output, OutputKind, Task, TaskKind, TaskList, TaskMessage,
    TaskState,
};
pub use policy::{SchedulePolicy, SchedulePolicyOrchestrator, DEFAULT_POLICY};
pub use traits::{LockStore, MessageQueue, TaskExecutionTracker, TaskRunner, Transport};
