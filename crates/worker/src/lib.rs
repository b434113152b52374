pub mod message_handler;
pub mod options;
pub mod runners;
pub mod stop_conditions;
pub mod tracker;
pub mod worker;

pub use message_handler::TaskMessageHandler;
pub use options::WorkerOptions;
pub use runners::{
    default_runners, CallbackTaskRunner, ChainedTaskRunner, CommandHandler, CommandTaskRunner,
    HttpTaskRunner, NullTaskRunner, ShellTaskRunner,
};
pub use stop_conditions::{StopWorkerOnFailureLimit, StopWorkerOnTaskLimit, StopWorkerOnTimeLimit};
pub use tracker::ExecutionTracker;
pub use worker::{Worker, WorkerBuilder, WorkerHandle, WorkerStatus};
