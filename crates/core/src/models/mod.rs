pub mod message;
pub mod output;
pub mod task;
pub mod task_kind;
pub mod task_list;

pub use message::TaskMessage;
pub use output::{FailedTask, Output, OutputKind};
pub use task::{parse_date, ExecutionState, Task, TaskState, DEFAULT_EXPRESSION};
pub use task_kind::{
    CallbackTaskConfig, ChainedTaskConfig, CommandTaskConfig, HttpClientOptions, HttpMethod,
    HttpTaskConfig, ShellTaskConfig, TaskKind,
};
pub use task_list::TaskList;
