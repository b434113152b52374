pub mod scheduler;

pub use scheduler::{Scheduler, DUE_TASKS_LOCK};
