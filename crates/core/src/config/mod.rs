pub mod app_config;
pub mod sections;

pub use app_config::AppConfig;
pub use sections::{
    LockBackend, LockConfig, SchedulerConfig, TransportConfig, WorkerConfig, DEFAULT_DSN,
};
