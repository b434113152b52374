pub mod lock;
pub mod message_queue;
pub mod runner;
pub mod tracker;
pub mod transport;

pub use lock::LockStore;
pub use message_queue::MessageQueue;
pub use runner::TaskRunner;
pub use tracker::TaskExecutionTracker;
pub use transport::Transport;
