//! Shared test helpers for the crontask crates

pub mod builders;
pub mod mocks;

pub use builders::{null_task, TaskBuilder};
pub use mocks::{FailingRunner, MockTransport, RecordingEventListener, RecordingRunner};
