mod operation;

pub mod dsn;
pub mod factory;
pub mod failover;
pub mod long_tail;
pub mod memory;
pub mod round_robin;
pub mod sqlite;

pub use dsn::Dsn;
pub use factory::TransportFactory;
pub use failover::{FailoverMode, FailoverTransport};
pub use long_tail::{LongTailTransport, LONG_TAIL_FAILED};
pub use memory::InMemoryTransport;
pub use operation::{TransportOperation, TransportReply};
pub use round_robin::{RoundRobinTransport, DEFAULT_QUANTUM};
pub use sqlite::SqliteTransport;

pub const NO_TRANSPORT_FOUND: &str = "No transport found";
pub const ALL_TRANSPORTS_FAILED: &str = "All the transports failed to execute the requested action";
