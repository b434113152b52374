pub mod in_memory_queue;
pub mod lock;
pub mod transport;

pub use in_memory_queue::InMemoryMessageQueue;
pub use lock::{InMemoryLockStore, RedisLockStore};
pub use transport::{
    Dsn, FailoverTransport, InMemoryTransport, LongTailTransport, RoundRobinTransport,
    SqliteTransport, TransportFactory, TransportOperation, TransportReply,
};
