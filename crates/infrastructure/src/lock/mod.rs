pub mod memory;
pub mod redis;

pub use self::memory::InMemoryLockStore;
pub use self::redis::{RedisLockStore, DEFAULT_LOCK_TTL};
