use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::debug;

use crontask_core::{LockStore, SchedulerResult};

/// 进程内锁，只在单个进程内互斥
#[derive(Debug, Default)]
pub struct InMemoryLockStore {
    held: Mutex<HashSet<String>>,
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self, key: &str) -> bool {
        self.held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(key)
    }
}

#[async_trait]
impl LockStore for InMemoryLockStore {
    async fn try_acquire(&self, key: &str) -> SchedulerResult<bool> {
        let acquired = self
            .held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string());
        debug!("获取锁 {}: {}", key, acquired);
        Ok(acquired)
    }

    async fn release(&self, key: &str) -> SchedulerResult<()> {
        self.held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_is_exclusive() {
        let store = InMemoryLockStore::new();

        assert!(store.try_acquire("foo").await.unwrap());
        assert!(!store.try_acquire("foo").await.unwrap());
        assert!(store.try_acquire("bar").await.unwrap());

        store.release("foo").await.unwrap();
        assert!(!store.is_locked("foo"));
        assert!(store.try_acquire("foo").await.unwrap());
    }
}
