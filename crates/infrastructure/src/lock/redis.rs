use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crontask_core::{LockStore, SchedulerError, SchedulerResult};

pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(300);

/// 只有持有者的令牌匹配时才删除
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// 基于Redis的跨进程锁
///
/// 使用 `SET key token NX PX ttl` 获取锁，过期时间防止持有者崩溃后锁无法释放。
pub struct RedisLockStore {
    connection: ConnectionManager,
    key_prefix: String,
    ttl: Duration,
    tokens: Mutex<HashMap<String, String>>,
}

impl RedisLockStore {
    pub async fn new(redis_url: &str) -> SchedulerResult<Self> {
        Self::with_ttl(redis_url, DEFAULT_LOCK_TTL).await
    }

    pub async fn with_ttl(redis_url: &str, ttl: Duration) -> SchedulerResult<Self> {
        info!("创建Redis锁存储: {}", redis_url);

        let client = redis::Client::open(redis_url)
            .map_err(|e| SchedulerError::Lock(format!("无效的Redis地址: {e}")))?;

        let mut connection = client
            .get_connection_manager()
            .await
            .map_err(|e| SchedulerError::Lock(format!("连接Redis失败: {e}")))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(|e| SchedulerError::Lock(format!("Redis PING失败: {e}")))?;

        Ok(Self {
            connection,
            key_prefix: "crontask:lock".to_string(),
            ttl,
            tokens: Mutex::new(HashMap::new()),
        })
    }

    fn build_key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    fn tokens(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn try_acquire(&self, key: &str) -> SchedulerResult<bool> {
        let full_key = self.build_key(key);
        let token = Uuid::new_v4().to_string();
        let mut connection = self.connection.clone();

        let reply: Option<String> = redis::cmd("SET")
            .arg(&full_key)
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(self.ttl.as_millis() as u64)
            .query_async(&mut connection)
            .await
            .map_err(|e| SchedulerError::Lock(format!("获取锁 {full_key} 失败: {e}")))?;

        let acquired = reply.is_some();
        if acquired {
            self.tokens().insert(full_key.clone(), token);
        }
        debug!("获取Redis锁 {}: {}", full_key, acquired);
        Ok(acquired)
    }

    async fn release(&self, key: &str) -> SchedulerResult<()> {
        let full_key = self.build_key(key);
        let token = self.tokens().remove(&full_key);
        let Some(token) = token else {
            return Ok(());
        };

        let mut connection = self.connection.clone();
        let deleted: i32 = redis::Script::new(RELEASE_SCRIPT)
            .key(&full_key)
            .arg(&token)
            .invoke_async(&mut connection)
            .await
            .map_err(|e| SchedulerError::Lock(format!("释放锁 {full_key} 失败: {e}")))?;

        if deleted == 0 {
            warn!("Redis锁 {} 已过期或被其他持有者占用", full_key);
        }
        Ok(())
    }
}
