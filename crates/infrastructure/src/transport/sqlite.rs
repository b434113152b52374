use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::str::FromStr;
use tracing::{debug, info};

use crontask_core::{SchedulerError, SchedulerResult, Task, TaskList, Transport};

fn database_error(action: &'static str) -> impl FnOnce(sqlx::Error) -> SchedulerError {
    move |e| SchedulerError::transport_with_source(format!("SQLite{action}失败"), e)
}

fn decode(body: &str) -> SchedulerResult<Task> {
    serde_json::from_str(body)
        .map_err(|e| SchedulerError::transport_with_source("无法解析存储的任务", e))
}

fn encode(task: &Task) -> SchedulerResult<String> {
    serde_json::to_string(task)
        .map_err(|e| SchedulerError::transport_with_source("无法序列化任务", e))
}

/// SQLite Transport
///
/// 每个任务以JSON保存在 `crontask_tasks` 表中，写操作都在单个事务内完成检查与写入。
pub struct SqliteTransport {
    name: String,
    pool: SqlitePool,
}

impl SqliteTransport {
    /// 连接数据库并自动建表
    ///
    /// `sqlite::memory:` 只使用一个连接，否则每个连接都会看到各自独立的内存库。
    pub async fn connect(database_url: &str) -> SchedulerResult<Self> {
        debug!("连接SQLite Transport: {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(database_error("连接参数解析"))?
            .create_if_missing(true);

        let in_memory = database_url.contains(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(database_error("连接"))?;

        Self::from_pool(database_url, pool).await
    }

    pub async fn from_pool(name: &str, pool: SqlitePool) -> SchedulerResult<Self> {
        Self::run_migrations(&pool).await?;
        info!("SQLite Transport已就绪: {}", name);
        Ok(Self {
            name: name.to_string(),
            pool,
        })
    }

    async fn run_migrations(pool: &SqlitePool) -> SchedulerResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS crontask_tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_name TEXT NOT NULL UNIQUE,
                body TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(database_error("建表"))?;
        Ok(())
    }

    async fn begin(&self) -> SchedulerResult<Transaction<'_, Sqlite>> {
        self.pool.begin().await.map_err(database_error("开启事务"))
    }

    async fn fetch_body(
        tx: &mut Transaction<'_, Sqlite>,
        name: &str,
    ) -> SchedulerResult<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT body FROM crontask_tasks WHERE task_name = ?")
            .bind(name)
            .fetch_optional(&mut **tx)
            .await
            .map_err(database_error("查询任务"))
    }

    async fn exists(tx: &mut Transaction<'_, Sqlite>, name: &str) -> SchedulerResult<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM crontask_tasks WHERE task_name = ?",
        )
        .bind(name)
        .fetch_one(&mut **tx)
        .await
        .map_err(database_error("查询任务"))?;
        Ok(count > 0)
    }

    /// 在事务内读取、修改并写回任务
    async fn modify<F>(&self, name: &str, change: F) -> SchedulerResult<()>
    where
        F: FnOnce(&mut Task) -> SchedulerResult<()> + Send,
    {
        let mut tx = self.begin().await?;
        let body = Self::fetch_body(&mut tx, name)
            .await?
            .ok_or_else(|| SchedulerError::not_found(name))?;

        let mut task = decode(&body)?;
        change(&mut task)?;

        sqlx::query("UPDATE crontask_tasks SET body = ? WHERE task_name = ?")
            .bind(encode(&task)?)
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(database_error("更新任务"))?;

        tx.commit().await.map_err(database_error("提交事务"))
    }
}

#[async_trait]
impl Transport for SqliteTransport {
    async fn get(&self, name: &str) -> SchedulerResult<Task> {
        let body = sqlx::query_scalar::<_, String>(
            "SELECT body FROM crontask_tasks WHERE task_name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error("查询任务"))?
        .ok_or_else(|| SchedulerError::not_found(name))?;

        decode(&body)
    }

    async fn list(&self) -> SchedulerResult<TaskList> {
        let bodies = sqlx::query_scalar::<_, String>("SELECT body FROM crontask_tasks ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(database_error("查询任务列表"))?;

        bodies.iter().map(|body| decode(body)).collect()
    }

    async fn create(&self, task: Task) -> SchedulerResult<()> {
        let mut tx = self.begin().await?;
        if Self::exists(&mut tx, task.name()).await? {
            return Err(SchedulerError::Conflict(format!(
                "任务 {} 已存在",
                task.name()
            )));
        }

        sqlx::query("INSERT INTO crontask_tasks (task_name, body) VALUES (?, ?)")
            .bind(task.name())
            .bind(encode(&task)?)
            .execute(&mut *tx)
            .await
            .map_err(database_error("创建任务"))?;

        tx.commit().await.map_err(database_error("提交事务"))?;
        debug!("SQLite Transport创建任务: {}", task.name());
        Ok(())
    }

    async fn update(&self, name: &str, task: Task) -> SchedulerResult<()> {
        let mut tx = self.begin().await?;
        if !Self::exists(&mut tx, name).await? {
            return Err(SchedulerError::not_found(name));
        }
        if task.name() != name && Self::exists(&mut tx, task.name()).await? {
            return Err(SchedulerError::Conflict(format!(
                "任务 {} 已存在",
                task.name()
            )));
        }

        sqlx::query("UPDATE crontask_tasks SET task_name = ?, body = ? WHERE task_name = ?")
            .bind(task.name())
            .bind(encode(&task)?)
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(database_error("更新任务"))?;

        tx.commit().await.map_err(database_error("提交事务"))
    }

    async fn delete(&self, name: &str) -> SchedulerResult<()> {
        let mut tx = self.begin().await?;
        let result = sqlx::query("DELETE FROM crontask_tasks WHERE task_name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(database_error("删除任务"))?;

        if result.rows_affected() == 0 {
            return Err(SchedulerError::not_found(name));
        }
        tx.commit().await.map_err(database_error("提交事务"))
    }

    async fn pause(&self, name: &str) -> SchedulerResult<()> {
        self.modify(name, |task| task.pause()).await
    }

    async fn resume(&self, name: &str) -> SchedulerResult<()> {
        self.modify(name, |task| task.resume()).await
    }

    async fn clear(&self) -> SchedulerResult<()> {
        let mut tx = self.begin().await?;
        sqlx::query("DELETE FROM crontask_tasks")
            .execute(&mut *tx)
            .await
            .map_err(database_error("清空任务"))?;
        tx.commit().await.map_err(database_error("提交事务"))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
