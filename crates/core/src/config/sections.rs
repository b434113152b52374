use anyhow::Result;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::policy::{SchedulePolicyOrchestrator, DEFAULT_POLICY};

pub const DEFAULT_DSN: &str = "memory://first_in_first_out";

/// 存储配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Transport连接串，例如 `failover://(memory://batch && sqlite://tasks.db)`
    #[serde(default = "default_dsn")]
    pub dsn: String,
}

fn default_dsn() -> String {
    DEFAULT_DSN.to_string()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { dsn: default_dsn() }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dsn.trim().is_empty() {
            return Err(anyhow::anyhow!("Transport连接串不能为空"));
        }
        if !self.dsn.contains("://") && !self.dsn.starts_with("sqlite:") {
            return Err(anyhow::anyhow!("无效的Transport连接串: {}", self.dsn));
        }
        Ok(())
    }
}

/// 调度器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// 默认时区，任务未指定时区时使用
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// 到期任务排序策略
    #[serde(default = "default_policy")]
    pub policy: String,
    /// 计算到期任务时是否加锁
    #[serde(default)]
    pub due_task_lock: bool,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_policy() -> String {
    DEFAULT_POLICY.to_string()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            policy: default_policy(),
            due_task_lock: false,
        }
    }
}

impl SchedulerConfig {
    pub fn timezone(&self) -> Result<Tz> {
        Tz::from_str(&self.timezone).map_err(|e| anyhow::anyhow!("无效的时区 {}: {e}", self.timezone))
    }

    pub fn validate(&self) -> Result<()> {
        self.timezone()?;
        if !SchedulePolicyOrchestrator::with_default_policies().supports(&self.policy) {
            return Err(anyhow::anyhow!("不支持的调度策略: {}", self.policy));
        }
        Ok(())
    }
}

/// 执行器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// 每轮之间的休眠时间（秒）
    #[serde(default = "default_sleep_duration_delay")]
    pub sleep_duration_delay: u64,
    /// 执行指定数量的任务后停止
    #[serde(default)]
    pub task_limit: Option<usize>,
    /// 运行指定秒数后停止
    #[serde(default)]
    pub time_limit_seconds: Option<u64>,
    /// 失败指定次数后停止
    #[serde(default)]
    pub failure_limit: Option<usize>,
}

fn default_sleep_duration_delay() -> u64 {
    1
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sleep_duration_delay: default_sleep_duration_delay(),
            task_limit: None,
            time_limit_seconds: None,
            failure_limit: None,
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.task_limit == Some(0) {
            return Err(anyhow::anyhow!("任务数量上限必须大于0"));
        }
        if self.time_limit_seconds == Some(0) {
            return Err(anyhow::anyhow!("运行时间上限必须大于0"));
        }
        if self.failure_limit == Some(0) {
            return Err(anyhow::anyhow!("失败次数上限必须大于0"));
        }
        Ok(())
    }
}

/// 锁后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockBackend {
    #[default]
    Memory,
    Redis,
}

/// 锁配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(default)]
    pub backend: LockBackend,
    #[serde(default)]
    pub redis_url: Option<String>,
}

impl LockConfig {
    pub fn validate(&self) -> Result<()> {
        if self.backend == LockBackend::Redis {
            match &self.redis_url {
                None => return Err(anyhow::anyhow!("Redis锁后端需要配置redis_url")),
                Some(url) if !url.starts_with("redis://") && !url.starts_with("rediss://") => {
                    return Err(anyhow::anyhow!("无效的Redis地址: {url}"))
                }
                _ => {}
            }
        }
        Ok(())
    }
}
