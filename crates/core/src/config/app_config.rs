use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::sections::{LockConfig, SchedulerConfig, TransportConfig, WorkerConfig, DEFAULT_DSN};
use crate::logging::LogConfig;
use crate::policy::DEFAULT_POLICY;

const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config/crontask.toml",
    "crontask.toml",
    "/etc/crontask/config.toml",
];

/// 应用配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub logging: LogConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序：
    /// 1. 默认值
    /// 2. 配置文件（TOML格式）
    /// 3. 环境变量覆盖（前缀 `CRONTASK_`，层级之间用 `__` 分隔，
    ///    例如 `CRONTASK_TRANSPORT__DSN`）
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder()
            .set_default("transport.dsn", DEFAULT_DSN)?
            .set_default("scheduler.timezone", "UTC")?
            .set_default("scheduler.policy", DEFAULT_POLICY)?
            .set_default("scheduler.due_task_lock", false)?
            .set_default("worker.sleep_duration_delay", 1)?
            .set_default("lock.backend", "memory")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?;

        match config_path {
            Some(path) => {
                if !Path::new(path).exists() {
                    return Err(anyhow::anyhow!("配置文件不存在: {}", path));
                }
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
            None => {
                if let Some(path) = DEFAULT_CONFIG_PATHS.iter().find(|p| Path::new(p).exists()) {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("CRONTASK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// 从TOML字符串加载配置
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// 序列化为TOML字符串
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        self.transport.validate().context("Transport配置验证失败")?;
        self.scheduler.validate().context("调度器配置验证失败")?;
        self.worker.validate().context("执行器配置验证失败")?;
        self.lock.validate().context("锁配置验证失败")?;
        self.logging.validate().context("日志配置验证失败")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LockBackend;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.transport.dsn, DEFAULT_DSN);
        assert_eq!(config.worker.sleep_duration_delay, 1);
    }

    #[test]
    fn test_from_toml_with_partial_sections() {
        let config = AppConfig::from_toml(
            r#"
            [transport]
            dsn = "failover://(memory://batch && sqlite::memory:)"

            [scheduler]
            timezone = "Europe/Paris"
            policy = "batch"

            [worker]
            task_limit = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.scheduler.timezone().unwrap(), chrono_tz::Europe::Paris);
        assert_eq!(config.worker.task_limit, Some(5));
        assert_eq!(config.worker.sleep_duration_delay, 1);
        assert_eq!(config.lock.backend, LockBackend::Memory);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(AppConfig::from_toml("[scheduler]\ntimezone = \"Mars/Olympus\"").is_err());
        assert!(AppConfig::from_toml("[scheduler]\npolicy = \"random\"").is_err());
        assert!(AppConfig::from_toml("[worker]\ntask_limit = 0").is_err());
        assert!(AppConfig::from_toml("[lock]\nbackend = \"redis\"").is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = AppConfig::default();
        config.worker.failure_limit = Some(3);

        let restored = AppConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[worker]\nsleep_duration_delay = 5\n[logging]\nformat = \"json\"").unwrap();

        let config = AppConfig::load(file.path().to_str()).unwrap();

        assert_eq!(config.worker.sleep_duration_delay, 5);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.scheduler.policy, DEFAULT_POLICY);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(AppConfig::load(Some("/nonexistent/crontask.toml")).is_err());
    }
}
