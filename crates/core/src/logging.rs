use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 2] = ["json", "pretty"];

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_level")]
    pub level: String,
    /// 日志格式：json 或 pretty
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

impl LogConfig {
    /// 从 `LOG_LEVEL` / `LOG_FORMAT` 环境变量读取，缺省使用默认值
    pub fn from_env() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| default_level()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| default_format()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.level.to_lowercase().as_str()) {
            return Err(anyhow::anyhow!("无效的日志级别: {}", self.level));
        }
        if !LOG_FORMATS.contains(&self.format.as_str()) {
            return Err(anyhow::anyhow!("不支持的日志格式: {}", self.format));
        }
        Ok(())
    }
}

/// 初始化日志系统
///
/// `RUST_LOG` 存在时优先于配置中的级别。
pub fn init_logging(config: &LogConfig) -> Result<()> {
    config.validate()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_validation() {
        assert!(LogConfig::default().validate().is_ok());

        let config = LogConfig {
            level: "loud".to_string(),
            format: "json".to_string(),
        };
        assert!(config.validate().is_err());

        let config = LogConfig {
            level: "DEBUG".to_string(),
            format: "xml".to_string(),
        };
        assert!(config.validate().is_err());
    }
}
