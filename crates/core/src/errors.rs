use thiserror::Error;

/// 底层后端错误，在 Transport 边界统一包装
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 调度器错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("任务配置无效: {0}")]
    Validation(String),

    #[error("任务未找到: {name}")]
    TaskNotFound { name: String },

    #[error("任务状态冲突: {0}")]
    Conflict(String),

    #[error("传输层错误: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("没有找到支持任务 {name} 的执行器")]
    UndefinedRunner { name: String },

    #[error("任务执行错误: {0}")]
    TaskExecution(String),

    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("锁错误: {0}")]
    Lock(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl SchedulerError {
    /// 创建不带底层原因的传输层错误
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// 包装后端原始错误，保留原因链
    pub fn transport_with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        Self::TaskNotFound { name: name.into() }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TaskNotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Serialization(err.to_string())
    }
}

/// 统一的Result类型
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;
