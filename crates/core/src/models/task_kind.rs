use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use url::Url;

use super::Task;
use crate::{SchedulerError, SchedulerResult};

/// Shell任务默认超时时间（秒）
pub const DEFAULT_SHELL_TIMEOUT_SECONDS: f64 = 60.0;

/// 任务类型及其专属配置
///
/// 序列化时以 `type` 字段区分，其余字段与任务公共属性平铺在同一层。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskKind {
    Shell(ShellTaskConfig),
    Http(HttpTaskConfig),
    Callback(CallbackTaskConfig),
    Command(CommandTaskConfig),
    Null,
    Chained(ChainedTaskConfig),
}

impl TaskKind {
    /// 类型名称，与序列化的 `type` 字段一致
    pub fn type_name(&self) -> &'static str {
        match self {
            TaskKind::Shell(_) => "shell",
            TaskKind::Http(_) => "http",
            TaskKind::Callback(_) => "callback",
            TaskKind::Command(_) => "command",
            TaskKind::Null => "null",
            TaskKind::Chained(_) => "chained",
        }
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        match self {
            TaskKind::Shell(config) => config.validate(),
            TaskKind::Http(config) => config.validate(),
            TaskKind::Callback(config) => config.validate(),
            TaskKind::Command(config) => config.validate(),
            TaskKind::Null => Ok(()),
            TaskKind::Chained(config) => config.validate(),
        }
    }
}

/// Shell任务配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellTaskConfig {
    /// 程序及其参数
    pub command: Vec<String>,
    /// 工作目录
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// 额外的环境变量
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub environment_variables: HashMap<String, String>,
    /// 超时时间（秒）
    #[serde(default = "default_shell_timeout")]
    pub timeout: Option<f64>,
}

fn default_shell_timeout() -> Option<f64> {
    Some(DEFAULT_SHELL_TIMEOUT_SECONDS)
}

impl ShellTaskConfig {
    pub fn new<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            cwd: None,
            environment_variables: HashMap::new(),
            timeout: default_shell_timeout(),
        }
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        match self.command.first() {
            None => {
                return Err(SchedulerError::Validation(
                    "Shell任务的命令不能为空".to_string(),
                ))
            }
            Some(program) if program.trim().is_empty() => {
                return Err(SchedulerError::Validation(
                    "Shell任务的程序名不能为空".to_string(),
                ))
            }
            _ => {}
        }

        if let Some(timeout) = self.timeout {
            if !timeout.is_finite() || timeout <= 0.0 {
                return Err(SchedulerError::Validation(format!(
                    "Shell任务超时时间必须大于0，当前为 {timeout}"
                )));
            }
        }

        Ok(())
    }
}

/// HTTP请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        };
        f.write_str(method)
    }
}

/// HTTP客户端选项
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpClientOptions {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<f64>,
}

/// HTTP任务配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpTaskConfig {
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub client_options: HttpClientOptions,
}

impl HttpTaskConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::default(),
            client_options: HttpClientOptions::default(),
        }
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        let parsed = Url::parse(&self.url).map_err(|e| {
            SchedulerError::Validation(format!("HTTP任务的URL无效 {}: {e}", self.url))
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SchedulerError::Validation(format!(
                "HTTP任务只支持http/https协议，当前为 {}",
                parsed.scheme()
            )));
        }

        if let Some(timeout) = self.client_options.timeout_seconds {
            if !timeout.is_finite() || timeout <= 0.0 {
                return Err(SchedulerError::Validation(format!(
                    "HTTP任务超时时间必须大于0，当前为 {timeout}"
                )));
            }
        }

        Ok(())
    }
}

/// 进程内回调任务配置，`callback` 为回调执行器中注册的名称
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackTaskConfig {
    pub callback: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<Value>,
}

impl CallbackTaskConfig {
    pub fn new(callback: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            callback: callback.into(),
            arguments,
        }
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        if self.callback.trim().is_empty() {
            return Err(SchedulerError::Validation(
                "回调任务必须指定回调名称".to_string(),
            ));
        }
        Ok(())
    }
}

/// 已注册命令任务配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandTaskConfig {
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

impl CommandTaskConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            arguments: Vec::new(),
            options: BTreeMap::new(),
        }
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        if self.command.trim().is_empty() {
            return Err(SchedulerError::Validation(
                "命令任务必须指定命令名称".to_string(),
            ));
        }
        Ok(())
    }
}

/// 链式任务配置，子任务按顺序执行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainedTaskConfig {
    pub tasks: Vec<Task>,
}

impl ChainedTaskConfig {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        if self.tasks.is_empty() {
            return Err(SchedulerError::Validation(
                "链式任务至少需要一个子任务".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.name()) {
                return Err(SchedulerError::Validation(format!(
                    "链式任务中存在重复的子任务名称: {}",
                    task.name()
                )));
            }
            task.validate()?;
        }

        Ok(())
    }
}
