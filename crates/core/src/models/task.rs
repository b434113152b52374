use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

use super::task_kind::{
    CallbackTaskConfig, ChainedTaskConfig, CommandTaskConfig, HttpTaskConfig, ShellTaskConfig,
    TaskKind,
};
use crate::cron_utils::CronExpression;
use crate::{SchedulerError, SchedulerResult};

/// 默认的CRON表达式，每分钟执行
pub const DEFAULT_EXPRESSION: &str = "* * * * *";

pub const MIN_PRIORITY: i32 = -1000;
pub const MAX_PRIORITY: i32 = 1000;
pub const MIN_NICE: i32 = -20;
pub const MAX_NICE: i32 = 19;

const NAIVE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 任务调度状态
///
/// - `Enabled`: 任务参与调度
/// - `Paused`: 任务暂停，调度器和执行器都会跳过
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    #[default]
    Enabled,
    Paused,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Enabled => write!(f, "ENABLED"),
            TaskState::Paused => write!(f, "PAUSED"),
        }
    }
}

/// 任务执行状态，由执行器写入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionState {
    Running,
    Succeed,
    Errored,
    Incomplete,
    /// 保留状态，不会被自动设置
    ToRetry,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            ExecutionState::Running => "RUNNING",
            ExecutionState::Succeed => "SUCCEED",
            ExecutionState::Errored => "ERRORED",
            ExecutionState::Incomplete => "INCOMPLETE",
            ExecutionState::ToRetry => "TO_RETRY",
        };
        f.write_str(state)
    }
}

fn default_expression() -> String {
    DEFAULT_EXPRESSION.to_string()
}

fn default_true() -> bool {
    true
}

/// 任务定义
///
/// 可调度执行的任务单元：类型专属配置保存在 `kind` 中，
/// 其余为所有类型共享的调度、生命周期与执行跟踪属性。
///
/// 字段都通过校验过的setter修改，保证任务在任何时刻都是合法的。
///
/// # 使用示例
///
/// ```rust
/// use crontask_core::models::{Task, TaskState};
///
/// let mut task = Task::shell("backup", ["backup.sh"]).unwrap();
/// task.set_expression("0 2 * * *").unwrap(); // 每天凌晨2点
/// task.set_priority(10).unwrap();
///
/// assert_eq!(task.state(), TaskState::Enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// 任务名称，在同一个Transport内唯一
    name: String,
    /// 任务类型及专属配置
    #[serde(flatten)]
    kind: TaskKind,
    /// 五段式CRON表达式
    #[serde(default = "default_expression")]
    expression: String,
    /// 任务时区，为空时使用调度器时区
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timezone: Option<Tz>,
    /// 执行窗口起点（含）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    execution_start_date: Option<DateTime<Utc>>,
    /// 执行窗口终点（含）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    execution_end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nice: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    tags: BTreeSet<String>,

    #[serde(default)]
    state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    execution_state: Option<ExecutionState>,

    /// 被调度的时间
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scheduled_at: Option<DateTime<Utc>>,
    /// 进入执行器的时间
    #[serde(default, skip_serializing_if = "Option::is_none")]
    arrival_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    execution_start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    execution_end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_execution: Option<DateTime<Utc>>,
    /// 执行耗时（毫秒）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    execution_computation_time: Option<f64>,
    /// 执行时的内存占用（字节）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    execution_memory_usage: Option<u64>,
    /// 执行前的等待时间（微秒）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    execution_delay: Option<u64>,
    /// 允许的最长执行时间（秒）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_duration: Option<f64>,
    /// 相对截止时间（秒）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    execution_relative_deadline: Option<u64>,
    /// 绝对截止时间，执行开始时间加相对截止时间
    #[serde(default, skip_serializing_if = "Option::is_none")]
    execution_absolute_deadline: Option<DateTime<Utc>>,

    #[serde(default)]
    single_run: bool,
    #[serde(default)]
    queued: bool,
    #[serde(default)]
    background: bool,
    #[serde(default)]
    output: bool,
    #[serde(default = "default_true")]
    tracked: bool,
}

impl Task {
    /// 创建任务并校验名称与类型配置
    pub fn new(name: impl Into<String>, kind: TaskKind) -> SchedulerResult<Self> {
        let name = name.into();
        validate_name(&name)?;
        kind.validate()?;

        Ok(Self {
            name,
            kind,
            expression: default_expression(),
            timezone: None,
            execution_start_date: None,
            execution_end_date: None,
            priority: 0,
            nice: None,
            description: None,
            tags: BTreeSet::new(),
            state: TaskState::Enabled,
            execution_state: None,
            scheduled_at: None,
            arrival_time: None,
            execution_start_time: None,
            execution_end_time: None,
            last_execution: None,
            execution_computation_time: None,
            execution_memory_usage: None,
            execution_delay: None,
            max_duration: None,
            execution_relative_deadline: None,
            execution_absolute_deadline: None,
            single_run: false,
            queued: false,
            background: false,
            output: false,
            tracked: true,
        })
    }

    pub fn shell<I, S>(name: impl Into<String>, command: I) -> SchedulerResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, TaskKind::Shell(ShellTaskConfig::new(command)))
    }

    pub fn http(name: impl Into<String>, url: impl Into<String>) -> SchedulerResult<Self> {
        Self::new(name, TaskKind::Http(HttpTaskConfig::new(url)))
    }

    pub fn callback(
        name: impl Into<String>,
        callback: impl Into<String>,
        arguments: Vec<Value>,
    ) -> SchedulerResult<Self> {
        Self::new(
            name,
            TaskKind::Callback(CallbackTaskConfig::new(callback, arguments)),
        )
    }

    pub fn command(name: impl Into<String>, command: impl Into<String>) -> SchedulerResult<Self> {
        Self::new(name, TaskKind::Command(CommandTaskConfig::new(command)))
    }

    pub fn null(name: impl Into<String>) -> SchedulerResult<Self> {
        Self::new(name, TaskKind::Null)
    }

    pub fn chained(name: impl Into<String>, tasks: Vec<Task>) -> SchedulerResult<Self> {
        Self::new(name, TaskKind::Chained(ChainedTaskConfig::new(tasks)))
    }

    /// 校验任务整体的一致性
    ///
    /// 反序列化得到的任务不检查执行窗口是否已过去，
    /// 存储中的任务窗口本来就可能早于当前时间。
    pub fn validate(&self) -> SchedulerResult<()> {
        validate_name(&self.name)?;
        CronExpression::parse(&self.expression)?;
        validate_priority(self.priority)?;
        if let Some(nice) = self.nice {
            validate_nice(nice)?;
        }
        if self.background && !matches!(self.kind, TaskKind::Shell(_)) {
            return Err(SchedulerError::Validation(format!(
                "只有Shell任务可以在后台执行，任务 {} 的类型为 {}",
                self.name,
                self.kind.type_name()
            )));
        }
        if let (Some(start), Some(end)) = (self.execution_start_date, self.execution_end_date) {
            if end < start {
                return Err(SchedulerError::Validation(format!(
                    "任务 {} 的执行结束时间早于开始时间",
                    self.name
                )));
            }
        }
        self.kind.validate()
    }

    pub fn to_json(&self) -> SchedulerResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> SchedulerResult<Self> {
        let task: Task = serde_json::from_str(json)?;
        task.validate()?;
        Ok(task)
    }

    // ---- 标识 ----

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: impl Into<String>) -> SchedulerResult<()> {
        let name = name.into();
        validate_name(&name)?;
        self.name = name;
        Ok(())
    }

    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut TaskKind {
        &mut self.kind
    }

    // ---- 调度属性 ----

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn set_expression(&mut self, expression: &str) -> SchedulerResult<()> {
        let parsed = CronExpression::parse(expression)?;
        self.expression = parsed.as_str().to_string();
        Ok(())
    }

    pub fn cron(&self) -> SchedulerResult<CronExpression> {
        CronExpression::parse(&self.expression)
    }

    pub fn timezone(&self) -> Option<Tz> {
        self.timezone
    }

    pub fn set_timezone(&mut self, timezone: Option<Tz>) {
        self.timezone = timezone;
    }

    pub fn execution_start_date(&self) -> Option<DateTime<Utc>> {
        self.execution_start_date
    }

    /// 设置执行窗口起点，`None` 清除
    ///
    /// 支持 RFC 3339 以及按任务时区解释的 `YYYY-MM-DD HH:MM:SS`，
    /// 早于当前时间的日期会被拒绝。
    pub fn set_execution_start_date(&mut self, date: Option<&str>) -> SchedulerResult<()> {
        let parsed = date.map(|d| self.parse_future_date(d)).transpose()?;
        if let (Some(start), Some(end)) = (parsed, self.execution_end_date) {
            if end < start {
                return Err(SchedulerError::Validation(format!(
                    "执行开始时间 {start} 晚于结束时间 {end}"
                )));
            }
        }
        self.execution_start_date = parsed;
        Ok(())
    }

    pub fn execution_end_date(&self) -> Option<DateTime<Utc>> {
        self.execution_end_date
    }

    pub fn set_execution_end_date(&mut self, date: Option<&str>) -> SchedulerResult<()> {
        let parsed = date.map(|d| self.parse_future_date(d)).transpose()?;
        if let (Some(start), Some(end)) = (self.execution_start_date, parsed) {
            if end < start {
                return Err(SchedulerError::Validation(format!(
                    "执行结束时间 {end} 早于开始时间 {start}"
                )));
            }
        }
        self.execution_end_date = parsed;
        Ok(())
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn set_priority(&mut self, priority: i32) -> SchedulerResult<()> {
        validate_priority(priority)?;
        self.priority = priority;
        Ok(())
    }

    pub fn nice(&self) -> Option<i32> {
        self.nice
    }

    pub fn set_nice(&mut self, nice: Option<i32>) -> SchedulerResult<()> {
        if let Some(value) = nice {
            validate_nice(value)?;
        }
        self.nice = nice;
        Ok(())
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        self.tags.insert(tag.into());
    }

    // ---- 生命周期 ----

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state == TaskState::Enabled
    }

    /// ENABLED -> PAUSED
    pub fn pause(&mut self) -> SchedulerResult<()> {
        if self.state == TaskState::Paused {
            return Err(SchedulerError::Conflict(format!(
                "任务 {} 已经处于暂停状态",
                self.name
            )));
        }
        self.state = TaskState::Paused;
        Ok(())
    }

    /// PAUSED -> ENABLED
    pub fn resume(&mut self) -> SchedulerResult<()> {
        if self.state == TaskState::Enabled {
            return Err(SchedulerError::Conflict(format!(
                "任务 {} 已经处于启用状态",
                self.name
            )));
        }
        self.state = TaskState::Enabled;
        Ok(())
    }

    pub fn execution_state(&self) -> Option<ExecutionState> {
        self.execution_state
    }

    pub fn set_execution_state(&mut self, state: Option<ExecutionState>) {
        self.execution_state = state;
    }

    // ---- 执行跟踪 ----

    pub fn scheduled_at(&self) -> Option<DateTime<Utc>> {
        self.scheduled_at
    }

    pub fn set_scheduled_at(&mut self, at: Option<DateTime<Utc>>) {
        self.scheduled_at = at;
    }

    pub fn arrival_time(&self) -> Option<DateTime<Utc>> {
        self.arrival_time
    }

    pub fn set_arrival_time(&mut self, at: Option<DateTime<Utc>>) {
        self.arrival_time = at;
    }

    pub fn execution_start_time(&self) -> Option<DateTime<Utc>> {
        self.execution_start_time
    }

    pub fn set_execution_start_time(&mut self, at: Option<DateTime<Utc>>) {
        self.execution_start_time = at;
    }

    pub fn execution_end_time(&self) -> Option<DateTime<Utc>> {
        self.execution_end_time
    }

    pub fn set_execution_end_time(&mut self, at: Option<DateTime<Utc>>) {
        self.execution_end_time = at;
    }

    pub fn last_execution(&self) -> Option<DateTime<Utc>> {
        self.last_execution
    }

    pub fn set_last_execution(&mut self, at: Option<DateTime<Utc>>) {
        self.last_execution = at;
    }

    pub fn execution_computation_time(&self) -> Option<f64> {
        self.execution_computation_time
    }

    pub fn set_execution_computation_time(&mut self, millis: Option<f64>) {
        self.execution_computation_time = millis;
    }

    pub fn execution_memory_usage(&self) -> Option<u64> {
        self.execution_memory_usage
    }

    pub fn set_execution_memory_usage(&mut self, bytes: Option<u64>) {
        self.execution_memory_usage = bytes;
    }

    pub fn execution_delay(&self) -> Option<u64> {
        self.execution_delay
    }

    pub fn set_execution_delay(&mut self, micros: Option<u64>) {
        self.execution_delay = micros;
    }

    pub fn max_duration(&self) -> Option<f64> {
        self.max_duration
    }

    pub fn set_max_duration(&mut self, seconds: Option<f64>) -> SchedulerResult<()> {
        if let Some(value) = seconds {
            if !value.is_finite() || value <= 0.0 {
                return Err(SchedulerError::Validation(format!(
                    "最长执行时间必须大于0，当前为 {value}"
                )));
            }
        }
        self.max_duration = seconds;
        Ok(())
    }

    pub fn execution_relative_deadline(&self) -> Option<u64> {
        self.execution_relative_deadline
    }

    pub fn set_execution_relative_deadline(&mut self, seconds: Option<u64>) {
        self.execution_relative_deadline = seconds;
    }

    pub fn execution_absolute_deadline(&self) -> Option<DateTime<Utc>> {
        self.execution_absolute_deadline
    }

    pub fn set_execution_absolute_deadline(&mut self, at: Option<DateTime<Utc>>) {
        self.execution_absolute_deadline = at;
    }

    /// 从另一份副本复制执行状态和执行跟踪字段，其余配置保持不变
    pub fn merge_execution_record(&mut self, executed: &Task) {
        self.execution_state = executed.execution_state;
        self.arrival_time = executed.arrival_time;
        self.execution_start_time = executed.execution_start_time;
        self.execution_end_time = executed.execution_end_time;
        self.last_execution = executed.last_execution;
        self.execution_computation_time = executed.execution_computation_time;
        self.execution_memory_usage = executed.execution_memory_usage;
        self.execution_absolute_deadline = executed.execution_absolute_deadline;
    }

    // ---- 标志位 ----

    pub fn is_single_run(&self) -> bool {
        self.single_run
    }

    pub fn set_single_run(&mut self, single_run: bool) {
        self.single_run = single_run;
    }

    pub fn is_queued(&self) -> bool {
        self.queued
    }

    pub fn set_queued(&mut self, queued: bool) {
        self.queued = queued;
    }

    pub fn is_background(&self) -> bool {
        self.background
    }

    /// 只有Shell任务允许后台执行
    pub fn set_background(&mut self, background: bool) -> SchedulerResult<()> {
        if background && !matches!(self.kind, TaskKind::Shell(_)) {
            return Err(SchedulerError::Validation(format!(
                "只有Shell任务可以在后台执行，任务 {} 的类型为 {}",
                self.name,
                self.kind.type_name()
            )));
        }
        self.background = background;
        Ok(())
    }

    pub fn has_output(&self) -> bool {
        self.output
    }

    pub fn set_output(&mut self, output: bool) {
        self.output = output;
    }

    pub fn is_tracked(&self) -> bool {
        self.tracked
    }

    pub fn set_tracked(&mut self, tracked: bool) {
        self.tracked = tracked;
    }

    fn parse_future_date(&self, value: &str) -> SchedulerResult<DateTime<Utc>> {
        let date = parse_date(value, self.timezone.unwrap_or(chrono_tz::UTC))?;
        if date.timestamp() < Utc::now().timestamp() {
            return Err(SchedulerError::Validation(format!(
                "日期 {value} 早于当前时间"
            )));
        }
        Ok(date)
    }
}

/// 解析日期：先尝试RFC 3339，再按给定时区解释 `YYYY-MM-DD HH:MM:SS`
pub fn parse_date(value: &str, timezone: Tz) -> SchedulerResult<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Ok(date.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(value, NAIVE_DATE_FORMAT)
        .map_err(|e| SchedulerError::Validation(format!("无法解析日期 {value}: {e}")))?;

    timezone
        .from_local_datetime(&naive)
        .single()
        .map(|date| date.with_timezone(&Utc))
        .ok_or_else(|| {
            SchedulerError::Validation(format!("日期 {value} 在时区 {timezone} 中不唯一或不存在"))
        })
}

fn validate_name(name: &str) -> SchedulerResult<()> {
    if name.trim().is_empty() {
        return Err(SchedulerError::Validation("任务名称不能为空".to_string()));
    }
    Ok(())
}

fn validate_priority(priority: i32) -> SchedulerResult<()> {
    if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        return Err(SchedulerError::Validation(format!(
            "优先级必须在 {MIN_PRIORITY} 到 {MAX_PRIORITY} 之间，当前为 {priority}"
        )));
    }
    Ok(())
}

fn validate_nice(nice: i32) -> SchedulerResult<()> {
    if !(MIN_NICE..=MAX_NICE).contains(&nice) {
        return Err(SchedulerError::Validation(format!(
            "nice值必须在 {MIN_NICE} 到 {MAX_NICE} 之间，当前为 {nice}"
        )));
    }
    Ok(())
}
