use std::time::Duration;

use crontask_core::config::WorkerConfig;

/// 执行器运行参数
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerOptions {
    /// 两轮调度之间的等待时间
    pub sleep_duration_delay: Duration,
    /// 执行（含失败）多少个任务后停止
    pub task_limit: Option<usize>,
    /// 运行多久后停止
    pub time_limit: Option<Duration>,
    /// 失败多少个任务后停止
    pub failure_limit: Option<usize>,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            sleep_duration_delay: Duration::from_secs(1),
            task_limit: None,
            time_limit: None,
            failure_limit: None,
        }
    }
}

impl WorkerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sleep_duration_delay(mut self, delay: Duration) -> Self {
        self.sleep_duration_delay = delay;
        self
    }

    pub fn with_task_limit(mut self, limit: usize) -> Self {
        self.task_limit = Some(limit);
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_failure_limit(mut self, limit: usize) -> Self {
        self.failure_limit = Some(limit);
        self
    }
}

impl From<&WorkerConfig> for WorkerOptions {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            sleep_duration_delay: Duration::from_secs(config.sleep_duration_delay),
            task_limit: config.task_limit,
            time_limit: config.time_limit_seconds.map(Duration::from_secs),
            failure_limit: config.failure_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let config = WorkerConfig {
            sleep_duration_delay: 5,
            task_limit: Some(10),
            time_limit_seconds: Some(60),
            failure_limit: None,
        };

        let options = WorkerOptions::from(&config);

        assert_eq!(options.sleep_duration_delay, Duration::from_secs(5));
        assert_eq!(options.task_limit, Some(10));
        assert_eq!(options.time_limit, Some(Duration::from_secs(60)));
        assert_eq!(options.failure_limit, None);
    }
}
