use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

use crate::models::{Task, TaskList};
use crate::{SchedulerError, SchedulerResult};

pub mod strategies;

pub use strategies::{
    BatchPolicy, DeadlinePolicy, ExecutionDurationPolicy, FirstInFirstOutPolicy, IdlePolicy,
    LastInFirstOutPolicy, MemoryUsagePolicy, NicePolicy,
};

/// 默认调度策略
pub const DEFAULT_POLICY: &str = FirstInFirstOutPolicy::NAME;

/// 调度排序策略
pub trait SchedulePolicy: Send + Sync {
    fn name(&self) -> &str;

    fn support(&self, policy: &str) -> bool {
        self.name() == policy
    }

    fn compare(&self, a: &Task, b: &Task) -> Ordering;
}

/// 调度策略编排器
///
/// 按注册顺序查找第一个支持给定名称的策略，对任务列表做稳定排序。
#[derive(Clone, Default)]
pub struct SchedulePolicyOrchestrator {
    policies: Vec<Arc<dyn SchedulePolicy>>,
}

impl SchedulePolicyOrchestrator {
    pub fn new(policies: Vec<Arc<dyn SchedulePolicy>>) -> Self {
        Self { policies }
    }

    /// 注册全部内置策略
    pub fn with_default_policies() -> Self {
        Self::new(vec![
            Arc::new(FirstInFirstOutPolicy::new()),
            Arc::new(LastInFirstOutPolicy::new()),
            Arc::new(MemoryUsagePolicy::new()),
            Arc::new(ExecutionDurationPolicy::new()),
            Arc::new(DeadlinePolicy::new()),
            Arc::new(IdlePolicy::new()),
            Arc::new(NicePolicy::new()),
            Arc::new(BatchPolicy::new()),
        ])
    }

    pub fn register(&mut self, policy: Arc<dyn SchedulePolicy>) {
        debug!("注册调度策略: {}", policy.name());
        self.policies.push(policy);
    }

    pub fn supports(&self, policy: &str) -> bool {
        self.policies.iter().any(|p| p.support(policy))
    }

    pub fn sort(&self, policy: &str, mut tasks: TaskList) -> SchedulerResult<TaskList> {
        let strategy = self
            .policies
            .iter()
            .find(|p| p.support(policy))
            .ok_or_else(|| SchedulerError::Configuration(format!("不支持的调度策略: {policy}")))?;

        if tasks.len() > 1 {
            tasks.sort_by(|a, b| strategy.compare(a, b));
            debug!("按策略 {} 排序了 {} 个任务", strategy.name(), tasks.len());
        }
        Ok(tasks)
    }
}

impl std::fmt::Debug for SchedulePolicyOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulePolicyOrchestrator")
            .field(
                "policies",
                &self.policies.iter().map(|p| p.name().to_string()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn task(name: &str) -> Task {
        Task::null(name).unwrap()
    }

    fn sorted(policy: &str, tasks: Vec<Task>) -> Vec<String> {
        let list: TaskList = tasks.into_iter().collect();
        SchedulePolicyOrchestrator::with_default_policies()
            .sort(policy, list)
            .unwrap()
            .names()
    }

    #[test]
    fn test_unknown_policy() {
        let orchestrator = SchedulePolicyOrchestrator::with_default_policies();
        let err = orchestrator.sort("random", TaskList::new()).unwrap_err();
        assert!(matches!(err, SchedulerError::Configuration(_)));
        assert!(orchestrator.supports("batch"));
    }

    #[test]
    fn test_fifo_and_lifo() {
        let now = Utc::now();
        let mut early = task("early");
        early.set_scheduled_at(Some(now - Duration::minutes(5)));
        let mut late = task("late");
        late.set_scheduled_at(Some(now));
        let unset = task("unset");

        assert_eq!(
            sorted("first_in_first_out", vec![unset.clone(), late.clone(), early.clone()]),
            vec!["early", "late", "unset"]
        );
        assert_eq!(
            sorted("last_in_first_out", vec![unset, early, late]),
            vec!["late", "early", "unset"]
        );
    }

    #[test]
    fn test_memory_usage_and_duration() {
        let mut heavy = task("heavy");
        heavy.set_execution_memory_usage(Some(2048));
        heavy.set_execution_computation_time(Some(50.0));
        let mut light = task("light");
        light.set_execution_memory_usage(Some(512));
        light.set_execution_computation_time(Some(10.0));
        let fresh = task("fresh");

        assert_eq!(
            sorted("memory_usage", vec![fresh.clone(), light.clone(), heavy.clone()]),
            vec!["heavy", "light", "fresh"]
        );
        assert_eq!(
            sorted("execution_duration", vec![heavy, light, fresh]),
            vec!["fresh", "light", "heavy"]
        );
    }

    #[test]
    fn test_deadline_and_idle() {
        let now = Utc::now();
        let mut soon = task("soon");
        soon.set_execution_absolute_deadline(Some(now + Duration::seconds(10)));
        soon.set_last_execution(Some(now));
        let mut later = task("later");
        later.set_execution_absolute_deadline(Some(now + Duration::hours(1)));
        later.set_last_execution(Some(now - Duration::hours(1)));
        let none = task("none");

        assert_eq!(
            sorted("deadline", vec![none.clone(), later.clone(), soon.clone()]),
            vec!["soon", "later", "none"]
        );
        assert_eq!(
            sorted("idle", vec![soon, later, none]),
            vec!["none", "later", "soon"]
        );
    }

    #[test]
    fn test_nice_and_batch_are_stable() {
        let mut polite = task("polite");
        polite.set_nice(Some(10)).unwrap();
        polite.set_priority(1).unwrap();
        let mut greedy = task("greedy");
        greedy.set_nice(Some(-5)).unwrap();
        greedy.set_priority(100).unwrap();
        let a = task("a");
        let b = task("b");

        assert_eq!(
            sorted("nice", vec![polite.clone(), a.clone(), greedy.clone(), b.clone()]),
            vec!["greedy", "a", "b", "polite"]
        );
        assert_eq!(
            sorted("batch", vec![a, polite, b, greedy]),
            vec!["greedy", "polite", "a", "b"]
        );
    }
}
