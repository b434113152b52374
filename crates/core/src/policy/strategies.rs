use std::cmp::Ordering;

use super::SchedulePolicy;
use crate::models::Task;

/// 有值的排在前面，都没有值时视为相等
fn some_first<T, F>(a: Option<T>, b: Option<T>, compare: F) -> Ordering
where
    F: FnOnce(T, T) -> Ordering,
{
    match (a, b) {
        (Some(a), Some(b)) => compare(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// 没有值的排在前面
fn none_first<T, F>(a: Option<T>, b: Option<T>, compare: F) -> Ordering
where
    F: FnOnce(T, T) -> Ordering,
{
    match (a, b) {
        (Some(a), Some(b)) => compare(a, b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

macro_rules! simple_policy {
    ($(#[$meta:meta])* $ty:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $ty;

        impl $ty {
            pub const NAME: &'static str = $name;

            pub fn new() -> Self {
                Self
            }
        }
    };
}

simple_policy!(
    /// 先调度的先执行，未调度的排在最后
    FirstInFirstOutPolicy,
    "first_in_first_out"
);
simple_policy!(
    /// 后调度的先执行，未调度的排在最后
    LastInFirstOutPolicy,
    "last_in_first_out"
);
simple_policy!(
    /// 内存占用高的先执行
    MemoryUsagePolicy,
    "memory_usage"
);
simple_policy!(
    /// 执行耗时短的先执行，没有耗时记录的最先
    ExecutionDurationPolicy,
    "execution_duration"
);
simple_policy!(
    /// 绝对截止时间早的先执行
    DeadlinePolicy,
    "deadline"
);
simple_policy!(
    /// 空闲最久的先执行，从未执行过的最先
    IdlePolicy,
    "idle"
);
simple_policy!(
    /// nice值小的先执行，未设置按0处理
    NicePolicy,
    "nice"
);
simple_policy!(
    /// 优先级高的先执行
    BatchPolicy,
    "batch"
);

impl SchedulePolicy for FirstInFirstOutPolicy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn compare(&self, a: &Task, b: &Task) -> Ordering {
        some_first(a.scheduled_at(), b.scheduled_at(), |a, b| a.cmp(&b))
    }
}

impl SchedulePolicy for LastInFirstOutPolicy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn compare(&self, a: &Task, b: &Task) -> Ordering {
        some_first(a.scheduled_at(), b.scheduled_at(), |a, b| b.cmp(&a))
    }
}

impl SchedulePolicy for MemoryUsagePolicy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn compare(&self, a: &Task, b: &Task) -> Ordering {
        // 未记录的视为最低占用
        some_first(
            a.execution_memory_usage(),
            b.execution_memory_usage(),
            |a, b| b.cmp(&a),
        )
    }
}

impl SchedulePolicy for ExecutionDurationPolicy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn compare(&self, a: &Task, b: &Task) -> Ordering {
        none_first(
            a.execution_computation_time(),
            b.execution_computation_time(),
            |a, b| a.total_cmp(&b),
        )
    }
}

impl SchedulePolicy for DeadlinePolicy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn compare(&self, a: &Task, b: &Task) -> Ordering {
        some_first(
            a.execution_absolute_deadline(),
            b.execution_absolute_deadline(),
            |a, b| a.cmp(&b),
        )
    }
}

impl SchedulePolicy for IdlePolicy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn compare(&self, a: &Task, b: &Task) -> Ordering {
        none_first(a.last_execution(), b.last_execution(), |a, b| a.cmp(&b))
    }
}

impl SchedulePolicy for NicePolicy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn compare(&self, a: &Task, b: &Task) -> Ordering {
        a.nice().unwrap_or(0).cmp(&b.nice().unwrap_or(0))
    }
}

impl SchedulePolicy for BatchPolicy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn compare(&self, a: &Task, b: &Task) -> Ordering {
        b.priority().cmp(&a.priority())
    }
}
