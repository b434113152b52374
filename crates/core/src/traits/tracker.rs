use crate::models::Task;

/// 任务执行跟踪接口，记录耗时与内存占用
pub trait TaskExecutionTracker: Send + Sync {
    fn start_tracking(&self, task: &Task);

    /// 把统计结果写回任务
    fn end_tracking(&self, task: &mut Task);
}
