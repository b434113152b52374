use async_trait::async_trait;

use crate::models::{Output, Task};
use crate::SchedulerResult;

/// 任务执行器接口
///
/// 执行器在开始前把任务置为 `RUNNING`，返回前写入终态。
/// 任务本身执行失败时返回 `Output::error`，
/// 只有执行器自身无法工作（例如回调未注册）时才返回 `Err`。
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// 执行器名称
    fn name(&self) -> &str;

    /// 是否支持执行该任务
    fn support(&self, task: &Task) -> bool;

    /// 执行任务
    async fn run(&self, task: &mut Task) -> SchedulerResult<Output>;
}
