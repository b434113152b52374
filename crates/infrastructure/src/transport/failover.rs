use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crontask_core::{SchedulerError, SchedulerResult, Transport};

use super::operation::composite_transport;
use super::{TransportOperation, TransportReply, ALL_TRANSPORTS_FAILED, NO_TRANSPORT_FOUND};

/// 故障转移模式，目前只有 `normal`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailoverMode {
    #[default]
    Normal,
}

impl std::str::FromStr for FailoverMode {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(FailoverMode::Normal),
            other => Err(SchedulerError::Configuration(format!(
                "不支持的故障转移模式: {other}"
            ))),
        }
    }
}

/// 故障转移Transport
///
/// 按顺序尝试后端，失败的后端在本实例的生命周期内不再使用。
///
/// 任何错误都算作后端失败，包括 `TaskNotFound` 和 `Conflict` 这类业务错误。
/// 例如在第一个后端上注销不存在的任务，会让该后端在之后被跳过。
pub struct FailoverTransport {
    name: String,
    transports: Vec<Arc<dyn Transport>>,
    failed: Mutex<Vec<bool>>,
    mode: FailoverMode,
}

impl FailoverTransport {
    pub fn new(transports: Vec<Arc<dyn Transport>>) -> Self {
        Self::with_mode(transports, FailoverMode::default())
    }

    pub fn with_mode(transports: Vec<Arc<dyn Transport>>, mode: FailoverMode) -> Self {
        let failed = Mutex::new(vec![false; transports.len()]);
        Self {
            name: "failover".to_string(),
            transports,
            failed,
            mode,
        }
    }

    pub fn mode(&self) -> FailoverMode {
        self.mode
    }

    /// 仍可用的后端数量
    pub fn available_count(&self) -> usize {
        self.failed_slots().iter().filter(|failed| !**failed).count()
    }

    fn failed_slots(&self) -> std::sync::MutexGuard<'_, Vec<bool>> {
        self.failed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub async fn execute(&self, operation: TransportOperation) -> SchedulerResult<TransportReply> {
        if self.transports.is_empty() {
            return Err(SchedulerError::transport(NO_TRANSPORT_FOUND));
        }

        let mut last_error = None;
        for (index, transport) in self.transports.iter().enumerate() {
            if self.failed_slots()[index] {
                continue;
            }

            match operation.apply(transport.as_ref()).await {
                Ok(reply) => {
                    debug!(
                        "故障转移: {} 在 {} 上执行成功",
                        operation.name(),
                        transport.name()
                    );
                    return Ok(reply);
                }
                Err(e) => {
                    warn!(
                        "故障转移: {} 在 {} 上执行失败，标记为不可用: {}",
                        operation.name(),
                        transport.name(),
                        e
                    );
                    self.failed_slots()[index] = true;
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e) => SchedulerError::transport_with_source(ALL_TRANSPORTS_FAILED, e),
            None => SchedulerError::transport(ALL_TRANSPORTS_FAILED),
        })
    }
}

composite_transport!(FailoverTransport);
