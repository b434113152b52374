use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crontask_core::{SchedulerError, SchedulerResult, Transport};

use super::operation::composite_transport;
use super::{TransportOperation, TransportReply, ALL_TRANSPORTS_FAILED, NO_TRANSPORT_FOUND};

pub const DEFAULT_QUANTUM: usize = 2;

/// 轮询Transport
///
/// 每次调用从游标处开始，每个后端最多尝试一次，
/// 游标越过所有被访问过的后端，所以连续的调用会落在不同的后端上。
pub struct RoundRobinTransport {
    name: String,
    transports: Vec<Arc<dyn Transport>>,
    quantum: usize,
    cursor: AtomicUsize,
}

impl RoundRobinTransport {
    pub fn new(transports: Vec<Arc<dyn Transport>>) -> Self {
        Self {
            name: "roundrobin".to_string(),
            transports,
            quantum: DEFAULT_QUANTUM,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn with_quantum(
        transports: Vec<Arc<dyn Transport>>,
        quantum: usize,
    ) -> SchedulerResult<Self> {
        if quantum == 0 {
            return Err(SchedulerError::Configuration(
                "轮询Transport的quantum必须大于0".to_string(),
            ));
        }
        let mut transport = Self::new(transports);
        transport.quantum = quantum;
        Ok(transport)
    }

    pub fn quantum(&self) -> usize {
        self.quantum
    }

    pub async fn execute(&self, operation: TransportOperation) -> SchedulerResult<TransportReply> {
        let count = self.transports.len();
        if count == 0 {
            return Err(SchedulerError::transport(NO_TRANSPORT_FOUND));
        }

        let start = self.cursor.load(Ordering::SeqCst) % count;
        let mut last_error = None;

        for offset in 0..count {
            let index = (start + offset) % count;
            let transport = &self.transports[index];
            self.cursor.store((index + 1) % count, Ordering::SeqCst);

            match operation.apply(transport.as_ref()).await {
                Ok(reply) => {
                    debug!(
                        "轮询: {} 在 {} (索引: {}/{}) 上执行成功",
                        operation.name(),
                        transport.name(),
                        index,
                        count
                    );
                    return Ok(reply);
                }
                Err(e) => {
                    warn!(
                        "轮询: {} 在 {} 上执行失败: {}",
                        operation.name(),
                        transport.name(),
                        e
                    );
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

composite_transport!(RoundRobinTransport);
