use futures::future::try_join_all;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crontask_core::{SchedulerError, SchedulerResult, Transport};

use super::operation::composite_transport;
use super::{TransportOperation, TransportReply, NO_TRANSPORT_FOUND};

pub const LONG_TAIL_FAILED: &str = "The transport failed to execute the requested action";

/// 长尾Transport
///
/// 每次操作前按任务数量升序重排后端（稳定排序），只在任务最少的后端上执行，失败不回退。
pub struct LongTailTransport {
    name: String,
    transports: Mutex<Vec<Arc<dyn Transport>>>,
}

impl LongTailTransport {
    pub fn new(transports: Vec<Arc<dyn Transport>>) -> Self {
        Self {
            name: "longtail".to_string(),
            transports: Mutex::new(transports),
        }
    }

    /// 当前的后端顺序
    pub async fn order(&self) -> Vec<String> {
        self.transports
            .lock()
            .await
            .iter()
            .map(|t| t.name().to_string())
            .collect()
    }

    pub async fn execute(&self, operation: TransportOperation) -> SchedulerResult<TransportReply> {
        let lightest = {
            let mut transports = self.transports.lock().await;
            if transports.is_empty() {
                return Err(SchedulerError::transport(NO_TRANSPORT_FOUND));
            }

            let counts = try_join_all(transports.iter().map(|t| async move {
                t.list().await.map(|list| list.len())
            }))
            .await
            .map_err(|e| SchedulerError::transport_with_source("无法获取后端的任务数量", e))?;

            let mut ranked: Vec<(usize, Arc<dyn Transport>)> =
                counts.into_iter().zip(transports.drain(..)).collect();
            ranked.sort_by_key(|(count, _)| *count);
            transports.extend(ranked.into_iter().map(|(_, t)| t));

            Arc::clone(&transports[0])
        };

        debug!("长尾: {} 路由到 {}", operation.name(), lightest.name());

        operation.apply(lightest.as_ref()).await.map_err(|e| {
            warn!(
                "长尾: {} 在 {} 上执行失败: {}",
                operation.name(),
                lightest.name(),
                e
            );
            SchedulerError::transport_with_source(LONG_TAIL_FAILED, e)
        })
    }
}

composite_transport!(LongTailTransport);
