use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tracing::info;

use crontask_core::{SchedulePolicyOrchestrator, SchedulerError, SchedulerResult, Transport, DEFAULT_POLICY};

use super::{
    Dsn, FailoverMode, FailoverTransport, InMemoryTransport, LongTailTransport,
    RoundRobinTransport, SqliteTransport,
};

/// 根据连接串创建Transport，组合连接串会递归创建其成员
#[derive(Debug, Clone)]
pub struct TransportFactory {
    orchestrator: Arc<SchedulePolicyOrchestrator>,
}

impl TransportFactory {
    pub fn new(orchestrator: Arc<SchedulePolicyOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub async fn create(&self, dsn: &str) -> SchedulerResult<Arc<dyn Transport>> {
        let parsed = Dsn::parse(dsn)?;
        let transport = self.build(&parsed).await?;
        info!("已创建Transport: {}", dsn);
        Ok(transport)
    }

    fn build<'a>(&'a self, dsn: &'a Dsn) -> BoxFuture<'a, SchedulerResult<Arc<dyn Transport>>> {
        async move {
            match dsn {
                Dsn::Single {
                    scheme, host, raw, ..
                } => match scheme.as_str() {
                    "memory" | "in-memory" => {
                        let policy = if host.is_empty() { DEFAULT_POLICY } else { host.as_str() };
                        let transport = InMemoryTransport::new(policy, Arc::clone(&self.orchestrator))?;
                        Ok(Arc::new(transport) as Arc<dyn Transport>)
                    }
                    "sqlite" => {
                        let transport = SqliteTransport::connect(raw).await?;
                        Ok(Arc::new(transport) as Arc<dyn Transport>)
                    }
                    "failover" | "roundrobin" | "rr" | "longtail" | "lt" => {
                        Err(SchedulerError::Configuration(format!(
                            "组合Transport需要使用括号列出成员: {raw}"
                        )))
                    }
                    other => Err(SchedulerError::Configuration(format!(
                        "不支持的Transport类型: {other}"
                    ))),
                },
                Dsn::Composite { scheme, members, .. } => {
                    let mut transports = Vec::with_capacity(members.len());
                    for member in members {
                        transports.push(self.build(member).await?);
                    }

                    match scheme.as_str() {
                        "failover" => {
                            let mode = match dsn.option("mode") {
                                Some(mode) => mode.parse::<FailoverMode>()?,
                                None => FailoverMode::default(),
                            };
                            Ok(Arc::new(FailoverTransport::with_mode(transports, mode))
                                as Arc<dyn Transport>)
                        }
                        "roundrobin" | "rr" => {
                            let transport = match dsn.option("quantum") {
                                Some(quantum) => {
                                    let quantum = quantum.parse::<usize>().map_err(|e| {
                                        SchedulerError::Configuration(format!(
                                            "无效的quantum {quantum}: {e}"
                                        ))
                                    })?;
                                    RoundRobinTransport::with_quantum(transports, quantum)?
                                }
                                None => RoundRobinTransport::new(transports),
                            };
                            Ok(Arc::new(transport) as Arc<dyn Transport>)
                        }
                        "longtail" | "lt" => {
                            Ok(Arc::new(LongTailTransport::new(transports)) as Arc<dyn Transport>)
                        }
                        other => Err(SchedulerError::Configuration(format!(
                            "不支持的组合Transport类型: {other}"
                        ))),
                    }
                }
            }
        }
        .boxed()
    }
}

impl Default for TransportFactory {
    fn default() -> Self {
        Self::new(Arc::new(SchedulePolicyOrchestrator::with_default_policies()))
    }
}
