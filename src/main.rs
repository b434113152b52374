use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use tokio::signal;
use tokio::task::JoinError;
use tracing::{info, warn};

use crontask_core::config::{AppConfig, LockBackend};
use crontask_core::models::Task;
use crontask_core::{init_logging, LockStore, SchedulePolicyOrchestrator, SchedulerResult};
use crontask_dispatcher::Scheduler;
use crontask_infrastructure::{InMemoryLockStore, RedisLockStore, TransportFactory};
use crontask_worker::{default_runners, Worker, WorkerOptions};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("crontask")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Cron风格的任务调度与执行引擎")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径，不指定时依次查找默认位置"),
        )
        .arg(
            Arg::new("tasks")
                .short('t')
                .long("tasks")
                .value_name("FILE")
                .help("启动时登记的任务文件（JSON数组）"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，覆盖配置文件")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式，覆盖配置文件")
                .value_parser(["json", "pretty"]),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let mut config = AppConfig::load(config_path).context("加载配置失败")?;
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.logging.format = format.clone();
    }

    init_logging(&config.logging)?;

    info!("启动crontask");
    info!("存储: {}", config.transport.dsn);
    info!("调度策略: {}", config.scheduler.policy);

    let orchestrator = Arc::new(SchedulePolicyOrchestrator::with_default_policies());
    let transport = TransportFactory::new(Arc::clone(&orchestrator))
        .create(&config.transport.dsn)
        .await
        .with_context(|| format!("创建存储失败: {}", config.transport.dsn))?;
    let lock_store = build_lock_store(&config).await?;

    let mut scheduler = Scheduler::new(transport, config.scheduler.timezone()?)
        .with_policy(orchestrator, &config.scheduler.policy)?;
    if config.scheduler.due_task_lock {
        scheduler = scheduler.with_due_task_lock(Arc::clone(&lock_store));
    }
    let scheduler = Arc::new(scheduler);

    if let Some(path) = matches.get_one::<String>("tasks") {
        load_tasks(&scheduler, path).await?;
    }

    let worker = Arc::new(
        Worker::builder(scheduler)
            .register_runners(default_runners())
            .with_lock_store(lock_store)
            .build(),
    );
    let handle = worker.stop_handle();
    let options = WorkerOptions::from(&config.worker);

    let mut running = {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move { worker.execute(options).await })
    };

    tokio::select! {
        result = &mut running => return finish(result),
        signal = wait_for_shutdown_signal() => {
            signal?;
            info!("收到关闭信号，等待当前任务结束...");
            handle.stop();
        }
    }

    match tokio::time::timeout(Duration::from_secs(30), running).await {
        Ok(result) => finish(result),
        Err(_) => {
            warn!("执行器关闭超时，强制退出");
            Ok(())
        }
    }
}

fn finish(result: Result<SchedulerResult<()>, JoinError>) -> Result<()> {
    result
        .context("执行器任务异常结束")?
        .context("执行器运行失败")?;
    info!("crontask已退出");
    Ok(())
}

async fn build_lock_store(config: &AppConfig) -> Result<Arc<dyn LockStore>> {
    match config.lock.backend {
        LockBackend::Memory => Ok(Arc::new(InMemoryLockStore::new())),
        LockBackend::Redis => {
            let url = config
                .lock
                .redis_url
                .as_deref()
                .context("Redis锁需要配置 lock.redis_url")?;
            let store = RedisLockStore::new(url)
                .await
                .with_context(|| format!("连接Redis失败: {url}"))?;
            Ok(Arc::new(store))
        }
    }
}

/// 登记任务文件中的任务，已存在的任务跳过
async fn load_tasks(scheduler: &Scheduler, path: &str) -> Result<()> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("读取任务文件失败: {path}"))?;
    let tasks: Vec<Task> =
        serde_json::from_str(&content).with_context(|| format!("解析任务文件失败: {path}"))?;

    let total = tasks.len();
    let mut scheduled = 0;
    for task in tasks {
        task.validate()
            .with_context(|| format!("任务 {} 配置无效", task.name()))?;
        let name = task.name().to_string();
        match scheduler.schedule(task).await {
            Ok(()) => scheduled += 1,
            Err(e) if e.is_conflict() => warn!("任务 {} 已存在，跳过", name),
            Err(e) => return Err(e).with_context(|| format!("登记任务失败: {name}")),
        }
    }

    info!("从 {} 登记了 {}/{} 个任务", path, scheduled, total);
    Ok(())
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("安装SIGTERM信号处理器失败")?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.context("安装Ctrl+C信号处理器失败")?;
                info!("收到Ctrl+C信号");
            }
            _ = terminate.recv() => {
                info!("收到SIGTERM信号");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .context("安装Ctrl+C信号处理器失败")?;
        info!("收到Ctrl+C信号");
    }

    Ok(())
}
