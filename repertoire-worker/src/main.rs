//! repertoire-worker：曲库检索索引与实时失效通知管道
//!
//! 启动顺序：日志 → 配置 → 适配器 → 任务跟踪清扫 → 路由 → HTTP；
//! 收到终止信号后反向关闭：HTTP → 路由（排空在途消息）→ 清扫 → 总线。

use anyhow::{Context, Result};
use clap::Parser;
use repertoire_application::TaskTracker;
use repertoire_domain::eventing::{InMemoryMessageBus, MessageBus};
use repertoire_worker::{
    AppState, Config, FailureStats, Services, build_router, start_router, webhook_ingestor,
};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = Config::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.listen,
        "starting repertoire-worker"
    );

    let services = Services::from_config(&config)
        .await
        .context("failed to build adapters")?;
    let bus = InMemoryMessageBus::new(config.bus_capacity);
    let tracker = Arc::new(TaskTracker::new(config.tracker_config()));
    let failures = Arc::new(FailureStats::default());

    let background = CancellationToken::new();
    let sweeper = tracker.spawn_sweeper(background.child_token());

    let (router, collector) = start_router(
        Arc::new(bus.clone()),
        &services,
        tracker.clone(),
        config.router_config(),
        failures.clone(),
    );

    let state = AppState::new(
        Arc::new(webhook_ingestor(&services, tracker)),
        Arc::new(bus.clone()),
        router.monitor(),
        failures,
    );

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    info!("listening on http://{}", config.listen);

    let served = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error");

    info!("shutting down event router");
    router.shutdown();
    router.join().await;
    if let Some(collector) = collector {
        if let Err(e) = collector.await {
            warn!(error = %e, "failure collector aborted");
        }
    }

    background.cancel();
    if let Err(e) = sweeper.await {
        warn!(error = %e, "task tracker sweeper aborted");
    }
    bus.close().await.context("failed to close bus")?;

    served?;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received SIGTERM"),
    }
}
