//! 曲库管道工作进程（repertoire-worker）
//!
//! 负责进程装配：配置解析、外部适配器（搜索引擎、实时通知、本地存储）、HTTP 接口，
//! 以及路由与任务跟踪清扫的受控启停。
//!
pub mod centrifugo;
pub mod config;
pub mod http;
pub mod meilisearch;
pub mod storage_fs;

pub use config::Config;
pub use http::{AppState, build_router};

use centrifugo::CentrifugoNotifier;
use meilisearch::MeilisearchGateway;
use repertoire_application::{AppError, TaskTracker, WebhookIngestor, handlers};
use repertoire_domain::eventing::{
    DispatchFailure, EventRouter, MessageBus, RouterConfig, RouterHandle,
};
use repertoire_domain::notifier::{InMemoryNotifier, RealtimeNotifier};
use repertoire_domain::search::{InMemorySearchEngine, SearchEngine};
use repertoire_domain::storage::StorageService;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use storage_fs::LocalStorage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// 外部协作方
#[derive(Clone)]
pub struct Services {
    pub search: Arc<dyn SearchEngine>,
    pub notifier: Arc<dyn RealtimeNotifier>,
    pub storage: Arc<dyn StorageService>,
}

impl Services {
    /// 按配置选择适配器，未配置地址时退回进程内实现
    ///
    /// 使用外部搜索引擎时先声明索引的可过滤字段。
    pub async fn from_config(config: &Config) -> Result<Self, AppError> {
        let search: Arc<dyn SearchEngine> = match &config.search_url {
            Some(url) => {
                tracing::info!(%url, index = %config.search_index, "using meilisearch gateway");
                let gateway = MeilisearchGateway::new(
                    url.as_str(),
                    config.search_index.as_str(),
                    config.search_api_key.clone(),
                    config.http_timeout(),
                )?;
                gateway.ensure_index().await?;
                Arc::new(gateway)
            }
            None => {
                tracing::warn!("no search engine configured, using in-memory index");
                Arc::new(InMemorySearchEngine::new())
            }
        };

        let notifier: Arc<dyn RealtimeNotifier> = match &config.notifier_url {
            Some(url) => {
                tracing::info!(%url, "using centrifugo notifier");
                Arc::new(CentrifugoNotifier::new(
                    url,
                    config.notifier_api_key.clone(),
                    config.http_timeout(),
                )?)
            }
            None => {
                tracing::warn!("no realtime notifier configured, using in-process broadcast");
                Arc::new(InMemoryNotifier::new(256))
            }
        };

        let storage = Arc::new(LocalStorage::new(config.storage_root.clone()));

        Ok(Self {
            search,
            notifier,
            storage,
        })
    }
}

/// 路由失败上报的累计计数，供健康检查展示
#[derive(Debug, Default)]
pub struct FailureStats {
    dropped: AtomicU64,
    abandoned: AtomicU64,
    unsubscribed: AtomicU64,
}

impl FailureStats {
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn abandoned(&self) -> u64 {
        self.abandoned.load(Ordering::Relaxed)
    }

    pub fn unsubscribed(&self) -> u64 {
        self.unsubscribed.load(Ordering::Relaxed)
    }

    fn record(&self, failure: &DispatchFailure) {
        let counter = match failure {
            DispatchFailure::Subscribe { .. } => &self.unsubscribed,
            DispatchFailure::Exhausted(_) => &self.dropped,
            DispatchFailure::Cancelled(_) => &self.abandoned,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// 启动路由，并把失败上报通道接到计数器
pub fn start_router(
    bus: Arc<dyn MessageBus>,
    services: &Services,
    tracker: Arc<TaskTracker>,
    config: RouterConfig,
    stats: Arc<FailureStats>,
) -> (RouterHandle, Option<JoinHandle<()>>) {
    let router = EventRouter::builder()
        .bus(bus)
        .handlers(handlers(
            services.search.clone(),
            services.storage.clone(),
            tracker,
        ))
        .config(config)
        .build();
    let mut handle = Arc::new(router).start();
    let collector = handle
        .take_errors()
        .map(|rx| tokio::spawn(collect_failures(rx, stats)));
    (handle, collector)
}

pub fn webhook_ingestor(services: &Services, tracker: Arc<TaskTracker>) -> WebhookIngestor {
    WebhookIngestor::new(services.search.clone(), tracker, services.notifier.clone())
}

async fn collect_failures(mut rx: mpsc::Receiver<DispatchFailure>, stats: Arc<FailureStats>) {
    while let Some(failure) = rx.recv().await {
        stats.record(&failure);
        tracing::debug!(?failure, "dispatch failure recorded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use repertoire_domain::eventing::{FailedMessage, InMemoryMessageBus};
    use repertoire_domain::topic::{Queue, Topic};

    fn failed() -> FailedMessage {
        FailedMessage {
            topic: Topic::SongCreated,
            handler: "song_created_handler".into(),
            message_id: "m-1".into(),
            correlation_id: "c-1".into(),
            attempts: 4,
            error: "search engine error: down".into(),
        }
    }

    #[test]
    fn stats_count_each_failure_kind() {
        let stats = FailureStats::default();
        stats.record(&DispatchFailure::Exhausted(failed()));
        stats.record(&DispatchFailure::Exhausted(failed()));
        stats.record(&DispatchFailure::Cancelled(failed()));
        stats.record(&DispatchFailure::Subscribe {
            queue: Queue::Songs,
            error: "closed".into(),
        });

        assert_eq!(stats.dropped(), 2);
        assert_eq!(stats.abandoned(), 1);
        assert_eq!(stats.unsubscribed(), 1);
    }

    #[tokio::test]
    async fn unconfigured_services_fall_back_to_in_process() {
        let root = tempfile::tempdir().unwrap();
        let config = Config::try_parse_from([
            "repertoire-worker",
            "--storage-root",
            root.path().to_str().unwrap(),
        ])
        .unwrap();
        let config = Config {
            search_url: None,
            notifier_url: None,
            ..config
        };

        let services = Services::from_config(&config).await.unwrap();
        assert!(services.search.has_task_succeeded("succeeded"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn closed_bus_is_counted_as_unsubscribed() {
        let bus = InMemoryMessageBus::new(8);
        bus.close().await.unwrap();
        let config = Config::try_parse_from(["repertoire-worker"]).unwrap();
        let config = Config {
            search_url: None,
            notifier_url: None,
            ..config
        };
        let services = Services::from_config(&config).await.unwrap();
        let stats = Arc::new(FailureStats::default());

        let (handle, collector) = start_router(
            Arc::new(bus),
            &services,
            Arc::new(TaskTracker::default()),
            RouterConfig::default(),
            stats.clone(),
        );
        handle.join().await;
        // 所有队列任务退出后发送端全部释放，收集任务随之结束
        collector.unwrap().await.unwrap();

        assert_eq!(stats.unsubscribed(), 7);
    }
}
