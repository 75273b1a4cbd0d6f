//! 进程配置
//!
//! 命令行参数优先，其次 `REPERTOIRE_*` 环境变量，最后是默认值。
//! 未配置搜索引擎或实时通知服务地址时使用进程内实现，便于单机运行。
//!
use clap::Parser;
use clap::builder::RangedU64ValueParser;
use repertoire_application::TaskTrackerConfig;
use repertoire_domain::eventing::{RetryPolicy, RouterConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "repertoire-worker")]
#[command(about = "Search index & real-time invalidation pipeline for the repertoire catalog")]
#[command(version)]
pub struct Config {
    /// HTTP 监听地址（webhook 与健康检查）
    #[arg(long, default_value = "127.0.0.1:8088", env = "REPERTOIRE_LISTEN")]
    pub listen: SocketAddr,

    /// 搜索引擎地址，例如 http://127.0.0.1:7700
    #[arg(long, env = "REPERTOIRE_SEARCH_URL")]
    pub search_url: Option<String>,

    #[arg(long, env = "REPERTOIRE_SEARCH_API_KEY", hide_env_values = true)]
    pub search_api_key: Option<String>,

    #[arg(long, default_value = "repertoire", env = "REPERTOIRE_SEARCH_INDEX")]
    pub search_index: String,

    /// 实时通知服务地址，例如 http://127.0.0.1:8000
    #[arg(long, env = "REPERTOIRE_NOTIFIER_URL")]
    pub notifier_url: Option<String>,

    #[arg(long, env = "REPERTOIRE_NOTIFIER_API_KEY", hide_env_values = true)]
    pub notifier_api_key: Option<String>,

    /// 用户文件存储根目录
    #[arg(long, default_value = "./storage", env = "REPERTOIRE_STORAGE_ROOT")]
    pub storage_root: PathBuf,

    /// 内存总线每个队列的缓冲容量
    #[arg(
        long,
        default_value_t = 1024,
        env = "REPERTOIRE_BUS_CAPACITY",
        value_parser = at_least_one()
    )]
    pub bus_capacity: usize,

    #[arg(long, default_value_t = 3, env = "REPERTOIRE_MAX_RETRIES")]
    pub max_retries: u32,

    #[arg(long, default_value_t = 100, env = "REPERTOIRE_RETRY_INITIAL_MS")]
    pub retry_initial_ms: u64,

    #[arg(long, default_value_t = 10_000, env = "REPERTOIRE_RETRY_MAX_MS")]
    pub retry_max_ms: u64,

    /// 单队列并发处理上限
    #[arg(
        long,
        default_value_t = 16,
        env = "REPERTOIRE_HANDLER_CONCURRENCY",
        value_parser = at_least_one()
    )]
    pub handler_concurrency: usize,

    #[arg(long, default_value_t = 300, env = "REPERTOIRE_TASK_TTL_SECS")]
    pub task_ttl_secs: u64,

    #[arg(long, default_value_t = 30, env = "REPERTOIRE_TASK_SWEEP_SECS")]
    pub task_sweep_secs: u64,

    /// 外部 HTTP 调用超时
    #[arg(long, default_value_t = 10, env = "REPERTOIRE_HTTP_TIMEOUT_SECS")]
    pub http_timeout_secs: u64,
}

/// 容量、并发度类参数：0 在启动时直接报参数错误
fn at_least_one() -> RangedU64ValueParser<usize> {
    RangedU64ValueParser::<usize>::new().range(1..)
}

impl Config {
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            retry: RetryPolicy {
                max_retries: self.max_retries,
                initial_interval: Duration::from_millis(self.retry_initial_ms),
                max_interval: Duration::from_millis(self.retry_max_ms),
                ..Default::default()
            },
            handler_concurrency: self.handler_concurrency,
            ..Default::default()
        }
    }

    pub fn tracker_config(&self) -> TaskTrackerConfig {
        TaskTrackerConfig {
            ttl: Duration::from_secs(self.task_ttl_secs),
            sweep_interval: Duration::from_secs(self.task_sweep_secs),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
