//! 曲库管道应用层（repertoire-application）
//!
//! 在领域协议之上实现与外部系统交互的部分：
//! - 搜索索引命令处理器（`index_handlers`）与存储清理处理器（`storage_cleanup`）
//! - 搜索任务跟踪器（`task_tracker`）
//! - 任务完成回调的解析与通知（`webhook`）
//!
pub mod error;
pub mod index_handlers;
pub mod storage_cleanup;
pub mod task_tracker;
pub mod webhook;

pub use error::{AppError, AppResult, WebhookError};
pub use task_tracker::{TaskTracker, TaskTrackerConfig};
pub use webhook::{TaskRecord, WebhookIngestor, WebhookOutcome};

use index_handlers::{
    AddToSearchIndexHandler, RemoveFromSearchIndexHandler, UpdateInSearchIndexHandler,
};
use repertoire_domain::eventing::EventHandler;
use repertoire_domain::handlers::domain_handlers;
use repertoire_domain::search::SearchEngine;
use repertoire_domain::storage::StorageService;
use std::sync::Arc;
use storage_cleanup::DeleteStorageDirectoriesHandler;

/// 路由需要注册的全部处理器：领域事件翻译 + 索引/存储命令执行
pub fn handlers(
    search: Arc<dyn SearchEngine>,
    storage: Arc<dyn StorageService>,
    tracker: Arc<TaskTracker>,
) -> Vec<Arc<dyn EventHandler>> {
    let mut handlers = domain_handlers(search.clone());
    handlers.push(Arc::new(AddToSearchIndexHandler::new(search.clone())));
    handlers.push(Arc::new(UpdateInSearchIndexHandler::new(
        search.clone(),
        tracker.clone(),
    )));
    handlers.push(Arc::new(RemoveFromSearchIndexHandler::new(search, tracker)));
    handlers.push(Arc::new(DeleteStorageDirectoriesHandler::new(storage)));
    handlers
}
