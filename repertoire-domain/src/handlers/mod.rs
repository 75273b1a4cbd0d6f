//! 领域事件处理器（handlers）
//!
//! 将曲库 CRUD 层发出的领域事件翻译为搜索索引命令与存储清理命令：
//! - `lifecycle`：四类实体共用的 created/updated/deleted/bulk deleted 翻译；
//! - `user`：用户删除时查询其全部文档并派生删除与清理。
//!
mod lifecycle;
mod user;

pub use lifecycle::{LifecycleHandler, Stage, lifecycle_handlers};
pub use user::UserDeletedHandler;

use crate::catalog::{Album, Artist, Playlist, Song};
use crate::eventing::EventHandler;
use crate::search::SearchEngine;
use std::sync::Arc;

/// 全部领域事件处理器
pub fn domain_handlers(search: Arc<dyn SearchEngine>) -> Vec<Arc<dyn EventHandler>> {
    let mut handlers = Vec::new();
    handlers.extend(lifecycle_handlers::<Song>());
    handlers.extend(lifecycle_handlers::<Album>());
    handlers.extend(lifecycle_handlers::<Artist>());
    handlers.extend(lifecycle_handlers::<Playlist>());
    handlers.push(Arc::new(UserDeletedHandler::new(search)));
    handlers
}
