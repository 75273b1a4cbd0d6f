//! 管道命令载荷
//!
//! 领域事件处理器派生出的后续命令，分别发布到搜索索引与存储清理主题。
//!
use crate::search::{DocumentId, SearchDocument};
use crate::storage::StoragePath;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `add_to_search_index`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDocuments {
    pub documents: Vec<SearchDocument>,
}

/// `update_in_search_index`，完成状态需关联回 `user_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDocuments {
    pub user_id: Uuid,
    pub documents: Vec<SearchDocument>,
}

/// `remove_from_search_index`，完成状态需关联回 `user_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveDocuments {
    pub user_id: Uuid,
    pub ids: Vec<DocumentId>,
}

/// `delete_storage_directories`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteDirectories {
    pub paths: Vec<StoragePath>,
}
