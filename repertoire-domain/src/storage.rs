//! 存储清理协议（StorageService）
//!
//! 外部存储服务只需支持按目录批量删除，并逐条返回结果；
//! 路径约定：用户根目录 `<userId>`，实体目录 `<userId>/<复数类别>/<entityId>`。
//!
use crate::search::DocumentKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// 存储目录路径（相对存储根）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoragePath(String);

impl StoragePath {
    pub fn user_root(user_id: Uuid) -> Self {
        Self(user_id.to_string())
    }

    pub fn entity(user_id: Uuid, kind: DocumentKind, entity_id: Uuid) -> Self {
        Self(format!("{user_id}/{}/{entity_id}", kind.plural()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for StoragePath {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// 单条目录删除的失败原因
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("directory not found: {path}")]
    NotFound { path: String },
    #[error("invalid storage path: {path}")]
    InvalidPath { path: String },
    #[error("storage error: path={path}, reason={reason}")]
    Io { path: String, reason: String },
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// 存储服务：结果与入参一一对应
#[async_trait]
pub trait StorageService: Send + Sync {
    async fn delete_directories(&self, paths: &[StoragePath]) -> Vec<Result<(), StorageError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_paths_nest_under_user_root() {
        let user = Uuid::new_v4();
        let playlist = Uuid::new_v4();
        let root = StoragePath::user_root(user);
        let path = StoragePath::entity(user, DocumentKind::Playlist, playlist);

        assert_eq!(path.as_str(), format!("{user}/playlists/{playlist}"));
        assert!(path.as_str().starts_with(root.as_str()));
    }

    #[test]
    fn serializes_as_plain_string() {
        let path = StoragePath::from("u/songs/s".to_string());
        assert_eq!(serde_json::to_string(&path).unwrap(), "\"u/songs/s\"");
    }
}
