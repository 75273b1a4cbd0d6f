//! 本地文件系统存储（LocalStorage）
//!
//! 路径均相对存储根目录解析；绝对路径、`..` 等会逃出根目录的路径直接拒绝。
//!
use async_trait::async_trait;
use repertoire_domain::storage::{StorageError, StoragePath, StorageService};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &StoragePath) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path.as_str());
        let safe = !path.as_str().is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
            && relative.components().any(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidPath {
                path: path.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }

    async fn delete_one(&self, path: &StoragePath) -> Result<(), StorageError> {
        let dir = self.resolve(path)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                tracing::debug!(%path, "directory removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound {
                path: path.to_string(),
            }),
            Err(e) => Err(StorageError::Io {
                path: path.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

#[async_trait]
impl StorageService for LocalStorage {
    async fn delete_directories(&self, paths: &[StoragePath]) -> Vec<Result<(), StorageError>> {
        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            results.push(self.delete_one(path).await);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repertoire_domain::search::DocumentKind;
    use uuid::Uuid;

    #[tokio::test]
    async fn removes_existing_and_reports_missing() {
        let root = tempfile::tempdir().unwrap();
        let user = Uuid::new_v4();
        let present = StoragePath::entity(user, DocumentKind::Song, Uuid::new_v4());
        let missing = StoragePath::entity(user, DocumentKind::Song, Uuid::new_v4());
        let dir = root.path().join(present.as_str());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("audio.flac"), b"flac").unwrap();

        let storage = LocalStorage::new(root.path());
        let results = storage
            .delete_directories(&[present.clone(), missing.clone()])
            .await;

        assert_eq!(results[0], Ok(()));
        assert!(!dir.exists());
        assert!(results[1].as_ref().unwrap_err().is_not_found());
        // 用户根目录保留
        assert!(root.path().join(user.to_string()).exists());
    }

    #[tokio::test]
    async fn rejects_paths_escaping_the_root() {
        let root = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(root.path().join("data"));

        for raw in ["../outside", "/etc", "", ".", "a/../../b"] {
            let results = storage
                .delete_directories(&[StoragePath::from(raw.to_string())])
                .await;
            assert!(
                matches!(results[0], Err(StorageError::InvalidPath { .. })),
                "{raw:?} should be rejected"
            );
        }
        assert!(root.path().exists());
    }
}
