//! 存储目录清理处理器
//!
//! 逐条尝试全部路径：`NotFound` 记录告警后忽略（目录已不存在即达成目标）；
//! 其余失败汇总为一个 `StorageCleanup` 错误交由重试中间件处理。
//! 重试是安全的，已删除的路径在下一次尝试中会成为 `NotFound`。
//!
use async_trait::async_trait;
use repertoire_domain::command::DeleteDirectories;
use repertoire_domain::error::{DomainError, DomainResult as Result};
use repertoire_domain::eventing::{EventHandler, Publish};
use repertoire_domain::message::Message;
use repertoire_domain::storage::StorageService;
use repertoire_domain::topic::Topic;
use std::sync::Arc;

pub struct DeleteStorageDirectoriesHandler {
    storage: Arc<dyn StorageService>,
}

impl DeleteStorageDirectoriesHandler {
    pub fn new(storage: Arc<dyn StorageService>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl EventHandler for DeleteStorageDirectoriesHandler {
    fn handler_name(&self) -> &str {
        "delete_storage_directories_handler"
    }

    fn topic(&self) -> Topic {
        Topic::DeleteStorageDirectories
    }

    async fn handle(&self, message: &Message) -> Result<Vec<Publish>> {
        let DeleteDirectories { paths } = message.decode()?;
        if paths.is_empty() {
            return Ok(vec![]);
        }

        let results = self.storage.delete_directories(&paths).await;
        if results.len() != paths.len() {
            return Err(DomainError::StorageCleanup {
                failed: vec![(
                    "*".to_string(),
                    format!(
                        "storage returned {} results for {} paths",
                        results.len(),
                        paths.len()
                    ),
                )],
            });
        }

        let mut failed = Vec::new();
        for (path, result) in paths.iter().zip(results) {
            match result {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    tracing::warn!(%path, "storage directory already gone");
                }
                Err(e) => failed.push((path.to_string(), e.to_string())),
            }
        }

        if failed.is_empty() {
            tracing::debug!(directories = paths.len(), "storage directories deleted");
            Ok(vec![])
        } else {
            Err(DomainError::StorageCleanup { failed })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repertoire_domain::storage::{StorageError, StoragePath};
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// 记录调用；`missing` 中的路径返回 NotFound，`broken` 中的返回 Io
    #[derive(Default)]
    struct SpyStorage {
        missing: HashSet<String>,
        broken: HashSet<String>,
        calls: Mutex<Vec<Vec<StoragePath>>>,
    }

    #[async_trait]
    impl StorageService for SpyStorage {
        async fn delete_directories(
            &self,
            paths: &[StoragePath],
        ) -> Vec<std::result::Result<(), StorageError>> {
            self.calls.lock().unwrap().push(paths.to_vec());
            paths
                .iter()
                .map(|p| {
                    let path = p.to_string();
                    if self.missing.contains(&path) {
                        Err(StorageError::NotFound { path })
                    } else if self.broken.contains(&path) {
                        Err(StorageError::Io {
                            path,
                            reason: "permission denied".into(),
                        })
                    } else {
                        Ok(())
                    }
                })
                .collect()
        }
    }

    fn cleanup(paths: &[&str]) -> Message {
        let command = DeleteDirectories {
            paths: paths.iter().map(|p| StoragePath::from(p.to_string())).collect(),
        };
        let mut message = Message::json(&command).unwrap();
        message.set_topic(Topic::DeleteStorageDirectories);
        message
    }

    #[tokio::test]
    async fn deletes_every_path_in_one_call() {
        let storage = Arc::new(SpyStorage::default());
        let handler = DeleteStorageDirectoriesHandler::new(storage.clone());

        handler.handle(&cleanup(&["u/songs/1", "u/songs/2"])).await.unwrap();

        let calls = storage.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 2);
    }

    #[tokio::test]
    async fn not_found_is_ignored() {
        let storage = Arc::new(SpyStorage {
            missing: HashSet::from(["u/songs/1".to_string()]),
            ..Default::default()
        });
        let handler = DeleteStorageDirectoriesHandler::new(storage);

        assert!(handler.handle(&cleanup(&["u/songs/1", "u/songs/2"])).await.is_ok());
    }

    #[tokio::test]
    async fn other_failures_are_aggregated_after_trying_all() {
        let storage = Arc::new(SpyStorage {
            missing: HashSet::from(["u/albums/1".to_string()]),
            broken: HashSet::from(["u/albums/2".to_string(), "u/albums/4".to_string()]),
            ..Default::default()
        });
        let handler = DeleteStorageDirectoriesHandler::new(storage);

        let err = handler
            .handle(&cleanup(&["u/albums/1", "u/albums/2", "u/albums/3", "u/albums/4"]))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        match err {
            DomainError::StorageCleanup { failed } => {
                let paths: Vec<_> = failed.iter().map(|(p, _)| p.as_str()).collect();
                assert_eq!(paths, vec!["u/albums/2", "u/albums/4"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
