//! 搜索索引命令处理器
//!
//! 消费 `search_index` 队列上的命令并调用搜索引擎网关；更新与删除返回的任务 ID
//! 写入 `TaskTracker`，以便完成回调时关联回发起用户。
//!
use crate::task_tracker::TaskTracker;
use async_trait::async_trait;
use repertoire_domain::command::{IndexDocuments, RemoveDocuments, UpdateDocuments};
use repertoire_domain::error::DomainResult as Result;
use repertoire_domain::eventing::{EventHandler, Publish};
use repertoire_domain::message::Message;
use repertoire_domain::search::SearchEngine;
use repertoire_domain::topic::Topic;
use std::sync::Arc;

pub struct AddToSearchIndexHandler {
    search: Arc<dyn SearchEngine>,
}

impl AddToSearchIndexHandler {
    pub fn new(search: Arc<dyn SearchEngine>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl EventHandler for AddToSearchIndexHandler {
    fn handler_name(&self) -> &str {
        "add_to_search_index_handler"
    }

    fn topic(&self) -> Topic {
        Topic::AddToSearchIndex
    }

    async fn handle(&self, message: &Message) -> Result<Vec<Publish>> {
        let IndexDocuments { documents } = message.decode()?;
        if documents.is_empty() {
            return Ok(vec![]);
        }
        self.search.add_documents(&documents).await?;
        tracing::debug!(documents = documents.len(), "documents submitted for indexing");
        Ok(vec![])
    }
}

pub struct UpdateInSearchIndexHandler {
    search: Arc<dyn SearchEngine>,
    tracker: Arc<TaskTracker>,
}

impl UpdateInSearchIndexHandler {
    pub fn new(search: Arc<dyn SearchEngine>, tracker: Arc<TaskTracker>) -> Self {
        Self { search, tracker }
    }
}

#[async_trait]
impl EventHandler for UpdateInSearchIndexHandler {
    fn handler_name(&self) -> &str {
        "update_in_search_index_handler"
    }

    fn topic(&self) -> Topic {
        Topic::UpdateInSearchIndex
    }

    async fn handle(&self, message: &Message) -> Result<Vec<Publish>> {
        let UpdateDocuments { user_id, documents } = message.decode()?;
        if documents.is_empty() {
            return Ok(vec![]);
        }
        let task_uid = self.search.update_documents(&documents).await?;
        self.tracker.track(task_uid, user_id);
        Ok(vec![])
    }
}

pub struct RemoveFromSearchIndexHandler {
    search: Arc<dyn SearchEngine>,
    tracker: Arc<TaskTracker>,
}

impl RemoveFromSearchIndexHandler {
    pub fn new(search: Arc<dyn SearchEngine>, tracker: Arc<TaskTracker>) -> Self {
        Self { search, tracker }
    }
}

#[async_trait]
impl EventHandler for RemoveFromSearchIndexHandler {
    fn handler_name(&self) -> &str {
        "remove_from_search_index_handler"
    }

    fn topic(&self) -> Topic {
        Topic::RemoveFromSearchIndex
    }

    async fn handle(&self, message: &Message) -> Result<Vec<Publish>> {
        let RemoveDocuments { user_id, ids } = message.decode()?;
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let task_uid = self.search.delete_documents(&ids).await?;
        self.tracker.track(task_uid, user_id);
        Ok(vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use repertoire_domain::error::DomainError;
    use repertoire_domain::search::{
        DocumentBody, DocumentFields, DocumentFilter, DocumentId, InMemorySearchEngine,
        PlaylistDocument, SearchDocument, TaskUid,
    };
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    fn playlist_doc(user_id: Uuid) -> SearchDocument {
        let now = Utc::now();
        SearchDocument::new(
            Uuid::new_v4(),
            user_id,
            now,
            now,
            DocumentBody::Playlist(PlaylistDocument {
                title: "Sunday".into(),
                cover_url: None,
            }),
        )
    }

    fn command<T: serde::Serialize>(topic: Topic, payload: &T) -> Message {
        let mut message = Message::json(payload).unwrap();
        message.set_topic(topic);
        message
    }

    #[tokio::test]
    async fn add_submits_documents_without_tracking() {
        let engine = Arc::new(InMemorySearchEngine::new());
        let handler = AddToSearchIndexHandler::new(engine.clone());
        let doc = playlist_doc(Uuid::new_v4());

        let out = handler
            .handle(&command(
                Topic::AddToSearchIndex,
                &IndexDocuments {
                    documents: vec![doc.clone()],
                },
            ))
            .await
            .unwrap();

        assert!(out.is_empty());
        assert_eq!(engine.len(), 1);
        assert!(engine.get_document(&doc.id()).await.is_ok());
    }

    #[tokio::test]
    async fn update_tracks_task_for_owner() {
        let engine = Arc::new(InMemorySearchEngine::new());
        let tracker = Arc::new(TaskTracker::default());
        let handler = UpdateInSearchIndexHandler::new(engine.clone(), tracker.clone());
        let user = Uuid::new_v4();

        handler
            .handle(&command(
                Topic::UpdateInSearchIndex,
                &UpdateDocuments {
                    user_id: user,
                    documents: vec![playlist_doc(user)],
                },
            ))
            .await
            .unwrap();

        assert_eq!(tracker.len(), 1);
        // 内存引擎的任务 ID 从 1 开始递增
        assert_eq!(tracker.get_user_id(1), Some(user));
    }

    #[tokio::test]
    async fn remove_deletes_and_tracks() {
        let engine = Arc::new(InMemorySearchEngine::new());
        let tracker = Arc::new(TaskTracker::default());
        let user = Uuid::new_v4();
        let doc = playlist_doc(user);
        engine.add_documents(std::slice::from_ref(&doc)).await.unwrap();

        let handler = RemoveFromSearchIndexHandler::new(engine.clone(), tracker.clone());
        handler
            .handle(&command(
                Topic::RemoveFromSearchIndex,
                &RemoveDocuments {
                    user_id: user,
                    ids: vec![doc.id()],
                },
            ))
            .await
            .unwrap();

        assert!(engine.is_empty());
        assert_eq!(tracker.get_user_id(2), Some(user));
    }

    /// 始终不可用的引擎
    struct DownEngine {
        calls: AtomicU32,
    }

    #[async_trait]
    impl SearchEngine for DownEngine {
        async fn add_documents(&self, _: &[SearchDocument]) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(DomainError::search_engine("503 service unavailable"))
        }

        async fn update_documents(&self, _: &[SearchDocument]) -> Result<TaskUid> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(DomainError::search_engine("503 service unavailable"))
        }

        async fn delete_documents(&self, _: &[DocumentId]) -> Result<TaskUid> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(DomainError::search_engine("503 service unavailable"))
        }

        async fn get_document(&self, _: &DocumentId) -> Result<DocumentFields> {
            Err(DomainError::search_engine("503 service unavailable"))
        }

        async fn get_documents(&self, _: &DocumentFilter) -> Result<Vec<DocumentFields>> {
            Err(DomainError::search_engine("503 service unavailable"))
        }

        fn has_task_succeeded(&self, _: &str) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn gateway_failure_is_transient_and_nothing_is_tracked() {
        let engine = Arc::new(DownEngine {
            calls: AtomicU32::new(0),
        });
        let tracker = Arc::new(TaskTracker::default());
        let handler = UpdateInSearchIndexHandler::new(engine.clone(), tracker.clone());
        let user = Uuid::new_v4();

        let err = handler
            .handle(&command(
                Topic::UpdateInSearchIndex,
                &UpdateDocuments {
                    user_id: user,
                    documents: vec![playlist_doc(user)],
                },
            ))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn empty_batches_skip_the_gateway() {
        let engine = Arc::new(DownEngine {
            calls: AtomicU32::new(0),
        });
        let tracker = Arc::new(TaskTracker::default());
        let add = AddToSearchIndexHandler::new(engine.clone());
        let remove = RemoveFromSearchIndexHandler::new(engine.clone(), tracker);

        add.handle(&command(
            Topic::AddToSearchIndex,
            &IndexDocuments { documents: vec![] },
        ))
        .await
        .unwrap();
        remove
            .handle(&command(
                Topic::RemoveFromSearchIndex,
                &RemoveDocuments {
                    user_id: Uuid::new_v4(),
                    ids: vec![],
                },
            ))
            .await
            .unwrap();

        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }
}
