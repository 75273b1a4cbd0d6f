//! 内存版搜索引擎（InMemorySearchEngine）
//!
//! 满足 `SearchEngine` 协议的进程内实现，任务同步完成并记为 `succeeded`。
//! 典型用途：测试、示例与无外部搜索服务的本地运行。
//!
use super::{DocumentFields, DocumentFilter, DocumentId, SearchDocument, SearchEngine, TaskUid};
use crate::error::{DomainError, DomainResult as Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

pub const TASK_SUCCEEDED: &str = "succeeded";
pub const TASK_FAILED: &str = "failed";

#[derive(Default)]
struct State {
    documents: BTreeMap<String, DocumentFields>,
    tasks: HashMap<TaskUid, &'static str>,
    next_task: TaskUid,
}

impl State {
    fn enqueue(&mut self, status: &'static str) -> TaskUid {
        self.next_task += 1;
        self.tasks.insert(self.next_task, status);
        self.next_task
    }
}

#[derive(Default)]
pub struct InMemorySearchEngine {
    state: Mutex<State>,
}

impl InMemorySearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| DomainError::search_engine(e.to_string()))
    }

    fn upsert(state: &mut State, documents: &[SearchDocument]) -> Result<()> {
        for doc in documents {
            let value = serde_json::to_value(doc)?;
            if let serde_json::Value::Object(fields) = value {
                state.documents.insert(doc.id().to_string(), fields);
            }
        }
        Ok(())
    }

    /// 任务状态（测试与诊断用）
    pub fn task_status(&self, uid: TaskUid) -> Option<&'static str> {
        self.state().ok()?.tasks.get(&uid).copied()
    }

    pub fn len(&self) -> usize {
        self.state().map(|s| s.documents.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SearchEngine for InMemorySearchEngine {
    async fn add_documents(&self, documents: &[SearchDocument]) -> Result<()> {
        let mut state = self.state()?;
        Self::upsert(&mut state, documents)?;
        state.enqueue(TASK_SUCCEEDED);
        Ok(())
    }

    async fn update_documents(&self, documents: &[SearchDocument]) -> Result<TaskUid> {
        let mut state = self.state()?;
        Self::upsert(&mut state, documents)?;
        Ok(state.enqueue(TASK_SUCCEEDED))
    }

    async fn delete_documents(&self, ids: &[DocumentId]) -> Result<TaskUid> {
        let mut state = self.state()?;
        for id in ids {
            state.documents.remove(&id.to_string());
        }
        Ok(state.enqueue(TASK_SUCCEEDED))
    }

    async fn get_document(&self, id: &DocumentId) -> Result<DocumentFields> {
        self.state()?
            .documents
            .get(&id.to_string())
            .cloned()
            .ok_or_else(|| DomainError::NotFound {
                reason: format!("document {id}"),
            })
    }

    async fn get_documents(&self, filter: &DocumentFilter) -> Result<Vec<DocumentFields>> {
        Ok(self
            .state()?
            .documents
            .values()
            .filter(|fields| filter.matches(fields))
            .skip(filter.offset)
            .take(filter.limit)
            .cloned()
            .collect())
    }

    fn has_task_succeeded(&self, status: &str) -> bool {
        status == TASK_SUCCEEDED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{ArtistDocument, DocumentBody, DocumentKind};
    use chrono::Utc;
    use uuid::Uuid;

    fn artist(user: Uuid, name: &str) -> SearchDocument {
        let now = Utc::now();
        SearchDocument::new(
            Uuid::new_v4(),
            user,
            now,
            now,
            DocumentBody::Artist(ArtistDocument {
                name: name.into(),
                image_url: None,
            }),
        )
    }

    #[tokio::test]
    async fn update_and_delete_return_increasing_task_ids() {
        let engine = InMemorySearchEngine::new();
        let doc = artist(Uuid::new_v4(), "Nina");

        engine.add_documents(std::slice::from_ref(&doc)).await.unwrap();
        let t1 = engine.update_documents(std::slice::from_ref(&doc)).await.unwrap();
        let t2 = engine.delete_documents(&[doc.id()]).await.unwrap();

        assert!(t2 > t1);
        assert_eq!(engine.task_status(t2), Some(TASK_SUCCEEDED));
        assert!(engine.is_empty());
    }

    #[tokio::test]
    async fn get_documents_pages_through_user_documents() {
        let engine = InMemorySearchEngine::new();
        let user = Uuid::new_v4();
        let docs: Vec<_> = (0..5).map(|i| artist(user, &format!("a{i}"))).collect();
        engine.add_documents(&docs).await.unwrap();
        engine.add_documents(&[artist(Uuid::new_v4(), "other")]).await.unwrap();

        let first = DocumentFilter {
            limit: 3,
            ..DocumentFilter::by_user(user)
        };
        let page1 = engine.get_documents(&first).await.unwrap();
        let page2 = engine.get_documents(&first.next_page()).await.unwrap();
        assert_eq!(page1.len() + page2.len(), 5);

        let fetched = engine.get_document(&docs[0].id()).await.unwrap();
        assert_eq!(fetched["type"], DocumentKind::Artist.prefix());
    }

    #[tokio::test]
    async fn missing_document_is_not_found() {
        let engine = InMemorySearchEngine::new();
        let id = DocumentId::new(DocumentKind::Song, Uuid::new_v4());
        assert!(matches!(
            engine.get_document(&id).await,
            Err(DomainError::NotFound { .. })
        ));
        assert!(engine.has_task_succeeded("succeeded"));
        assert!(!engine.has_task_succeeded(TASK_FAILED));
    }
}
