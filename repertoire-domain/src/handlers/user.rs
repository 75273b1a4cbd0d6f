//! 用户删除处理器
//!
//! 用户被删除时，从搜索引擎分页查询其全部文档 ID，派生一条删除命令，
//! 再派生对用户根目录的存储清理。
//!
use crate::catalog::User;
use crate::command::{DeleteDirectories, RemoveDocuments};
use crate::error::DomainResult as Result;
use crate::eventing::{EventHandler, Publish};
use crate::message::Message;
use crate::search::{DocumentFilter, DocumentId, SearchEngine};
use crate::storage::StoragePath;
use crate::topic::Topic;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

pub struct UserDeletedHandler {
    search: Arc<dyn SearchEngine>,
}

impl UserDeletedHandler {
    pub fn new(search: Arc<dyn SearchEngine>) -> Self {
        Self { search }
    }

    async fn owned_document_ids(&self, user_id: Uuid) -> Result<Vec<DocumentId>> {
        let mut ids = Vec::new();
        let mut filter = DocumentFilter::by_user(user_id);

        loop {
            let page = self.search.get_documents(&filter).await?;
            let fetched = page.len();

            for fields in page {
                match fields.get("id").and_then(Value::as_str).map(str::parse) {
                    Some(Ok(id)) => ids.push(id),
                    other => {
                        tracing::warn!(%user_id, ?other, "skip document with unusable id");
                    }
                }
            }

            if fetched < filter.limit {
                break;
            }
            filter = filter.next_page();
        }

        Ok(ids)
    }
}

#[async_trait]
impl EventHandler for UserDeletedHandler {
    fn handler_name(&self) -> &str {
        "user_deleted_handler"
    }

    fn topic(&self) -> Topic {
        Topic::UserDeleted
    }

    async fn handle(&self, message: &Message) -> Result<Vec<Publish>> {
        let user: User = message.decode()?;
        let ids = self.owned_document_ids(user.id).await?;
        tracing::debug!(user_id = %user.id, documents = ids.len(), "collected user documents");

        let mut publishes = Vec::with_capacity(2);
        if !ids.is_empty() {
            let remove = RemoveDocuments {
                user_id: user.id,
                ids,
            };
            publishes.push(Publish::json(Topic::RemoveFromSearchIndex, &remove)?);
        }

        let cleanup = DeleteDirectories {
            paths: vec![StoragePath::user_root(user.id)],
        };
        publishes.push(Publish::json(Topic::DeleteStorageDirectories, &cleanup)?);
        Ok(publishes)
    }
}
