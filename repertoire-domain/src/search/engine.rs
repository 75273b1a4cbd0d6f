//! 搜索引擎网关（SearchEngine）协议
//!
//! 对外部文档检索服务的抽象。`update_documents`/`delete_documents` 返回异步任务 ID，
//! 以便在 webhook 回报完成时关联到发起用户；`add_documents` 只需“已受理”。
//!
use super::{DocumentId, DocumentKind, SearchDocument};
use crate::error::DomainResult as Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

/// 搜索引擎异步任务 ID
pub type TaskUid = i64;

/// 原始文档字段
pub type DocumentFields = Map<String, Value>;

/// 批量读取的过滤条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFilter {
    pub user_id: Option<Uuid>,
    pub kind: Option<DocumentKind>,
    pub offset: usize,
    pub limit: usize,
}

impl Default for DocumentFilter {
    fn default() -> Self {
        Self {
            user_id: None,
            kind: None,
            offset: 0,
            limit: 1000,
        }
    }
}

impl DocumentFilter {
    pub fn by_user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn next_page(&self) -> Self {
        Self {
            offset: self.offset + self.limit,
            ..self.clone()
        }
    }

    /// 渲染为过滤表达式（`userId = "…" AND type = "song"`），无条件时返回 None
    pub fn expression(&self) -> Option<String> {
        let mut clauses = Vec::new();
        if let Some(user_id) = self.user_id {
            clauses.push(format!("userId = \"{user_id}\""));
        }
        if let Some(kind) = self.kind {
            clauses.push(format!("type = \"{}\"", kind.prefix()));
        }
        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" AND "))
        }
    }

    /// 判断一组原始字段是否满足条件
    pub fn matches(&self, fields: &DocumentFields) -> bool {
        let user_ok = self.user_id.is_none_or(|user_id| {
            fields.get("userId").and_then(Value::as_str) == Some(user_id.to_string().as_str())
        });
        let kind_ok = self
            .kind
            .is_none_or(|kind| fields.get("type").and_then(Value::as_str) == Some(kind.prefix()));
        user_ok && kind_ok
    }
}

/// 搜索引擎网关
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// 批量新增（受理即返回，索引在引擎内部异步完成）
    async fn add_documents(&self, documents: &[SearchDocument]) -> Result<()>;

    /// 批量替换，返回需要跟踪完成状态的任务 ID
    async fn update_documents(&self, documents: &[SearchDocument]) -> Result<TaskUid>;

    /// 批量删除，返回需要跟踪完成状态的任务 ID
    async fn delete_documents(&self, ids: &[DocumentId]) -> Result<TaskUid>;

    async fn get_document(&self, id: &DocumentId) -> Result<DocumentFields>;

    async fn get_documents(&self, filter: &DocumentFilter) -> Result<Vec<DocumentFields>>;

    /// 引擎特定的任务状态词汇 → 是否成功
    fn has_task_succeeded(&self, status: &str) -> bool;
}
