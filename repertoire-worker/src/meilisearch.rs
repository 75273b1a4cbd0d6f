//! Meilisearch 网关（MeilisearchGateway）
//!
//! 所有写操作都是异步任务：引擎受理后返回 `taskUid`，完成状态经 webhook 回调。
//! 任务状态词汇中只有 `succeeded` 表示成功。
//!
use async_trait::async_trait;
use repertoire_domain::error::{DomainError, DomainResult as Result};
use repertoire_domain::search::{
    DocumentFields, DocumentFilter, DocumentId, SearchDocument, SearchEngine, TaskUid,
};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const TASK_SUCCEEDED: &str = "succeeded";

/// 按用户批量读取、删除依赖的可过滤字段
const FILTERABLE_ATTRIBUTES: [&str; 2] = ["userId", "type"];

pub struct MeilisearchGateway {
    http: reqwest::Client,
    base_url: String,
    index: String,
    api_key: Option<String>,
}

/// 写操作的受理回执
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskInfo {
    task_uid: TaskUid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexSettings<'a> {
    filterable_attributes: &'a [&'a str],
}

#[derive(Debug, Serialize)]
struct FetchRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
    offset: usize,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct FetchResponse {
    results: Vec<DocumentFields>,
}

impl MeilisearchGateway {
    pub fn new(
        base_url: impl Into<String>,
        index: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::search_engine(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            index: index.into(),
            api_key,
        })
    }

    /// 声明索引的可过滤字段（索引不存在时由引擎创建）
    ///
    /// 未声明时 `documents/fetch` 的 `userId` 过滤会被引擎拒绝。
    pub async fn ensure_index(&self) -> Result<()> {
        let builder = self.request(Method::PATCH, "settings").json(&IndexSettings {
            filterable_attributes: &FILTERABLE_ATTRIBUTES,
        });
        let task_uid = self.submit(builder).await?;
        tracing::info!(index = %self.index, task_uid, "index settings submitted");
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/indexes/{}/{path}", self.base_url, self.index);
        let builder = self.http.request(method, url);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| DomainError::search_engine(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            return Err(DomainError::NotFound { reason: body });
        }
        Err(DomainError::search_engine(format!("{status}: {body}")))
    }

    async fn submit(&self, builder: RequestBuilder) -> Result<TaskUid> {
        let info: TaskInfo = self
            .send(builder)
            .await?
            .json()
            .await
            .map_err(|e| DomainError::search_engine(e.to_string()))?;
        tracing::debug!(task_uid = info.task_uid, index = %self.index, "search task enqueued");
        Ok(info.task_uid)
    }
}

#[async_trait]
impl SearchEngine for MeilisearchGateway {
    async fn add_documents(&self, documents: &[SearchDocument]) -> Result<()> {
        let builder = self
            .request(Method::POST, "documents")
            .query(&[("primaryKey", "id")])
            .json(documents);
        self.submit(builder).await.map(|_| ())
    }

    async fn update_documents(&self, documents: &[SearchDocument]) -> Result<TaskUid> {
        let builder = self
            .request(Method::PUT, "documents")
            .query(&[("primaryKey", "id")])
            .json(documents);
        self.submit(builder).await
    }

    async fn delete_documents(&self, ids: &[DocumentId]) -> Result<TaskUid> {
        let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
        let builder = self.request(Method::POST, "documents/delete-batch").json(&ids);
        self.submit(builder).await
    }

    async fn get_document(&self, id: &DocumentId) -> Result<DocumentFields> {
        let builder = self.request(Method::GET, &format!("documents/{id}"));
        self.send(builder)
            .await?
            .json()
            .await
            .map_err(|e| DomainError::search_engine(e.to_string()))
    }

    async fn get_documents(&self, filter: &DocumentFilter) -> Result<Vec<DocumentFields>> {
        let body = FetchRequest {
            filter: filter.expression(),
            offset: filter.offset,
            limit: filter.limit,
        };
        let page: FetchResponse = self
            .send(self.request(Method::POST, "documents/fetch").json(&body))
            .await?
            .json()
            .await
            .map_err(|e| DomainError::search_engine(e.to_string()))?;
        Ok(page.results)
    }

    fn has_task_succeeded(&self, status: &str) -> bool {
        status == TASK_SUCCEEDED
    }
}
