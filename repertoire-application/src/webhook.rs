//! 搜索任务完成回调（WebhookIngestor）
//!
//! 请求体为 gzip 压缩的 NDJSON，每行一条 `{uid, status}`；只解码第一条记录：
//! - 状态非成功：返回错误，不做任何推送；
//! - 成功但任务未被跟踪：不是本管道发起的任务，静默成功；
//! - 成功且已跟踪：向所属用户的个人频道推送失效通知，随后消费跟踪条目。
//!
use crate::error::{AppResult, WebhookError};
use crate::task_tracker::TaskTracker;
use flate2::read::GzDecoder;
use repertoire_domain::notifier::{RealtimeNotifier, invalidation_token, user_channel};
use repertoire_domain::search::{SearchEngine, TaskUid};
use serde::Deserialize;
use std::io::Read;
use std::sync::Arc;
use uuid::Uuid;

/// 一条任务完成记录
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskRecord {
    pub uid: TaskUid,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Notified { uid: TaskUid, user_id: Uuid },
    Untracked { uid: TaskUid },
}

pub struct WebhookIngestor {
    search: Arc<dyn SearchEngine>,
    tracker: Arc<TaskTracker>,
    notifier: Arc<dyn RealtimeNotifier>,
}

impl WebhookIngestor {
    pub fn new(
        search: Arc<dyn SearchEngine>,
        tracker: Arc<TaskTracker>,
        notifier: Arc<dyn RealtimeNotifier>,
    ) -> Self {
        Self {
            search,
            tracker,
            notifier,
        }
    }

    pub async fn ingest(&self, body: &[u8]) -> AppResult<WebhookOutcome> {
        let record = first_record(body)?;

        if !self.search.has_task_succeeded(&record.status) {
            tracing::warn!(task_uid = record.uid, status = %record.status, "search task failed");
            return Err(WebhookError::TaskFailed {
                uid: record.uid,
                status: record.status,
            }
            .into());
        }

        let Some(user_id) = self.tracker.get_user_id(record.uid) else {
            tracing::debug!(task_uid = record.uid, "untracked search task, ignored");
            return Ok(WebhookOutcome::Untracked { uid: record.uid });
        };

        self.notifier
            .publish(&user_channel(user_id), &invalidation_token())
            .await?;
        // 推送成功后才消费，推送失败时回调方重试仍能找到用户
        self.tracker.take(record.uid);
        tracing::info!(task_uid = record.uid, %user_id, "search invalidation published");

        Ok(WebhookOutcome::Notified {
            uid: record.uid,
            user_id,
        })
    }
}

/// 解压整个请求体并解码第一条非空记录
pub fn first_record(body: &[u8]) -> Result<TaskRecord, WebhookError> {
    let mut text = String::new();
    GzDecoder::new(body)
        .read_to_string(&mut text)
        .map_err(WebhookError::Decompress)?;

    let line = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or(WebhookError::EmptyBatch)?;
    Ok(serde_json::from_str(line)?)
}
