use repertoire_domain::error::DomainError;
use repertoire_domain::search::TaskUid;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("domain: {0}")]
    Domain(#[from] DomainError),

    #[error("webhook: {0}")]
    Webhook(#[from] WebhookError),
}

pub type AppResult<T> = Result<T, AppError>;

/// 搜索任务 webhook 的同步失败，均不可重试，直接回给调用方
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum WebhookError {
    #[error("decompress body: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("empty task batch")]
    EmptyBatch,

    #[error("decode task record: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("search task {uid} did not succeed: status={status}")]
    TaskFailed { uid: TaskUid, status: String },
}
