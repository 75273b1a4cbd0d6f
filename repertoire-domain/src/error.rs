//! 领域层统一错误定义
//!
//! 聚焦消息总线、处理器、载荷解码、搜索引擎、存储与实时通知等管道所需的最小集合，
//! 便于在各实现层统一转换为 `DomainError`。
//!
use thiserror::Error;

/// 统一错误类型（事件管道最小必要集）
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DomainError {
    // --- 序列化/解码 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("decode error: topic={topic}, reason={reason}")]
    Decode { topic: String, reason: String },
    #[error("parse error: {reason}")]
    Parse { reason: String },

    // --- 消息系统 ---
    #[error("event bus error: {reason}")]
    EventBus { reason: String },
    #[error("event bus closed")]
    BusClosed,
    #[error("event handler panicked: handler={handler}, reason={reason}")]
    HandlerPanicked { handler: String, reason: String },

    // --- 外部协作方 ---
    #[error("search engine error: {reason}")]
    SearchEngine { reason: String },
    #[error("storage cleanup failed: {}", format_failures(failed))]
    StorageCleanup { failed: Vec<(String, String)> },
    #[error("realtime notifier error: {reason}")]
    Notifier { reason: String },

    // --- 通用 ---
    #[error("not found: {reason}")]
    NotFound { reason: String },
    #[error("invalid value: {reason}")]
    InvalidValue { reason: String },
}

impl DomainError {
    pub fn event_bus(reason: impl Into<String>) -> Self {
        Self::EventBus {
            reason: reason.into(),
        }
    }

    pub fn search_engine(reason: impl Into<String>) -> Self {
        Self::SearchEngine {
            reason: reason.into(),
        }
    }

    pub fn notifier(reason: impl Into<String>) -> Self {
        Self::Notifier {
            reason: reason.into(),
        }
    }

    pub fn decode(topic: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            topic: topic.into(),
            reason: err.to_string(),
        }
    }

    /// 是否值得重试
    ///
    /// 畸形载荷重放多少次都不会成功，只有这一类直接判定为不可重试；
    /// 其余（网络、下游不可用、处理器 panic 等）均视为瞬时错误。
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Decode { .. } | Self::Serde { .. })
    }
}

fn format_failures(failed: &[(String, String)]) -> String {
    failed
        .iter()
        .map(|(path, reason)| format!("{path}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// 统一 Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;

impl From<uuid::Error> for DomainError {
    fn from(err: uuid::Error) -> Self {
        DomainError::Parse {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_errors_are_not_retryable() {
        let err = DomainError::decode("album_created", "expected value at line 1");
        assert!(!err.is_retryable());

        let serde = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(!DomainError::from(serde).is_retryable());
    }

    #[test]
    fn downstream_errors_are_retryable() {
        assert!(DomainError::search_engine("connection refused").is_retryable());
        assert!(DomainError::BusClosed.is_retryable());
        assert!(
            DomainError::StorageCleanup {
                failed: vec![("u/songs/1".into(), "permission denied".into())]
            }
            .is_retryable()
        );
    }

    #[test]
    fn bad_uuid_is_a_parse_error() {
        let err = DomainError::from("nope".parse::<uuid::Uuid>().unwrap_err());
        assert!(matches!(err, DomainError::Parse { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn storage_cleanup_lists_every_failed_path() {
        let err = DomainError::StorageCleanup {
            failed: vec![
                ("a".into(), "denied".into()),
                ("b".into(), "busy".into()),
            ],
        };
        assert_eq!(err.to_string(), "storage cleanup failed: a: denied; b: busy");
    }
}
