//! 实时通知协议（RealtimeNotifier）
//!
//! 仅用于向用户专属频道推送失效信号（不携带数据），提示在线客户端
//! 改走主读路径重新拉取，而非信任已过期的缓存。
//!
use crate::error::DomainResult as Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use uuid::Uuid;

/// 用户专属频道名
pub fn user_channel(user_id: Uuid) -> String {
    format!("personal:{user_id}")
}

/// 检索结果失效信号
pub fn invalidation_token() -> Value {
    json!({ "type": "invalidate", "scope": "search" })
}

#[async_trait]
pub trait RealtimeNotifier: Send + Sync {
    async fn publish(&self, channel: &str, payload: &Value) -> Result<()>;
}

#[cfg(feature = "eventing")]
pub use inmemory::InMemoryNotifier;

#[cfg(feature = "eventing")]
mod inmemory {
    use super::RealtimeNotifier;
    use crate::error::DomainResult as Result;
    use async_trait::async_trait;
    use futures_core::stream::BoxStream;
    use futures_util::StreamExt;
    use serde_json::Value;
    use tokio::sync::broadcast;
    use tokio_stream::wrappers::BroadcastStream;

    /// 基于 `tokio::sync::broadcast` 的进程内通知器
    ///
    /// 无订阅者时发送被忽略，与真实实时服务“无人在线即丢弃”的语义一致。
    #[derive(Clone)]
    pub struct InMemoryNotifier {
        tx: broadcast::Sender<(String, Value)>,
    }

    impl InMemoryNotifier {
        pub fn new(capacity: usize) -> Self {
            let (tx, _rx) = broadcast::channel(capacity);
            Self { tx }
        }

        /// 订阅某一频道的推送
        pub fn subscribe(&self, channel: &str) -> BoxStream<'static, Value> {
            let channel = channel.to_string();
            let stream = BroadcastStream::new(self.tx.subscribe()).filter_map(move |item| {
                let wanted = match item {
                    Ok((ch, payload)) if ch == channel => Some(payload),
                    _ => None,
                };
                async move { wanted }
            });
            Box::pin(stream)
        }
    }

    #[async_trait]
    impl RealtimeNotifier for InMemoryNotifier {
        async fn publish(&self, channel: &str, payload: &Value) -> Result<()> {
            let _ = self.tx.send((channel.to_string(), payload.clone()));
            Ok(())
        }
    }
}

#[cfg(all(test, feature = "eventing"))]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn subscriber_only_sees_its_channel() {
        let notifier = InMemoryNotifier::new(16);
        let alice = Uuid::new_v4();
        let mut stream = notifier.subscribe(&user_channel(alice));

        notifier
            .publish(&user_channel(Uuid::new_v4()), &json!({"type": "other"}))
            .await
            .unwrap();
        notifier
            .publish(&user_channel(alice), &invalidation_token())
            .await
            .unwrap();

        assert_eq!(stream.next().await, Some(invalidation_token()));
    }

    #[test]
    fn channel_is_derived_from_user_id() {
        let user = Uuid::nil();
        assert_eq!(
            user_channel(user),
            "personal:00000000-0000-0000-0000-000000000000"
        );
    }
}
