//! Centrifugo 实时通知（CentrifugoNotifier）
//!
//! 通过服务端 HTTP API 发布：`POST {base}/api/publish`，`X-API-Key` 鉴权。
//! Centrifugo 在业务错误时仍返回 200，错误放在响应体的 `error` 字段中。
//!
use async_trait::async_trait;
use repertoire_domain::error::{DomainError, DomainResult as Result};
use repertoire_domain::notifier::RealtimeNotifier;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub struct CentrifugoNotifier {
    http: reqwest::Client,
    publish_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct PublishRequest<'a> {
    channel: &'a str,
    data: &'a Value,
}

#[derive(Debug, Default, Deserialize)]
struct PublishReply {
    #[serde(default)]
    error: Option<ReplyError>,
}

#[derive(Debug, Deserialize)]
struct ReplyError {
    code: u32,
    message: String,
}

impl CentrifugoNotifier {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::notifier(e.to_string()))?;

        Ok(Self {
            http,
            publish_url: format!("{}/api/publish", base_url.trim_end_matches('/')),
            api_key,
        })
    }
}

#[async_trait]
impl RealtimeNotifier for CentrifugoNotifier {
    async fn publish(&self, channel: &str, payload: &Value) -> Result<()> {
        let mut request = self.http.post(&self.publish_url).json(&PublishRequest {
            channel,
            data: payload,
        });
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DomainError::notifier(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::notifier(format!("{status}: {body}")));
        }

        let reply: PublishReply = response.json().await.unwrap_or_default();
        if let Some(ReplyError { code, message }) = reply.error {
            return Err(DomainError::notifier(format!(
                "channel {channel}: {code} {message}"
            )));
        }
        tracing::debug!(%channel, "realtime message published");
        Ok(())
    }
}
