//! HTTP 接口
//!
//! - `POST /webhooks/search-tasks`：搜索引擎任务完成回调（gzip NDJSON）
//! - `POST /events/:topic`：CRUD 层投递领域事件（JSON 实体快照）
//! - `GET /health`：路由运行状态
//!
use crate::FailureStats;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use repertoire_application::{AppError, WebhookIngestor};
use repertoire_domain::error::DomainError;
use repertoire_domain::eventing::{MessageBus, RouterMonitor};
use repertoire_domain::message::Message;
use repertoire_domain::topic::Topic;
use serde::Serialize;
use std::sync::Arc;

/// 请求头中的关联 ID
pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<WebhookIngestor>,
    pub bus: Arc<dyn MessageBus>,
    pub router: RouterMonitor,
    pub failures: Arc<FailureStats>,
}

impl AppState {
    pub fn new(
        ingestor: Arc<WebhookIngestor>,
        bus: Arc<dyn MessageBus>,
        router: RouterMonitor,
        failures: Arc<FailureStats>,
    ) -> Self {
        Self {
            ingestor,
            bus,
            router,
            failures,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhooks/search-tasks", post(search_tasks_webhook))
        .route("/events/:topic", post(publish_event))
        .route("/health", get(health))
        .with_state(state)
}

/// 错误响应：状态码 + 纯文本错误信息
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        let status = match e {
            DomainError::BusClosed => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

async fn search_tasks_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    match state.ingestor.ingest(&body).await {
        Ok(outcome) => {
            tracing::debug!(?outcome, "search task webhook handled");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) => {
            tracing::error!(error = %e, "search task webhook failed");
            Err(e.into())
        }
    }
}

async fn publish_event(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let topic: Topic = topic
        .parse()
        .map_err(|e: DomainError| ApiError::new(StatusCode::NOT_FOUND, e.to_string()))?;
    serde_json::from_slice::<serde_json::Value>(&body)
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?;

    let mut message = Message::new(body.to_vec());
    if let Some(correlation_id) = headers
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        message.set_correlation_id(correlation_id);
    }
    let correlation_id = message.ensure_correlation_id();

    state.bus.publish(topic, vec![message]).await?;
    tracing::debug!(%topic, %correlation_id, "domain event accepted");
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    running: bool,
    active_subscriptions: usize,
    expected_subscriptions: usize,
    dropped_messages: u64,
    abandoned_messages: u64,
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let health = state.router.health();
    let (code, status) = if health.is_healthy() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            running: health.running,
            active_subscriptions: health.active_subscriptions,
            expected_subscriptions: health.expected_subscriptions,
            dropped_messages: state.failures.dropped(),
            abandoned_messages: state.failures.abandoned(),
        }),
    )
}
