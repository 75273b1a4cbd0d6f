use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use flate2::Compression;
use flate2::write::GzEncoder;
use futures_util::StreamExt;
use repertoire_application::TaskTracker;
use repertoire_domain::eventing::{
    EventRouter, InMemoryMessageBus, MessageBus, RouterConfig, RouterHandle,
};
use repertoire_domain::notifier::{InMemoryNotifier, invalidation_token, user_channel};
use repertoire_domain::search::{DocumentId, DocumentKind, InMemorySearchEngine, SearchEngine};
use repertoire_domain::topic::{Queue, Topic};
use repertoire_worker::storage_fs::LocalStorage;
use repertoire_worker::{
    AppState, FailureStats, Services, build_router, start_router, webhook_ingestor,
};
use serde_json::{Value, json};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    app: Router,
    bus: InMemoryMessageBus,
    search: Arc<InMemorySearchEngine>,
    notifier: InMemoryNotifier,
    tracker: Arc<TaskTracker>,
    // 保持路由存活，drop 时会触发关闭
    router: RouterHandle,
    _storage: tempfile::TempDir,
}

fn services(storage: &tempfile::TempDir) -> (Services, Arc<InMemorySearchEngine>, InMemoryNotifier) {
    let search = Arc::new(InMemorySearchEngine::new());
    let notifier = InMemoryNotifier::new(16);
    let services = Services {
        search: search.clone(),
        notifier: Arc::new(notifier.clone()),
        storage: Arc::new(LocalStorage::new(storage.path())),
    };
    (services, search, notifier)
}

/// 不注册任何处理器的路由：没有订阅，健康检查视为未运行
fn idle_router(bus: &InMemoryMessageBus) -> RouterHandle {
    let router = EventRouter::builder()
        .bus(Arc::new(bus.clone()) as Arc<dyn MessageBus>)
        .handlers(Vec::new())
        .build();
    Arc::new(router).start()
}

fn app(running: bool) -> TestApp {
    let storage = tempfile::tempdir().unwrap();
    let (services, search, notifier) = services(&storage);
    let bus = InMemoryMessageBus::new(64);
    let tracker = Arc::new(TaskTracker::default());
    let stats = Arc::new(FailureStats::default());

    let router = if running {
        let (handle, _collector) = start_router(
            Arc::new(bus.clone()),
            &services,
            tracker.clone(),
            RouterConfig::default(),
            stats.clone(),
        );
        handle
    } else {
        idle_router(&bus)
    };

    let state = AppState::new(
        Arc::new(webhook_ingestor(&services, tracker.clone())),
        Arc::new(bus.clone()),
        router.monitor(),
        stats,
    );

    TestApp {
        app: build_router(state),
        bus,
        search,
        notifier,
        tracker,
        router,
        _storage: storage,
    }
}

async fn wait_running(test: &TestApp) {
    for _ in 0..200 {
        if test.router.health().is_healthy() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("router did not subscribe: {:?}", test.router.health());
}

fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

fn webhook(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhooks/search-tasks")
        .header("content-encoding", "gzip")
        .body(Body::from(body))
        .unwrap()
}

fn event(topic: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/events/{topic}"))
        .header("content-type", "application/json")
        .header("x-correlation-id", "corr-http-1")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn tracked_success_notifies_owner_once() {
    let test = app(false);
    let user = Uuid::new_v4();
    test.tracker.track(42, user);
    let mut channel = test.notifier.subscribe(&user_channel(user));

    let response = test
        .app
        .clone()
        .oneshot(webhook(gzip(r#"{"uid":42,"status":"succeeded"}"#)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let pushed = tokio::time::timeout(Duration::from_secs(1), channel.next())
        .await
        .unwrap();
    assert_eq!(pushed, Some(invalidation_token()));
    assert!(test.tracker.is_empty());
}

#[tokio::test]
async fn untracked_task_is_accepted_silently() {
    let test = app(false);

    let response = test
        .app
        .oneshot(webhook(gzip("{\"uid\":7,\"status\":\"succeeded\"}\n")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn failed_task_returns_server_error() {
    let test = app(false);
    test.tracker.track(9, Uuid::new_v4());

    let response = test
        .app
        .oneshot(webhook(gzip(r#"{"uid":9,"status":"failed"}"#)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.contains("failed"));
    assert_eq!(test.tracker.len(), 1);
}

#[tokio::test]
async fn uncompressed_body_is_rejected() {
    let test = app(false);

    let response = test
        .app
        .oneshot(webhook(br#"{"uid":1,"status":"succeeded"}"#.to_vec()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn event_is_published_with_incoming_correlation_id() {
    let test = app(false);
    let mut songs = test.bus.subscribe(Queue::Songs).await.unwrap();

    let response = test
        .app
        .oneshot(event("song_deleted", r#"{"id":"x"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let delivery = tokio::time::timeout(Duration::from_secs(1), songs.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let message = delivery.message();
    assert_eq!(message.topic(), Some(Topic::SongDeleted.as_str()));
    assert_eq!(message.correlation_id(), Some("corr-http-1"));
    assert_eq!(message.payload(), br#"{"id":"x"}"#);
}

#[tokio::test]
async fn unknown_topic_and_invalid_json_are_client_errors() {
    let test = app(false);

    let response = test
        .app
        .clone()
        .oneshot(event("song_renamed", "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = test
        .app
        .oneshot(event("song_created", "{not json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn closed_bus_returns_service_unavailable() {
    let test = app(false);
    test.bus.close().await.unwrap();

    let response = test
        .app
        .oneshot(event("album_created", "{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn health_reports_degraded_without_subscriptions() {
    let test = app(false);

    let response = test
        .app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["status"], json!("degraded"));
    assert_eq!(body["running"], json!(false));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn posted_event_reaches_search_index() {
    let test = app(true);
    wait_running(&test).await;

    let response = test
        .app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["running"], json!(true));
    assert_eq!(body["activeSubscriptions"], json!(7));
    assert_eq!(body["droppedMessages"], json!(0));

    let artist_id = Uuid::new_v4();
    let artist = json!({
        "id": artist_id,
        "userId": Uuid::new_v4(),
        "name": "Sun Ra",
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-01-01T00:00:00Z"
    });
    let response = test
        .app
        .oneshot(event("artist_created", &artist.to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let id = DocumentId::new(DocumentKind::Artist, artist_id);
    for _ in 0..200 {
        if let Ok(doc) = test.search.get_document(&id).await {
            assert_eq!(doc["name"], json!("Sun Ra"));
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("artist was not indexed");
}
