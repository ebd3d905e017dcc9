use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use chrono::Utc;
use serde_json::{Value, json};
use tower::ServiceExt;
use user_service::{
    AppState,
    cache::UserCache,
    config::{Config, FailMode},
    database::{MemoryUserRepository, UserRepository},
    middleware::RateLimiter,
    models::{UserRecord, UserUpdate},
    queue::{BackendError, QueuedUserBackend, UserBackend, WriteQueue, spawn_worker},
    router::create_router,
    store::{KvStore, MemoryStore, StoreError},
};

fn test_config(limit: u32, fail_mode: FailMode) -> Config {
    Config {
        database_url: String::new(),
        database_max_connections: 1,
        redis_url: String::new(),
        server_host: "127.0.0.1".into(),
        server_port: 0,
        rate_limit_requests: limit,
        rate_limit_window_secs: 60,
        rate_limit_fail_mode: fail_mode,
        trust_proxy_headers: true,
        user_cache_ttl_secs: 3600,
        store_timeout_ms: 500,
        write_queue_capacity: 32,
        log_file: None,
    }
}

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    repo: Arc<MemoryUserRepository>,
}

fn app_with(limit: u32) -> TestApp {
    let config = test_config(limit, FailMode::Closed);
    let store = Arc::new(MemoryStore::new());
    let repo = Arc::new(MemoryUserRepository::new());
    let (queue, rx) = WriteQueue::bounded(config.write_queue_capacity);
    spawn_worker(rx, repo.clone());

    let state = AppState {
        config: config.clone(),
        cache: UserCache::new(store.clone(), config.user_cache_ttl()),
        backend: Arc::new(QueuedUserBackend::new(queue, repo.clone())),
    };
    let limiter = Arc::new(RateLimiter::new(store.clone(), &config));
    TestApp {
        router: create_router(state, limiter),
        store,
        repo,
    }
}

fn app() -> TestApp {
    app_with(100)
}

fn record(user_id: i64) -> UserRecord {
    UserRecord {
        user_id,
        username: "frank".into(),
        email: "frank@example.com".into(),
        phone: None,
        created_at: Utc::now(),
    }
}

fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-real-ip", "198.51.100.10");
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(router: &Router, req: Request<Body>) -> Response {
    router.clone().oneshot(req).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn home_page() {
    let app = app();
    let response = send(&app.router, request("GET", "/", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(json_body(response).await.get("Welcome").is_some());
}

#[tokio::test]
async fn register_then_read_hits_cache() {
    let app = app();
    let body = json!({"user_id": 42, "username": "grace", "email": "grace@example.com"});

    let response = send(&app.router, request("POST", "/register", Some(body))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    assert_eq!(created["status"], "success");
    assert_eq!(created["message"]["user_id"], 42);

    assert!(app.store.get("user:42").await.unwrap().is_some());

    let response = send(&app.router, request("GET", "/get_user_details/42", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = json_body(response).await;
    assert_eq!(fetched["data"], created["message"]);
}

/// 等待写入任务把用户落库
async fn wait_until_persisted(repo: &MemoryUserRepository, user_id: i64) -> UserRecord {
    for _ in 0..100 {
        if let Some(user) = repo.fetch(user_id).await.unwrap() {
            return user;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("user {} was never persisted", user_id);
}

#[tokio::test]
async fn duplicate_registration_keeps_original_cache_entry() {
    let app = app();
    let first = json!({"user_id": 42, "username": "grace", "email": "grace@example.com"});
    let response = send(&app.router, request("POST", "/register", Some(first))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    wait_until_persisted(&app.repo, 42).await;

    let second = json!({"user_id": 42, "username": "mallory", "email": "mallory@example.com"});
    let response = send(&app.router, request("POST", "/register", Some(second))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"status": "failure", "message": "User creation request was not accepted."})
    );

    let response = send(&app.router, request("GET", "/get_user_details/42", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["data"]["username"], "grace");
    assert_eq!(app.repo.fetch(42).await.unwrap().unwrap().username, "grace");
}

#[tokio::test]
async fn invalid_registration_is_rejected_without_caching() {
    let app = app();
    let body = json!({"user_id": 7, "username": "heidi", "email": "not-an-email"});

    let response = send(&app.router, request("POST", "/register", Some(body))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.store.get("user:7").await.unwrap().is_none());
}

#[tokio::test]
async fn read_falls_through_to_store() {
    let app = app();
    app.repo.insert(&record(5)).await.unwrap();

    let response = send(&app.router, request("GET", "/get_user_details/5", None)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json_body(response).await["data"]["username"], "frank");

    // 回源读取不会回填缓存
    assert!(app.store.get("user:5").await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_user_reads_as_failure() {
    let app = app();
    let response = send(&app.router, request("GET", "/get_user_details/999", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"status": "failure", "data": []})
    );
}

#[tokio::test]
async fn update_invalidates_cached_snapshot() {
    let app = app();
    let body = json!({"user_id": 11, "username": "ivan", "email": "ivan@example.com"});
    send(&app.router, request("POST", "/register", Some(body))).await;
    wait_until_persisted(&app.repo, 11).await;
    assert!(app.store.get("user:11").await.unwrap().is_some());

    let response = send(
        &app.router,
        request("PUT", "/update_user_details/11", Some(json!({"username": "ivan2"}))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.store.get("user:11").await.unwrap().is_none());
}

#[tokio::test]
async fn update_of_unknown_user_fails() {
    let app = app();
    let response = send(
        &app.router,
        request("PUT", "/update_user_details/404", Some(json!({"username": "nobody"}))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"status": "failure", "message": "user detail update failed."})
    );
}

#[tokio::test]
async fn delete_existing_and_missing_user() {
    let app = app();
    app.repo.insert(&record(21)).await.unwrap();
    app.store
        .set("user:21", b"{}", Duration::from_secs(3600))
        .await
        .unwrap();

    let response = send(&app.router, request("DELETE", "/delete_user/21", None)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(app.store.get("user:21").await.unwrap().is_none());

    let response = send(&app.router, request("DELETE", "/delete_user/22", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["message"],
        "No user found with user_id 22."
    );
}

#[tokio::test]
async fn sixth_request_from_same_client_is_rate_limited() {
    let app = app_with(5);
    for _ in 0..5 {
        let response = send(&app.router, request("GET", "/", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = send(&app.router, request("GET", "/", None)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(
        json_body(response).await["message"],
        "Rate limit exceeded. Try again later."
    );

    let other = Request::builder()
        .uri("/")
        .header("x-real-ip", "203.0.113.77")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app.router, other).await.status(), StatusCode::OK);
}

/// 下游拒绝所有提交
struct RejectingBackend;

#[async_trait]
impl UserBackend for RejectingBackend {
    async fn submit_create(&self, _: &UserRecord) -> Result<bool, BackendError> {
        Ok(false)
    }
    async fn submit_update(&self, _: i64, _: &UserUpdate) -> Result<bool, BackendError> {
        Ok(false)
    }
    async fn submit_delete(&self, _: i64) -> Result<bool, BackendError> {
        Ok(false)
    }
    async fn fetch(&self, _: i64) -> Result<Option<UserRecord>, BackendError> {
        Ok(None)
    }
}

#[tokio::test]
async fn rejected_create_is_not_cached() {
    let config = test_config(100, FailMode::Closed);
    let store = Arc::new(MemoryStore::new());
    let state = AppState {
        config: config.clone(),
        cache: UserCache::new(store.clone(), config.user_cache_ttl()),
        backend: Arc::new(RejectingBackend),
    };
    let router = create_router(state, Arc::new(RateLimiter::new(store.clone(), &config)));

    let body = json!({"user_id": 3, "username": "judy", "email": "judy@example.com"});
    let response = send(&router, request("POST", "/register", Some(body))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["message"],
        "User creation request was not accepted."
    );
    assert!(store.get("user:3").await.unwrap().is_none());
}

/// 模拟 Redis 不可达
struct DownStore;

fn down() -> StoreError {
    StoreError::Timeout(Duration::from_millis(500))
}

#[async_trait]
impl KvStore for DownStore {
    async fn increment(&self, _: &str) -> Result<i64, StoreError> {
        Err(down())
    }
    async fn expire(&self, _: &str, _: Duration) -> Result<(), StoreError> {
        Err(down())
    }
    async fn get(&self, _: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Err(down())
    }
    async fn set(&self, _: &str, _: &[u8], _: Duration) -> Result<(), StoreError> {
        Err(down())
    }
    async fn delete(&self, _: &str) -> Result<(), StoreError> {
        Err(down())
    }
    async fn ttl(&self, _: &str) -> Result<Option<Duration>, StoreError> {
        Err(down())
    }
    async fn ping(&self) -> Result<(), StoreError> {
        Err(down())
    }
}

fn app_with_down_store(fail_mode: FailMode) -> (Router, Arc<MemoryUserRepository>) {
    let config = test_config(5, fail_mode);
    let store: Arc<dyn KvStore> = Arc::new(DownStore);
    let repo = Arc::new(MemoryUserRepository::new());
    let (queue, rx) = WriteQueue::bounded(8);
    spawn_worker(rx, repo.clone());
    let state = AppState {
        config: config.clone(),
        cache: UserCache::new(store.clone(), config.user_cache_ttl()),
        backend: Arc::new(QueuedUserBackend::new(queue, repo.clone())),
    };
    (
        create_router(state, Arc::new(RateLimiter::new(store, &config))),
        repo,
    )
}

#[tokio::test]
async fn fail_closed_rejects_when_limiter_store_is_down() {
    let (router, _) = app_with_down_store(FailMode::Closed);
    let response = send(&router, request("GET", "/", None)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["message"], "Internal Server Error.");
}

#[tokio::test]
async fn fail_open_admits_and_reads_fall_through() {
    let (router, repo) = app_with_down_store(FailMode::Open);
    repo.insert(&record(8)).await.unwrap();

    let response = send(&router, request("GET", "/get_user_details/8", None)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    // 缓存写失败不影响创建结果
    let body = json!({"user_id": 9, "username": "mallory", "email": "mallory@example.com"});
    let response = send(&router, request("POST", "/register", Some(body))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}
