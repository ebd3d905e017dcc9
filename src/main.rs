use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use user_service::{
    AppState,
    cache::UserCache,
    config::Config,
    database::{PgUserRepository, UserRepository},
    logging,
    middleware::RateLimiter,
    queue::{QueuedUserBackend, WriteQueue, spawn_worker},
    router::create_router,
    store::{KvStore, RedisStore},
};

#[tokio::main]
async fn main() {
    // 加载配置，日志文件路径也来自配置
    let config = Config::from_env().expect("Failed to load configuration");

    // 初始化日志，guard 持有到 main 结束以便退出前刷完文件日志
    let _log_guard = logging::init(config.log_file.as_deref());

    // 连接 Redis，启动时连不上直接退出
    let redis = RedisStore::connect(&config.redis_url, config.store_timeout())
        .await
        .expect("Failed to connect to Redis");
    let store: Arc<dyn KvStore> = Arc::new(redis);

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(config.store_timeout() * 10)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");
    let repository: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(pool.clone()));
    repository
        .ensure_schema()
        .await
        .expect("Failed to prepare user_details table");

    // 写队列与后台写入任务
    let (queue, rx) = WriteQueue::bounded(config.write_queue_capacity);
    let worker = spawn_worker(rx, repository.clone());

    let state = AppState {
        config: config.clone(),
        cache: UserCache::new(store.clone(), config.user_cache_ttl()),
        backend: Arc::new(QueuedUserBackend::new(queue, repository)),
    };

    // 设置限流器
    let rate_limiter = Arc::new(RateLimiter::new(store.clone(), &config));
    tracing::info!(
        limit = config.rate_limit_requests,
        window_secs = config.rate_limit_window_secs,
        fail_mode = ?rate_limiter.fail_mode(),
        "Rate limiter configured"
    );

    let router = create_router(state, rate_limiter);

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    // 路由（以及其中的写队列发送端）已释放，等待写入任务处理完剩余命令
    if let Err(e) = worker.await {
        tracing::error!("Write worker terminated abnormally: {}", e);
    }
    pool.close().await;
    drop(store);
    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
