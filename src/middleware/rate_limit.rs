use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    cache::keys,
    config::{Config, FailMode},
    error::AppError,
    store::{KvStore, StoreError},
};

/// 无法识别来源时使用的身份
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// 固定窗口限流器。
///
/// 计数放在共享存储里，同一身份的自增由存储端的原子操作串行化，进程内不需要锁。
/// 被拒绝的请求同样计数。
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn KvStore>,
    limit: u32,
    window: Duration,
    fail_mode: FailMode,
    trust_proxy_headers: bool,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KvStore>, config: &Config) -> Self {
        Self {
            store,
            limit: config.rate_limit_requests,
            window: config.rate_limit_window(),
            fail_mode: config.rate_limit_fail_mode,
            trust_proxy_headers: config.trust_proxy_headers,
        }
    }

    pub fn fail_mode(&self) -> FailMode {
        self.fail_mode
    }

    /// 使用配置的限额和窗口
    pub async fn admit(&self, identity: &str) -> Result<bool, StoreError> {
        self.admit_with(identity, self.limit, self.window).await
    }

    /// 自增计数；计数从 0 变为 1 时由存储端同时设置窗口过期时间。
    /// 自增后的计数不超过 limit 即放行。
    pub async fn admit_with(
        &self,
        identity: &str,
        limit: u32,
        window: Duration,
    ) -> Result<bool, StoreError> {
        let identity = if identity.is_empty() {
            UNKNOWN_IDENTITY
        } else {
            identity
        };
        let key = keys::rate_limit_key(identity);
        let count = self.store.increment_window(&key, window).await?;
        tracing::debug!(identity, count, limit, "Rate limit counter incremented");
        Ok(count <= i64::from(limit))
    }

    /// 当前窗口的剩余时间，用于 Retry-After
    pub async fn retry_after(&self, identity: &str) -> Option<Duration> {
        match self.store.ttl(&keys::rate_limit_key(identity)).await {
            Ok(ttl) => ttl,
            Err(e) => {
                tracing::warn!(identity, error = %e, "Failed to read rate limit window TTL");
                None
            }
        }
    }

    /// 请求来源身份：先看代理头（仅在信任代理时），再看连接地址
    pub fn identity_of(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        let remote_ip = peer.map(|addr| addr.ip().to_string());

        let forwarded = if self.trust_proxy_headers {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .filter(|ip| !ip.trim().is_empty())
                .or_else(|| {
                    headers
                        .get("x-forwarded-for")
                        .and_then(|h| h.to_str().ok())
                        .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
                })
        } else {
            None
        };

        forwarded
            .or(remote_ip.as_deref())
            .unwrap_or(UNKNOWN_IDENTITY)
            .trim()
            .to_string()
    }

    pub async fn check_rate_limit(self: Arc<Self>, req: Request<Body>, next: Next) -> Response {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0);
        let identity = self.identity_of(req.headers(), peer);

        match self.admit(&identity).await {
            Ok(true) => next.run(req).await,
            Ok(false) => {
                tracing::info!(identity = %identity, path = %req.uri().path(), "Rate limit exceeded");
                AppError::RateLimited {
                    retry_after: self.retry_after(&identity).await,
                }
                .into_response()
            }
            Err(e) => match self.fail_mode {
                FailMode::Open => {
                    tracing::warn!(identity = %identity, error = %e, "Rate limiter unavailable, admitting request");
                    next.run(req).await
                }
                FailMode::Closed => {
                    tracing::error!(identity = %identity, error = %e, "Rate limiter unavailable, rejecting request");
                    AppError::from(e).into_response()
                }
            },
        }
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    limiter.check_rate_limit(req, next).await
}
