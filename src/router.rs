use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tower::ServiceBuilder;

use crate::{
    AppState,
    middleware::{RateLimiter, log_errors, rate_limit},
    routes,
};

// 用户相关的路由
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(routes::user::register))
        .route("/get_user_details/{user_id}", get(routes::user::get_user_details))
        .route(
            "/update_user_details/{user_id}",
            put(routes::user::update_user_details),
        )
        .route("/delete_user/{user_id}", delete(routes::user::delete_user))
}

/// 创建主路由：所有请求先经过限流，再进入路由
pub fn create_router(state: AppState, rate_limiter: Arc<RateLimiter>) -> Router {
    Router::new()
        .route("/", get(routes::user::home))
        .merge(user_routes())
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(rate_limiter, rate_limit))
                .layer(axum::middleware::from_fn(log_errors)),
        )
        .with_state(state)
}
