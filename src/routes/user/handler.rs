use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::value::RawValue;

use crate::{
    AppState,
    cache::{CacheError, WriteOutcome},
    error::AppError,
    result::ApiResponse,
};

use super::model::{CreateUserRequest, HomeResponse, UpdateUserRequest};

/// 请求体校验失败
fn invalid(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::failure_message(message.into())),
    )
        .into_response()
}

#[axum::debug_handler]
pub async fn home() -> impl IntoResponse {
    Json(HomeResponse {
        welcome: "User service is up",
    })
}

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Response, AppError> {
    if let Err(reason) = req.validate() {
        return Ok(invalid(reason));
    }

    let record = req.into_record();
    let user_id = record.user_id;

    match state
        .cache
        .create_through(state.backend.as_ref(), &record)
        .await
    {
        Ok(WriteOutcome::Accepted { cache_error }) => {
            if let Some(e) = cache_error {
                // 记录已进入写队列，缓存写失败只影响后续读命中
                tracing::warn!(user_id, error = %e, "Failed to cache created user");
            }
            tracing::info!(user_id, "User creation accepted");
            Ok((
                StatusCode::CREATED,
                Json(ApiResponse::success_message(record)),
            )
                .into_response())
        }
        Ok(WriteOutcome::Rejected) => {
            tracing::warn!(user_id, "User creation rejected by write path");
            Err(AppError::DownstreamRejected(
                "User creation request was not accepted.".to_string(),
            ))
        }
        Err(CacheError::Backend(e)) => {
            tracing::error!(user_id, error = %e, "Error during user registration");
            Err(e.into())
        }
        Err(CacheError::Encode(e)) => {
            tracing::error!(user_id, error = %e, "Failed to encode user for cache");
            Err(AppError::InternalError(e.to_string()))
        }
    }
}

#[axum::debug_handler]
pub async fn get_user_details(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Response, AppError> {
    match state.cache.lookup(user_id).await {
        Ok(Some(payload)) => match String::from_utf8(payload)
            .map_err(|e| e.to_string())
            .and_then(|s| RawValue::from_string(s).map_err(|e| e.to_string()))
        {
            Ok(raw) => {
                return Ok((StatusCode::OK, Json(ApiResponse::success_data(raw))).into_response());
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Discarding unreadable cache entry");
            }
        },
        Ok(None) => {}
        Err(e) => {
            // 缓存不可用时直接回源
            tracing::warn!(user_id, error = %e, "User cache lookup failed, reading from store");
        }
    }

    match state.backend.fetch(user_id).await {
        Ok(Some(record)) => {
            Ok((StatusCode::CREATED, Json(ApiResponse::success_data(record))).into_response())
        }
        Ok(None) => Ok((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::failure_data(Vec::<()>::new())),
        )
            .into_response()),
        Err(e) => {
            tracing::error!(user_id, error = %e, "Error reading user from user_details");
            Err(e.into())
        }
    }
}

#[axum::debug_handler]
pub async fn update_user_details(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Response, AppError> {
    if let Err(reason) = req.validate() {
        return Ok(invalid(reason));
    }
    let update = req.into_update();
    if update.is_empty() {
        return Ok(invalid("Nothing to update."));
    }

    match state
        .cache
        .update_through(state.backend.as_ref(), user_id, &update)
        .await
    {
        Ok(WriteOutcome::Accepted { cache_error }) => {
            if let Some(e) = cache_error {
                tracing::error!(user_id, error = %e, "Failed to invalidate cached user after update");
            }
            Ok((
                StatusCode::OK,
                Json(ApiResponse::success_message("user details updated.")),
            )
                .into_response())
        }
        Ok(WriteOutcome::Rejected) => Err(AppError::DownstreamRejected(
            "user detail update failed.".to_string(),
        )),
        Err(e) => {
            tracing::error!(user_id, error = %e, "Error during user update");
            Err(e.into())
        }
    }
}

#[axum::debug_handler]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Response, AppError> {
    match state
        .cache
        .delete_through(state.backend.as_ref(), user_id)
        .await
    {
        Ok(WriteOutcome::Accepted { cache_error }) => {
            if let Some(e) = cache_error {
                tracing::error!(user_id, error = %e, "Failed to invalidate cached user after delete");
            }
            Ok((
                StatusCode::CREATED,
                Json(ApiResponse::success_message(format!(
                    "User with user_id {} has been deleted.",
                    user_id
                ))),
            )
                .into_response())
        }
        Ok(WriteOutcome::Rejected) => Err(AppError::NotFound(format!(
            "No user found with user_id {}.",
            user_id
        ))),
        Err(e) => {
            tracing::error!(user_id, error = %e, "Error deleting user");
            Err(e.into())
        }
    }
}
