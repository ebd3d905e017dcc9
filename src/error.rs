use std::time::Duration;

use axum::Json;
use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::queue::BackendError;
use crate::result::ApiResponse;
use crate::store::StoreError;

/// 对外的错误分类。存储和内部错误只返回通用提示，细节由调用方记录日志。
#[derive(Debug, Error)]
pub enum AppError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },
    /// 携带给客户端的提示
    #[error("not found: {0}")]
    NotFound(String),
    #[error("downstream rejected the submission: {0}")]
    DownstreamRejected(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::StoreUnavailable(e.to_string())
    }
}

impl From<BackendError> for AppError {
    fn from(e: BackendError) -> Self {
        AppError::StoreUnavailable(e.to_string())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound(_) | AppError::DownstreamRejected(_) => StatusCode::BAD_REQUEST,
            AppError::StoreUnavailable(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::RateLimited { .. } => "Rate limit exceeded. Try again later.".to_string(),
            AppError::NotFound(message) | AppError::DownstreamRejected(message) => message.clone(),
            AppError::StoreUnavailable(_) | AppError::InternalError(_) => {
                "Internal Server Error.".to_string()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ApiResponse::failure_message(self.public_message()));
        let mut response = (status, body).into_response();

        if let AppError::RateLimited {
            retry_after: Some(retry_after),
        } = self
        {
            let secs = retry_after.as_secs().max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
