use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::result::ApiResult;

pub const TOO_MANY_REQUESTS: &str = "Too many requests";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("rate limit exceeded, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },
    #[error("request body could not be read")]
    BadRequest,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::RateLimited { retry_after } => {
                let body = ApiResult::<()>::error(TOO_MANY_REQUESTS).retry_after(retry_after);
                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
                response
            }
            AppError::BadRequest => (
                StatusCode::BAD_REQUEST,
                Json(ApiResult::<()>::error("Invalid request body")),
            )
                .into_response(),
        }
    }
}
