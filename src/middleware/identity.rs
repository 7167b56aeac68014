use axum::{
    body::{Body, Bytes, to_bytes},
    http::Request,
    middleware::Next,
    response::Response,
};
use serde_json::Value;

use crate::error::AppError;
use crate::rate_limit::SubmittedIdentity;

/// Bodies above this size are rejected before they reach the limiter.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Buffers the body, records the submitted `email` or `username` as a
/// [`SubmittedIdentity`] extension, and passes the same bytes downstream.
pub async fn capture_identity(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES).await.map_err(|e| {
        tracing::warn!("Failed to buffer request body: {}", e);
        AppError::BadRequest
    })?;

    let identity = submitted_identity(&bytes);
    let mut req = Request::from_parts(parts, Body::from(bytes));
    if let Some(identity) = identity {
        req.extensions_mut().insert(SubmittedIdentity(identity));
    }
    Ok(next.run(req).await)
}

fn submitted_identity(bytes: &Bytes) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    let body: Value = serde_json::from_slice(bytes).ok()?;
    ["email", "username"]
        .iter()
        .filter_map(|field| body.get(*field).and_then(Value::as_str))
        .map(|id| id.trim().to_lowercase())
        .find(|id| !id.is_empty())
}
