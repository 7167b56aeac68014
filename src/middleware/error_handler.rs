use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use tracing::{error, warn};

/// How much of a 5xx body is captured for the log line.
const LOGGED_BODY_LIMIT: usize = 16 * 1024;

/// Logs rate-limit rejections and server errors. 5xx bodies are buffered,
/// logged and put back.
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let response = next.run(req).await;
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        warn!(%method, %path, "Request rejected by rate limiter");
        return response;
    }
    if !status.is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    match to_bytes(body, LOGGED_BODY_LIMIT).await {
        Ok(bytes) => {
            error!(
                %method,
                %path,
                status = %parts.status,
                body = %String::from_utf8_lossy(&bytes),
                "Server error"
            );
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(e) => {
            error!(%method, %path, status = %parts.status, "Server error, body unreadable: {}", e);
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::empty())
        }
    }
}
