use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::rate_limit::{Admission, Quota, RateLimiter};

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Admits or rejects the request, then settles the reserved slot against the
/// final status and reports the quota in `X-RateLimit-*` headers.
///
/// When limiters are stacked the innermost one owns the headers: an outer
/// layer leaves quota headers set further in untouched and adds none to a 429.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let key = limiter.key_for(&req);

    let reservation = match limiter.admit(&key) {
        Admission::Admitted(reservation) => reservation,
        Admission::Rejected(rejection) => {
            tracing::warn!(
                policy = limiter.config().name,
                key = %key,
                retry_after = rejection.retry_after_secs,
                "Too many requests"
            );
            return AppError::RateLimited {
                retry_after: rejection.retry_after_secs,
            }
            .into_response();
        }
    };
    tracing::debug!(policy = limiter.config().name, key = %key, "Request admitted");

    let mut response = next.run(req).await;
    let quota = limiter.settle(reservation, response.status());
    if response.status() != StatusCode::TOO_MANY_REQUESTS
        && !response.headers().contains_key(LIMIT_HEADER)
    {
        apply_quota_headers(response.headers_mut(), &quota);
    }
    response
}

fn apply_quota_headers(headers: &mut HeaderMap, quota: &Quota) {
    headers.insert(LIMIT_HEADER, HeaderValue::from(quota.limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(quota.remaining));
    if let Ok(reset) = HeaderValue::from_str(&quota.reset_iso8601()) {
        headers.insert(RESET_HEADER, reset);
    }
}
