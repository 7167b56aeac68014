pub mod health;

use axum::{Router, routing::get};

use crate::AppState;

/// Operational routes served under the API base.
pub fn api_routes() -> Router<AppState> {
    Router::new().route("/health", get(health::health))
}
