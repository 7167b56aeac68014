use axum::{Json, extract::State};
use serde::Serialize;

use crate::{AppState, cache::CacheMode, result::ApiResult};

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    /// Whether cached reads are served by Redis or by the in-process fallback.
    pub cache: CacheMode,
}

pub async fn health(State(state): State<AppState>) -> Json<ApiResult<Health>> {
    Json(ApiResult::success(Health {
        status: "ok",
        cache: state.cache.mode().await,
    }))
}
