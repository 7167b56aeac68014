use std::sync::Arc;

use cache::Cache;
use config::Config;

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod middleware;
pub mod rate_limit;
pub mod result;
pub mod router;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub cache: Arc<Cache>,
}
