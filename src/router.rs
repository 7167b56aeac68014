use std::sync::Arc;

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};

use crate::clock::SharedClock;
use crate::config::Config;
use crate::middleware::{capture_identity, log_errors, rate_limit};
use crate::rate_limit::{RateLimiter, policies};
use crate::{AppState, clock};

/// One limiter per endpoint family.
#[derive(Clone)]
pub struct Limiters {
    pub auth: Arc<RateLimiter>,
    pub api: Arc<RateLimiter>,
    pub upload: Arc<RateLimiter>,
}

impl Limiters {
    pub fn from_config(config: &Config) -> Self {
        Self::with_clock(config, clock::system())
    }

    pub fn with_clock(config: &Config, clock: SharedClock) -> Self {
        let [auth, api, upload] = policies::from_config(config);
        Self {
            auth: Arc::new(RateLimiter::with_clock(auth, clock.clone())),
            api: Arc::new(RateLimiter::with_clock(api, clock.clone())),
            upload: Arc::new(RateLimiter::with_clock(upload, clock)),
        }
    }

    /// Starts background sweepers for limiters configured to sweep periodically.
    pub fn spawn_sweepers(&self) {
        for limiter in [&self.auth, &self.api, &self.upload] {
            if limiter.spawn_sweeper().is_some() {
                tracing::info!(policy = limiter.config().name, "Started rate limit sweeper");
            }
        }
    }
}

/// Route groups, each with full paths relative to the API base.
#[derive(Default)]
pub struct Routes {
    pub auth: Router<AppState>,
    pub upload: Router<AppState>,
    pub api: Router<AppState>,
}

pub fn limited<S>(router: Router<S>, limiter: Arc<RateLimiter>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(from_fn_with_state(limiter, rate_limit))
}

/// Like [`limited`], with the submitted identifier captured first so the
/// limiter can key on it.
pub fn identity_limited<S>(router: Router<S>, limiter: Arc<RateLimiter>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    limited(router, limiter).layer(from_fn(capture_identity))
}

/// Auth and upload routes get their own limiter on top of the general API one.
pub fn build_router(state: AppState, routes: Routes, limiters: &Limiters) -> Router {
    let api = Router::new()
        .merge(identity_limited(routes.auth, limiters.auth.clone()))
        .merge(limited(routes.upload, limiters.upload.clone()))
        .merge(routes.api);
    let api = limited(api, limiters.api.clone());

    let base = state.config.api_base_uri.trim_end_matches('/');
    let router = if base.is_empty() {
        api
    } else {
        Router::new().nest(base, api)
    };

    router
        .layer(from_fn(log_errors))
        .with_state(state)
}
