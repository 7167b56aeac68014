use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::Router;
use gatehouse::{
    AppState,
    cache::Cache,
    config::Config,
    router::{Limiters, Routes, build_router},
    routes,
};
#[cfg(debug_assertions)]
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    let cache = Arc::new(Cache::connect(config.redis_url.as_deref()).await);
    if let Some(every) = config.cache_reconnect_interval() {
        if cache.spawn_reconnect_probe(every).is_some() {
            tracing::info!("Cache reconnection probe every {:?}", every);
        }
    }

    let limiters = Limiters::from_config(&config);
    limiters.spawn_sweepers();

    let state = AppState {
        config: config.clone(),
        cache,
    };

    let routes = Routes {
        auth: Router::new(),
        upload: Router::new(),
        api: routes::api_routes(),
    };
    let router = build_router(state, routes, &limiters);

    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
