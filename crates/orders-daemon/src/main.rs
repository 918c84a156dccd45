//! orders-daemon entry point: thin — load config, init tracing, build
//! shared state, spawn the cache janitor and the Outbox Relay, build the
//! router, serve.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use orders_bus::{BusPublisher, Publisher};
use orders_cache::OrderCache;
use orders_daemon::{routes, state};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Dev convenience; silent if the file does not exist — production
    // injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let loaded = load_config()?;
    let app_cfg = loaded.app;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(1))
        .connect(&app_cfg.postgres.to_connection_string())
        .await
        .context("connect to postgres")?;
    orders_db::migrate(&pool).await.context("run migrations")?;

    let cache = Arc::new(OrderCache::new(
        app_cfg.cache.capacity,
        std::time::Duration::from_secs(app_cfg.cache.ttl_seconds),
    ));
    cache
        .clone()
        .spawn_janitor(std::time::Duration::from_secs(app_cfg.cache.sweep_interval_seconds));

    let bus = BusPublisher::new(
        &app_cfg.kafka.broker_list.join(","),
        app_cfg.kafka.order_event_topic.clone(),
        app_cfg.kafka.status_event_topic.clone(),
    )
    .context("construct bus publisher")?;
    let bus: Arc<dyn Publisher> = Arc::new(bus);

    orders_relay::spawn(
        pool.clone(),
        bus,
        orders_relay::RelayConfig {
            batch_size: app_cfg.relay.batch_size,
            tick_interval: std::time::Duration::from_secs(app_cfg.relay.tick_interval_seconds),
            dispatcher_id: "orders-relay".to_string(),
        },
    );

    let shared = state::AppState::new(pool, cache);

    let app = routes::build_router(shared)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr(app_cfg.http.port);
    info!("orders-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM — whichever comes first — so
/// `axum::serve` can drain in-flight requests instead of dropping
/// connections mid-response.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    }

    info!("shutdown signal received, draining in-flight requests");
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn load_config() -> anyhow::Result<orders_config::LoadedConfig> {
    let path =
        std::env::var(orders_config::ENV_CONFIG_PATH).unwrap_or_else(|_| "config/orders.yaml".to_string());
    if std::path::Path::new(&path).exists() {
        orders_config::load_layered_yaml(&[&path])
    } else {
        orders_config::load_layered_yaml(&[])
    }
}

fn bind_addr(port: u16) -> SocketAddr {
    std::env::var("ORDERS_DAEMON_ADDR")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], port)))
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
    ];

    let origins: Vec<HeaderValue> =
        allowed_origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()).collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
