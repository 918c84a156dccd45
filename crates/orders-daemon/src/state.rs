//! Shared runtime state for orders-daemon — a `Clone`-able bundle of `Arc`
//! handles handed to every handler via `State<AppState>`.

use std::sync::Arc;

use orders_cache::OrderCache;
use orders_service::{CancellationService, CreationService, RetrievalService};
use sqlx::PgPool;

#[derive(Clone)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub cache: Arc<OrderCache>,
    pub creation: CreationService,
    pub retrieval: RetrievalService,
    pub cancellation: CancellationService,
    pub build: BuildInfo,
}

impl AppState {
    pub fn new(pool: PgPool, cache: Arc<OrderCache>) -> Self {
        let creation = CreationService::new(pool.clone(), cache.clone());
        let retrieval = RetrievalService::new(pool.clone(), cache.clone());
        let cancellation = CancellationService::new(pool.clone(), cache.clone());

        Self {
            pool,
            cache,
            creation,
            retrieval,
            cancellation,
            build: BuildInfo { service: "orders-daemon", version: env!("CARGO_PKG_VERSION") },
        }
    }
}

/// Monotonic uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START.get_or_init(std::time::Instant::now).elapsed().as_secs()
}
