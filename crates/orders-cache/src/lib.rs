//! TTL-bounded, capacity-bounded, concurrent-safe mapping from order id to
//! an `Order` snapshot — the read-through cache fronting order reads.
//!
//! A mutex-guarded map of entries swept periodically by a background task,
//! with capacity-bounded least-recently-used eviction added on top of plain
//! TTL expiry.
//!
//! The cache never writes back to the store and never evicts on its own
//! initiative outside the janitor sweep and capacity overflow — it is
//! strictly a performance optimisation. Callers own cache coherence: any
//! state-mutating path must `add` the new snapshot before reporting success.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use orders_schemas::{Order, OrderId};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

pub const DEFAULT_TTL: Duration = Duration::from_secs(600);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

struct Entry {
    order: Order,
    expires_at: Instant,
    /// Stamped with the cache's clock on every hit and on insert/overwrite;
    /// the entry holding the smallest value is the true least-recently-used
    /// one. An `AtomicU64` so `get` can refresh it under a read lock alone.
    last_used: AtomicU64,
}

struct CacheInner {
    entries: HashMap<OrderId, Entry>,
    capacity: usize,
    clock: AtomicU64,
}

impl CacheInner {
    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Evict the entry with the smallest `last_used` stamp. O(capacity)
    /// scan — acceptable at the bounded, implementation-defined capacities
    /// this cache runs at.
    fn evict_lru(&mut self) -> Option<OrderId> {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used.load(Ordering::Relaxed))
            .map(|(id, _)| *id)?;
        self.entries.remove(&victim);
        Some(victim)
    }
}

/// Concurrent-safe order cache. Cheaply `Clone`-able (wraps an `Arc`).
#[derive(Clone)]
pub struct OrderCache {
    inner: Arc<RwLock<CacheInner>>,
    ttl: Duration,
}

impl OrderCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(CacheInner {
                entries: HashMap::with_capacity(capacity.min(1024)),
                capacity,
                clock: AtomicU64::new(0),
            })),
            ttl,
        }
    }

    pub fn with_defaults(capacity: usize) -> Self {
        Self::new(capacity, DEFAULT_TTL)
    }

    /// Look up a snapshot. Returns `None` on miss or if the stored entry has
    /// expired — an expired entry is never returned even if the janitor has
    /// not yet swept it. A hit stamps the entry as most-recently-used.
    /// Takes only a read lock; the recency stamp is an atomic store on the
    /// entry itself, so many readers still run in parallel.
    pub async fn get(&self, id: OrderId) -> Option<Order> {
        let guard = self.inner.read().await;
        let entry = guard.entries.get(&id)?;
        if Instant::now() >= entry.expires_at {
            return None;
        }
        entry.last_used.store(guard.tick(), Ordering::Relaxed);
        Some(entry.order.clone())
    }

    /// Insert or overwrite a snapshot, stamping it as most-recently-used.
    /// Returns `true` if insertion forced eviction of the
    /// least-recently-used entry (capacity overflow). A single write lock
    /// covers the whole operation; callers degrade gracefully on `true` —
    /// eviction is logged, never fatal.
    pub async fn add(&self, id: OrderId, order: Order) -> bool {
        let mut guard = self.inner.write().await;
        let expires_at = Instant::now() + self.ttl;
        let last_used = AtomicU64::new(guard.tick());
        guard.entries.insert(id, Entry { order, expires_at, last_used });

        if guard.entries.len() > guard.capacity {
            let evicted = guard.evict_lru();
            if let Some(evicted_id) = evicted {
                tracing::debug!(evicted_order_id = %evicted_id, "order cache evicted entry on overflow");
            }
            return evicted.is_some();
        }
        false
    }

    /// Spawn the background janitor: sweeps expired entries every
    /// `sweep_interval`. Must not block `get` for more than the sweep's own
    /// write-lock hold, which is O(entries) once per tick, not per read.
    pub fn spawn_janitor(self: Arc<Self>, sweep_interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            loop {
                ticker.tick().await;
                self.sweep_expired().await;
            }
        })
    }

    async fn sweep_expired(&self) {
        let mut guard = self.inner.write().await;
        let now = Instant::now();
        let before = guard.entries.len();
        guard.entries.retain(|_, entry| entry.expires_at > now);
        let swept = before - guard.entries.len();
        if swept > 0 {
            tracing::debug!(swept, "order cache janitor swept expired entries");
        }
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orders_schemas::{PaymentKind, UserId};
    use uuid::Uuid;

    fn sample_order(id: OrderId) -> Order {
        Order {
            order_id: id,
            user_id: UserId(Uuid::new_v4()),
            payment_kind: PaymentKind::Card,
            status: orders_schemas::OrderStatus::Created,
            points_redeemed: 0,
            products: vec![],
        }
    }

    #[tokio::test]
    async fn miss_on_empty_cache() {
        let cache = OrderCache::with_defaults(10);
        assert!(cache.get(OrderId(Uuid::new_v4())).await.is_none());
    }

    #[tokio::test]
    async fn hit_after_add() {
        let cache = OrderCache::with_defaults(10);
        let id = OrderId(Uuid::new_v4());
        cache.add(id, sample_order(id)).await;
        let got = cache.get(id).await.expect("must hit after add");
        assert_eq!(got.order_id, id);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_not_returned() {
        let cache = OrderCache::new(10, Duration::from_secs(1));
        let id = OrderId(Uuid::new_v4());
        cache.add(id, sample_order(id)).await;
        assert!(cache.get(id).await.is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get(id).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn janitor_sweep_removes_expired_entries() {
        let cache = Arc::new(OrderCache::new(10, Duration::from_secs(1)));
        let id = OrderId(Uuid::new_v4());
        cache.add(id, sample_order(id)).await;

        let _handle = Arc::clone(&cache).spawn_janitor(Duration::from_secs(5));

        tokio::time::advance(Duration::from_secs(2)).await;
        tokio::time::advance(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;

        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn overflow_evicts_oldest_surviving_entry() {
        let cache = OrderCache::with_defaults(2);
        let a = OrderId(Uuid::new_v4());
        let b = OrderId(Uuid::new_v4());
        let c = OrderId(Uuid::new_v4());

        assert!(!cache.add(a, sample_order(a)).await);
        assert!(!cache.add(b, sample_order(b)).await);
        assert!(cache.add(c, sample_order(c)).await, "third insert must evict");

        assert!(cache.get(a).await.is_none(), "oldest entry should be evicted");
        assert!(cache.get(b).await.is_some());
        assert!(cache.get(c).await.is_some());
    }

    #[tokio::test]
    async fn overwrite_refreshes_recency_and_outlives_an_untouched_peer() {
        let cache = OrderCache::with_defaults(2);
        let a = OrderId(Uuid::new_v4());
        let b = OrderId(Uuid::new_v4());
        let c = OrderId(Uuid::new_v4());

        cache.add(a, sample_order(a)).await;
        cache.add(b, sample_order(b)).await;
        // Overwrite `a` — must refresh its recency, not just append a second,
        // stale recency entry for it.
        assert!(!cache.add(a, sample_order(a)).await);
        assert_eq!(cache.len().await, 2);

        assert!(cache.add(c, sample_order(c)).await, "third insert must evict");
        assert!(cache.get(a).await.is_some(), "overwritten entry must not be the LRU victim");
        assert!(cache.get(b).await.is_none(), "b is now the least-recently-used entry");
    }

    #[tokio::test]
    async fn get_refreshes_recency_so_an_accessed_entry_survives_overflow() {
        let cache = OrderCache::with_defaults(2);
        let a = OrderId(Uuid::new_v4());
        let b = OrderId(Uuid::new_v4());
        let c = OrderId(Uuid::new_v4());

        cache.add(a, sample_order(a)).await;
        cache.add(b, sample_order(b)).await;
        // Touch `a` so `b` becomes the least-recently-used entry.
        assert!(cache.get(a).await.is_some());

        assert!(cache.add(c, sample_order(c)).await, "third insert must evict");
        assert!(cache.get(a).await.is_some(), "recently-read entry must survive");
        assert!(cache.get(b).await.is_none(), "least-recently-used entry should be evicted");
        assert!(cache.get(c).await.is_some());
    }
}
