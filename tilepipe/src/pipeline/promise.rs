//! Single-flight promises keyed by request hash.
//!
//! When several callers ask for the same payload at once, only the first
//! starts generation. Everyone else waits on the same promise and receives
//! the same result.
//!
//! # Architecture
//!
//! ```text
//! Generate A ─┐
//!             │                            spawned
//! Generate B ─┼──► PromiseMap ──(first)──► generation task
//!             │        │                        │
//! Generate C ─┘        │                        │ resolve(hash, result)
//!                      ▼                        ▼
//!                [A, B, C all wait ◄──── promise removed from map,
//!                 on one promise]        then resolved
//! ```
//!
//! A promise is removed from the map under the same lock that resolves it,
//! so a caller either joins an unresolved promise or starts a new one.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

/// A value that becomes available once, to any number of waiters.
#[derive(Debug)]
pub struct Promise<T> {
    state: watch::Sender<Option<T>>,
}

impl<T: Clone> Promise<T> {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self { state }
    }

    /// Stores `value` and wakes every waiter.
    ///
    /// Returns false if the promise was already resolved; the first value wins.
    pub fn resolve(&self, value: T) -> bool {
        let mut resolved = false;
        self.state.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(value);
            resolved = true;
            true
        });
        resolved
    }

    pub fn is_resolved(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Waits for the value.
    ///
    /// Returns `None` only if the channel closes before resolution, which
    /// cannot happen while the promise itself is alive.
    pub async fn wait(&self) -> Option<T> {
        let mut rx = self.state.subscribe();
        let value = rx.wait_for(Option::is_some).await.ok()?;
        value.clone()
    }
}

impl<T: Clone> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics for monitoring single-flight effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PromiseStats {
    /// Lookups made through the map
    pub total_requests: u64,
    /// Lookups that created a promise and started work
    pub new_requests: u64,
    /// Lookups that joined an existing promise
    pub coalesced_requests: u64,
}

impl PromiseStats {
    /// Returns the coalescing ratio (0.0 to 1.0)
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

struct Inner<T> {
    promises: HashMap<String, Arc<Promise<T>>>,
    stats: PromiseStats,
}

/// In-flight promises keyed by request hash.
pub struct PromiseMap<T> {
    inner: Mutex<Inner<T>>,
}

impl<T: Clone> PromiseMap<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                promises: HashMap::new(),
                stats: PromiseStats::default(),
            }),
        }
    }

    /// Returns the in-flight promise for `hash`, creating one if needed.
    ///
    /// The flag is true if the promise already existed. A caller that gets
    /// `false` owns the work and must eventually call [`resolve`](Self::resolve).
    pub fn get_or_create(&self, hash: &str) -> (Arc<Promise<T>>, bool) {
        let mut inner = self.inner.lock();
        inner.stats.total_requests += 1;

        if let Some(promise) = inner.promises.get(hash) {
            let promise = Arc::clone(promise);
            inner.stats.coalesced_requests += 1;
            debug!(hash, "Joining in-flight promise");
            return (promise, true);
        }

        let promise = Arc::new(Promise::new());
        inner.promises.insert(hash.to_string(), Arc::clone(&promise));
        inner.stats.new_requests += 1;
        debug!(
            hash,
            in_flight = inner.promises.len(),
            "Created promise"
        );
        (promise, false)
    }

    /// Removes the promise for `hash` and resolves it with `value`.
    ///
    /// Returns false if no promise was in flight.
    pub fn resolve(&self, hash: &str, value: T) -> bool {
        let mut inner = self.inner.lock();
        match inner.promises.remove(hash) {
            Some(promise) => {
                let waiters = Arc::strong_count(&promise) - 1;
                promise.resolve(value);
                debug!(hash, waiters, "Resolved promise");
                true
            }
            None => false,
        }
    }

    /// Returns the number of unresolved promises.
    pub fn in_flight_count(&self) -> usize {
        self.inner.lock().promises.len()
    }

    /// Returns a snapshot of the current statistics.
    pub fn stats(&self) -> PromiseStats {
        self.inner.lock().stats
    }

    /// Logs current statistics.
    pub fn log_stats(&self) {
        let inner = self.inner.lock();
        let stats = inner.stats;
        info!(
            total_requests = stats.total_requests,
            coalesced = stats.coalesced_requests,
            new_requests = stats.new_requests,
            in_flight = inner.promises.len(),
            coalescing_ratio = format!("{:.1}%", stats.coalescing_ratio() * 100.0),
            "Promise map statistics"
        );
    }
}

impl<T: Clone> Default for PromiseMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    type Outcome = Result<u32, String>;

    #[tokio::test]
    async fn test_first_caller_creates() {
        let map: PromiseMap<Outcome> = PromiseMap::new();

        let (_, existed) = map.get_or_create("a");
        assert!(!existed);
        let (_, existed) = map.get_or_create("a");
        assert!(existed);
        let (_, existed) = map.get_or_create("b");
        assert!(!existed);

        assert_eq!(map.in_flight_count(), 2);
        let stats = map.stats();
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.new_requests, 2);
        assert_eq!(stats.coalesced_requests, 1);
    }

    #[tokio::test]
    async fn test_all_waiters_receive_result() {
        let map: Arc<PromiseMap<Outcome>> = Arc::new(PromiseMap::new());
        let (owner, _) = map.get_or_create("tile");

        let mut waiters = Vec::new();
        for _ in 0..5 {
            let (promise, existed) = map.get_or_create("tile");
            assert!(existed);
            waiters.push(tokio::spawn(async move { promise.wait().await }));
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(map.resolve("tile", Ok(7)));

        assert_eq!(owner.wait().await, Some(Ok(7)));
        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), Some(Ok(7)));
        }
    }

    #[tokio::test]
    async fn test_errors_are_shared() {
        let map: PromiseMap<Outcome> = PromiseMap::new();
        let (first, _) = map.get_or_create("tile");
        let (second, _) = map.get_or_create("tile");

        map.resolve("tile", Err("backend down".to_string()));
        assert_eq!(first.wait().await, Some(Err("backend down".to_string())));
        assert_eq!(second.wait().await, Some(Err("backend down".to_string())));
    }

    #[tokio::test]
    async fn test_resolve_removes_entry() {
        let map: PromiseMap<Outcome> = PromiseMap::new();
        let (old, _) = map.get_or_create("tile");
        map.resolve("tile", Ok(1));
        assert_eq!(map.in_flight_count(), 0);

        // a later lookup starts fresh work
        let (fresh, existed) = map.get_or_create("tile");
        assert!(!existed);
        assert!(!fresh.is_resolved());
        assert!(old.is_resolved());
    }

    #[tokio::test]
    async fn test_resolve_unknown_hash() {
        let map: PromiseMap<Outcome> = PromiseMap::new();
        assert!(!map.resolve("missing", Ok(1)));
    }

    #[tokio::test]
    async fn test_wait_after_resolution() {
        let promise: Promise<Outcome> = Promise::new();
        assert!(promise.resolve(Ok(3)));
        assert!(!promise.resolve(Ok(4)));
        assert_eq!(promise.wait().await, Some(Ok(3)));
    }

    #[test]
    fn test_coalescing_ratio() {
        let stats = PromiseStats {
            total_requests: 4,
            new_requests: 1,
            coalesced_requests: 3,
        };
        assert!((stats.coalescing_ratio() - 0.75).abs() < f64::EPSILON);
        assert_eq!(PromiseStats::default().coalescing_ratio(), 0.0);
    }
}
