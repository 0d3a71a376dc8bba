//! Bounded admission queue for generation work.
//!
//! At most `max_concurrent` requests run their backend `create` at once.
//! Up to `max_backlog` more may wait for a slot. Anything beyond that is
//! refused immediately with [`QueueError::BacklogExceeded`] so callers see
//! backpressure instead of unbounded latency.
//!
//! ```text
//!             admitted (pending)
//!   ┌──────────────────────────────────────┐
//!   │  waiting ≤ max_backlog │ running ≤ max_concurrent │ ──► create()
//!   └──────────────────────────────────────┘
//!   pending ≥ max_concurrent + max_backlog ──► rejected
//! ```
//!
//! Both limits can be changed at runtime without disturbing running work.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use super::error::QueueError;
use super::executor::{BlockingExecutor, TokioExecutor};
use super::semaphore::AdmissionSemaphore;
use crate::config::{DEFAULT_MAX_CONCURRENT, DEFAULT_QUEUE_LENGTH};
use crate::request::GenerationRequest;

/// Snapshot of queue occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Admitted and not yet finished, running or waiting
    pub pending: usize,
    /// Currently running `create`
    pub in_flight: usize,
    /// Highest `in_flight` observed
    pub peak_in_flight: usize,
    pub max_concurrent: usize,
    pub max_backlog: usize,
    /// Requests refused for backpressure
    pub rejected: u64,
}

#[derive(Debug)]
struct QueueState {
    pending: usize,
    max_backlog: usize,
}

/// Limits concurrent generation and bounds the waiting backlog.
#[derive(Debug)]
pub struct AdmissionQueue<E: BlockingExecutor = TokioExecutor> {
    executor: E,
    slots: AdmissionSemaphore,
    state: Arc<Mutex<QueueState>>,
    rejected: AtomicU64,
}

impl AdmissionQueue<TokioExecutor> {
    /// Creates a queue with default limits on the Tokio blocking pool.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT, DEFAULT_QUEUE_LENGTH, TokioExecutor)
    }
}

impl<E: BlockingExecutor> AdmissionQueue<E> {
    /// Creates a queue.
    ///
    /// # Arguments
    ///
    /// * `max_concurrent` - Concurrent `create` calls (at least 1)
    /// * `max_backlog` - Requests allowed to wait beyond the running ones
    /// * `executor` - Where blocking `create` calls run
    pub fn new(max_concurrent: usize, max_backlog: usize, executor: E) -> Self {
        Self {
            executor,
            slots: AdmissionSemaphore::new(max_concurrent),
            state: Arc::new(Mutex::new(QueueState {
                pending: 0,
                max_backlog,
            })),
            rejected: AtomicU64::new(0),
        }
    }

    /// Runs `request.create()` once a slot is free.
    ///
    /// Fails immediately, without waiting, if the backlog is full.
    ///
    /// The slot and the pending count travel with the blocking call, so a
    /// caller that stops waiting does not free them while `create` still runs.
    pub async fn send<R: GenerationRequest>(&self, request: R) -> Result<Vec<u8>, QueueError> {
        let pending = self.admit()?;
        let permit = self.slots.acquire().await.map_err(|_| QueueError::Closed)?;

        let create = move || {
            let _held = (pending, permit);
            request.create()
        };
        match self.executor.execute_blocking(create).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(e)) => Err(QueueError::Generation(e.to_string())),
            Err(e) => Err(QueueError::TaskPanicked(e.to_string())),
        }
    }

    fn admit(&self) -> Result<PendingGuard, QueueError> {
        let mut state = self.state.lock();
        let max_concurrent = self.slots.limit();

        if state.pending >= max_concurrent + state.max_backlog {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            warn!(
                pending = state.pending,
                max_concurrent,
                max_backlog = state.max_backlog,
                "Queue full, rejecting request"
            );
            return Err(QueueError::BacklogExceeded {
                max_length: state.max_backlog,
            });
        }

        state.pending += 1;
        Ok(PendingGuard {
            state: Arc::clone(&self.state),
        })
    }

    /// Changes the number of concurrent `create` calls.
    ///
    /// Running calls above a reduced limit finish normally.
    pub fn set_max_concurrent(&self, max_concurrent: usize) {
        self.slots.resize(max_concurrent);
    }

    /// Changes how many requests may wait for a slot.
    pub fn set_max_backlog(&self, max_backlog: usize) {
        let mut state = self.state.lock();
        debug!(
            previous = state.max_backlog,
            max_backlog,
            "Changed queue backlog"
        );
        state.max_backlog = max_backlog;
    }

    pub fn max_concurrent(&self) -> usize {
        self.slots.limit()
    }

    pub fn max_backlog(&self) -> usize {
        self.state.lock().max_backlog
    }

    /// Requests admitted and not yet finished.
    pub fn pending(&self) -> usize {
        self.state.lock().pending
    }

    pub fn stats(&self) -> QueueStats {
        let (pending, max_backlog) = {
            let state = self.state.lock();
            (state.pending, state.max_backlog)
        };
        QueueStats {
            pending,
            in_flight: self.slots.in_flight(),
            peak_in_flight: self.slots.peak_in_flight(),
            max_concurrent: self.slots.limit(),
            max_backlog,
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Counts an admitted request until it finishes or is cancelled.
struct PendingGuard {
    state: Arc<Mutex<QueueState>>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.state.lock().pending -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::executor::SyncExecutor;
    use crate::registry::BackendError;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Blocks in `create` until the gate releases a permit.
    #[derive(Clone)]
    struct GatedRequest {
        gate: Arc<Semaphore>,
        running: Arc<AtomicUsize>,
    }

    impl GenerationRequest for GatedRequest {
        fn hash(&self) -> String {
            "gated".to_string()
        }

        fn create(&self) -> Result<Vec<u8>, BackendError> {
            self.running.fetch_add(1, Ordering::SeqCst);
            let permit = futures::executor::block_on(self.gate.acquire())?;
            permit.forget();
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(b"done".to_vec())
        }
    }

    struct Failing;

    impl GenerationRequest for Failing {
        fn hash(&self) -> String {
            "failing".to_string()
        }

        fn create(&self) -> Result<Vec<u8>, BackendError> {
            Err("renderer unavailable".into())
        }
    }

    fn gated() -> GatedRequest {
        GatedRequest {
            gate: Arc::new(Semaphore::new(0)),
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_send_returns_payload() {
        let queue = AdmissionQueue::new(2, 2, SyncExecutor);
        let request = gated();
        request.gate.add_permits(1);
        assert_eq!(queue.send(request).await.unwrap(), b"done".to_vec());
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_generation_error() {
        let queue = AdmissionQueue::new(1, 0, SyncExecutor);
        let err = queue.send(Failing).await.unwrap_err();
        assert_eq!(err, QueueError::Generation("renderer unavailable".to_string()));
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_limit() {
        let queue = Arc::new(AdmissionQueue::new(2, 16, TokioExecutor));
        let request = gated();

        let mut handles = Vec::new();
        for _ in 0..5 {
            let queue = Arc::clone(&queue);
            let request = request.clone();
            handles.push(tokio::spawn(async move { queue.send(request).await }));
        }
        settle().await;

        assert_eq!(request.running.load(Ordering::SeqCst), 2);
        assert_eq!(queue.stats().in_flight, 2);
        assert_eq!(queue.pending(), 5);

        request.gate.add_permits(5);
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(queue.stats().peak_in_flight, 2);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_backlog_rejects_without_blocking() {
        let queue = Arc::new(AdmissionQueue::new(2, 1, TokioExecutor));
        let request = gated();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let queue = Arc::clone(&queue);
            let request = request.clone();
            handles.push(tokio::spawn(async move { queue.send(request).await }));
        }
        settle().await;
        assert_eq!(queue.pending(), 3);

        let rejected =
            tokio::time::timeout(Duration::from_millis(100), queue.send(request.clone()))
                .await
                .expect("rejection must not wait for a slot");
        assert_eq!(rejected, Err(QueueError::BacklogExceeded { max_length: 1 }));
        assert_eq!(queue.stats().rejected, 1);

        request.gate.add_permits(3);
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_raising_concurrency_starts_waiting_work() {
        let queue = Arc::new(AdmissionQueue::new(1, 8, TokioExecutor));
        let request = gated();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let queue = Arc::clone(&queue);
            let request = request.clone();
            handles.push(tokio::spawn(async move { queue.send(request).await }));
        }
        settle().await;
        assert_eq!(request.running.load(Ordering::SeqCst), 1);

        queue.set_max_concurrent(3);
        settle().await;
        assert_eq!(request.running.load(Ordering::SeqCst), 3);
        assert_eq!(queue.max_concurrent(), 3);

        request.gate.add_permits(3);
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
    }

    #[tokio::test]
    async fn test_set_max_backlog() {
        let queue = AdmissionQueue::new(1, 4, SyncExecutor);
        queue.set_max_backlog(0);
        assert_eq!(queue.max_backlog(), 0);
        assert_eq!(queue.stats().max_backlog, 0);
    }

    #[test]
    fn test_defaults() {
        let queue = AdmissionQueue::with_defaults();
        assert_eq!(queue.max_concurrent(), 32);
        assert_eq!(queue.max_backlog(), 2048);
    }

    #[tokio::test]
    async fn test_cancelled_send_releases_pending() {
        let queue = AdmissionQueue::new(1, 1, TokioExecutor);
        let request = gated();

        // hold the only slot so the next send waits
        let _slot = queue.slots.try_acquire().unwrap();
        let waiting = tokio::time::timeout(Duration::from_millis(20), queue.send(request)).await;
        assert!(waiting.is_err());
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_abandoned_send_keeps_slot_until_create_returns() {
        let queue = AdmissionQueue::new(1, 0, TokioExecutor);
        let request = gated();

        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), queue.send(request.clone())).await;
        assert!(abandoned.is_err());
        assert_eq!(request.running.load(Ordering::SeqCst), 1);

        // create is still running, so the slot and the backlog stay full
        assert_eq!(queue.pending(), 1);
        assert_eq!(queue.stats().in_flight, 1);
        assert_eq!(
            queue.send(request.clone()).await,
            Err(QueueError::BacklogExceeded { max_length: 0 })
        );

        request.gate.add_permits(1);
        for _ in 0..100 {
            if queue.pending() == 0 {
                break;
            }
            settle().await;
        }
        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.stats().in_flight, 0);

        request.gate.add_permits(1);
        assert_eq!(queue.send(request.clone()).await.unwrap(), b"done".to_vec());
        assert_eq!(queue.stats().peak_in_flight, 1);
    }
}
