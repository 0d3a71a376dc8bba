//! Executor abstraction for blocking backend work.
//!
//! Tile, meta and store backends are synchronous and may block on I/O. The
//! pipeline never calls them on an async worker thread; it hands them to a
//! [`BlockingExecutor`] instead.
//!
//! ```text
//! ┌─────────────────────┐
//! │  Pipeline / Queue   │  (async)
//! └─────────┬───────────┘
//!           │ execute_blocking(|| backend call)
//!           ▼
//! ┌─────────────────────┐
//! │  BlockingExecutor   │
//! └─────────┬───────────┘
//!           │ implemented by
//!           ▼
//! ┌─────────────────────┐
//! │  TokioExecutor      │  spawn_blocking
//! └─────────────────────┘
//! ```

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// Result future returned by [`BlockingExecutor::execute_blocking`].
pub type BlockingResult<R> = Pin<Box<dyn Future<Output = Result<R, ExecutorError>> + Send>>;

/// Runs blocking closures off the async runtime.
pub trait BlockingExecutor: Send + Sync + 'static {
    /// Executes `f` on a thread pool reserved for blocking work.
    ///
    /// # Type Parameters
    ///
    /// * `F` - The closure type
    /// * `R` - The return type (must be Send to cross thread boundary)
    fn execute_blocking<F, R>(&self, f: F) -> BlockingResult<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static;
}

/// Errors that can occur while executing blocking work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    /// The closure panicked
    #[error("task panicked: {0}")]
    TaskPanicked(String),

    /// The runtime is shutting down
    #[error("executor shut down")]
    Shutdown,
}

/// Tokio-based executor using `spawn_blocking`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioExecutor;

impl TokioExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl BlockingExecutor for TokioExecutor {
    fn execute_blocking<F, R>(&self, f: F) -> BlockingResult<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        Box::pin(async move {
            tokio::task::spawn_blocking(f).await.map_err(|e| {
                if e.is_cancelled() {
                    ExecutorError::Shutdown
                } else {
                    ExecutorError::TaskPanicked(e.to_string())
                }
            })
        })
    }
}

/// Synchronous executor for testing.
///
/// Executes "blocking" work immediately on the current thread.
#[cfg(test)]
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncExecutor;

#[cfg(test)]
impl BlockingExecutor for SyncExecutor {
    fn execute_blocking<F, R>(&self, f: F) -> BlockingResult<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let result = f();
        Box::pin(std::future::ready(Ok(result)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_error_display() {
        let err = ExecutorError::TaskPanicked("oops".to_string());
        assert_eq!(format!("{}", err), "task panicked: oops");
        assert_eq!(ExecutorError::Shutdown.to_string(), "executor shut down");
    }

    #[tokio::test]
    async fn test_tokio_executor_blocking() {
        let executor = TokioExecutor::new();
        let result = executor.execute_blocking(|| 42).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_tokio_executor_panic() {
        let executor = TokioExecutor::new();
        let result = executor
            .execute_blocking(|| -> u32 { panic!("backend exploded") })
            .await;
        assert!(matches!(result, Err(ExecutorError::TaskPanicked(_))));
    }

    #[test]
    fn test_sync_executor_blocking() {
        let executor = SyncExecutor;
        let future = executor.execute_blocking(|| 42);
        let result = futures::executor::block_on(future);
        assert_eq!(result.unwrap(), 42);
    }
}
