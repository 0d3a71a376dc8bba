//! Error types for the pipeline.

use thiserror::Error;

use super::executor::ExecutorError;
use crate::compression::CompressionError;
use crate::json::ValidationError;
use crate::store::StoreError;

/// Errors from the admission queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Every execution slot and backlog slot is taken
    #[error("queue has reached maximum length of {max_length} and is no longer accepting requests")]
    BacklogExceeded { max_length: usize },

    /// The backend's create call failed
    #[error("generation failed: {0}")]
    Generation(String),

    /// The backend's create call panicked
    #[error("generation task panicked: {0}")]
    TaskPanicked(String),

    /// The queue's semaphore was closed
    #[error("admission queue closed")]
    Closed,
}

/// Errors returned by [`Pipeline`](super::Pipeline) operations.
///
/// Cloneable so that one generation failure can be delivered to every
/// caller waiting on the same request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The request document was invalid
    #[error("invalid request:\n{0}")]
    Validation(#[from] ValidationError),

    /// Admission or generation failed
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Compression(#[from] CompressionError),

    /// Blocking store or codec work could not complete
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// No pipeline is registered under the id
    #[error("unknown pipeline `{0}`")]
    UnknownPipeline(String),

    /// Internal error (e.g. a generation task ended without a result)
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Returns true if the request was refused because the queue is full.
    pub fn is_backpressure(&self) -> bool {
        matches!(self, PipelineError::Queue(QueueError::BacklogExceeded { .. }))
    }

    /// Returns true if the payload was absent from the store.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PipelineError::Store(StoreError::NotFound(_)))
    }
}
