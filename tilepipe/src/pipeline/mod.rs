//! Request generation pipeline.
//!
//! Validated requests flow through single-flight de-duplication and a
//! bounded admission queue before their payload is compressed and stored.
//!
//! # Architecture
//!
//! ```text
//! JSON ─► RequestValidator ─► TileRequest / MetaRequest
//!                                   │
//!                                   ▼
//!              Pipeline ─► PromiseMap ─► AdmissionQueue ─► backend create
//!                 │                                             │
//!                 │                                  Compression│
//!                 ▼                                             ▼
//!               Store ◄───────────────────────────────── store.set
//! ```
//!
//! # Key Components
//!
//! - [`Pipeline`] - Registration, validation and generate/get operations
//! - [`PipelineRegistry`] - Pipelines addressed by id
//! - [`PromiseMap`] - Shares one in-flight result between callers
//! - [`AdmissionQueue`] - Caps concurrent backend calls and queued work
//! - [`BlockingExecutor`] - Runs synchronous backends off the async runtime

mod engine;
mod error;
mod executor;
mod named;
mod promise;
mod queue;
mod semaphore;
mod stats;

pub use engine::Pipeline;
pub use error::{PipelineError, QueueError};
pub use executor::{BlockingExecutor, BlockingResult, ExecutorError, TokioExecutor};
pub use named::PipelineRegistry;
pub use promise::{Promise, PromiseMap, PromiseStats};
pub use queue::{AdmissionQueue, QueueStats};
pub use semaphore::{AdmissionPermit, AdmissionSemaphore};
pub use stats::PipelineStats;
