//! Pipeline configuration.
//!
//! [`PipelineConfig`] carries the settings a [`Pipeline`](crate::pipeline::Pipeline)
//! is built from. It can be assembled in code with the `with_*` builders or
//! loaded from an INI file:
//!
//! ```ini
//! [pipeline]
//! compression = gzip
//! max_concurrent = 32
//! queue_length = 2048
//! ```
//!
//! # Example
//!
//! ```
//! use tilepipe::compression::Compression;
//! use tilepipe::config::PipelineConfig;
//!
//! let config = PipelineConfig::default()
//!     .with_compression(Compression::Zlib)
//!     .with_max_concurrent(8);
//! assert_eq!(config.queue_length, 2048);
//! ```

mod defaults;
mod file;
mod parser;
mod writer;

pub use defaults::{DEFAULT_COMPRESSION, DEFAULT_MAX_CONCURRENT, DEFAULT_QUEUE_LENGTH};
pub use file::{config_directory, config_file_path, ConfigFileError};

use crate::compression::Compression;

/// Settings for one pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Codec applied to payloads before storage
    pub compression: Compression,
    /// Concurrent backend `create` calls
    pub max_concurrent: usize,
    /// Requests allowed to wait beyond the running ones
    pub queue_length: usize,
}

impl PipelineConfig {
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_queue_length(mut self, queue_length: usize) -> Self {
        self.queue_length = queue_length;
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            compression: DEFAULT_COMPRESSION,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            queue_length: DEFAULT_QUEUE_LENGTH,
        }
    }
}
