//! tilepipe - validated, de-duplicated tile and metadata generation
//!
//! Clients describe work as JSON documents. The library validates them
//! against registered backend types, compiles boolean query expressions,
//! runs each distinct request once under bounded concurrency, and keeps the
//! compressed results in a pluggable store.
//!
//! # High-Level API
//!
//! ```ignore
//! use tilepipe::{Pipeline, PipelineConfig, MemoryStore};
//!
//! let mut pipeline = Pipeline::new(PipelineConfig::load()?);
//! pipeline.register_tile("heatmap", || Box::new(Heatmap::default()));
//! pipeline.register_query("range", || Box::new(Range::default()));
//! pipeline.register_store_factory(MemoryStore::default().factory());
//!
//! let request = pipeline.new_tile_request(&document)?;
//! let png = pipeline.generate_and_get(&request).await?;
//! ```

pub mod compression;
pub mod config;
pub mod coord;
pub mod json;
pub mod logging;
pub mod pipeline;
pub mod query;
pub mod registry;
pub mod request;
pub mod store;

pub use compression::Compression;
pub use config::PipelineConfig;
pub use coord::TileCoord;
pub use json::ValidationError;
pub use pipeline::{Pipeline, PipelineError, PipelineRegistry};
pub use query::{Query, QueryLeaf};
pub use registry::{BackendError, Params, Parse, Registry};
pub use request::{GenerationRequest, Meta, MetaRequest, Tile, TileRequest};
pub use store::{MemoryStore, Store, StoreError};

/// Version of the tilepipe library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
