//! Generation requests and the backend traits that fulfil them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 request JSON (serde_json::Value)            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     RequestValidator                        │
//! │    uri / coord / tile|meta / query, all issues collected    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┴──────────────┐
//!               ▼                             ▼
//! ┌─────────────────────────┐   ┌─────────────────────────────┐
//! │      TileRequest        │   │        MetaRequest          │
//! │  Arc<dyn Tile> + Query  │   │       Arc<dyn Meta>         │
//! └─────────────────────────┘   └─────────────────────────────┘
//! ```
//!
//! Both request types implement [`GenerationRequest`], the only view the
//! pipeline needs: a cache hash and a blocking `create`.

mod meta;
mod tile;
mod validator;

pub use meta::MetaRequest;
pub use tile::TileRequest;
pub use validator::RequestValidator;

use crate::coord::TileCoord;
use crate::query::Query;
use crate::registry::{BackendError, Parse};

/// A tile renderer selected by type-id.
///
/// `create` may block on I/O; the pipeline runs it on the blocking pool.
pub trait Tile: Parse + Send + Sync {
    /// Deterministic fingerprint of the parsed parameters.
    fn hash(&self) -> String;

    /// Renders the tile at `coord` of `uri`, optionally filtered by `query`.
    fn create(
        &self,
        uri: &str,
        coord: &TileCoord,
        query: Option<&Query>,
    ) -> Result<Vec<u8>, BackendError>;
}

/// A metadata generator selected by type-id.
pub trait Meta: Parse + Send + Sync {
    /// Deterministic fingerprint of the parsed parameters.
    fn hash(&self) -> String;

    /// Produces the metadata document for `uri`.
    fn create(&self, uri: &str) -> Result<Vec<u8>, BackendError>;
}

/// A validated request the pipeline can cache and generate.
pub trait GenerationRequest: Send + Sync + 'static {
    /// Deterministic key; distinct whenever any semantic input differs.
    fn hash(&self) -> String;

    /// Produces the uncompressed payload. May block.
    fn create(&self) -> Result<Vec<u8>, BackendError>;
}

/// Joins hash components so that no component can bleed into another.
pub(crate) fn hash_components(components: &[&str]) -> String {
    // a JSON array quotes and escapes each component
    serde_json::Value::from(components.to_vec()).to_string()
}
