use std::fmt;
use std::sync::Arc;

use super::{hash_components, GenerationRequest, Tile};
use crate::coord::TileCoord;
use crate::query::Query;
use crate::registry::BackendError;

/// Request to generate one tile.
///
/// Immutable once built. Cloning is cheap: the tile renderer and query are
/// shared, which lets the pipeline hand a copy to its generation task.
///
/// # Example
///
/// ```ignore
/// let request = pipeline.new_tile_request(&serde_json::json!({
///     "uri": "dataset",
///     "coord": { "x": 12, "y": 3, "z": 4 },
///     "tile": { "heatmap": { "resolution": 256 } },
///     "query": [ { "exists": { "field": "name" } }, "AND", "NOT", { "prefix": { "field": "name", "value": "a" } } ]
/// }))?;
/// ```
#[derive(Clone)]
pub struct TileRequest {
    uri: String,
    coord: TileCoord,
    tile_type: String,
    tile: Arc<dyn Tile>,
    query: Option<Arc<Query>>,
}

impl TileRequest {
    /// Creates a tile request from already-resolved parts.
    ///
    /// # Arguments
    ///
    /// * `uri` - Dataset identifier
    /// * `coord` - Tile coordinate
    /// * `tile_type` - Type-id the renderer was registered under
    /// * `tile` - Parsed renderer
    /// * `query` - Optional compiled query
    pub fn new(
        uri: impl Into<String>,
        coord: TileCoord,
        tile_type: impl Into<String>,
        tile: Box<dyn Tile>,
        query: Option<Query>,
    ) -> Self {
        Self {
            uri: uri.into(),
            coord,
            tile_type: tile_type.into(),
            tile: Arc::from(tile),
            query: query.map(Arc::new),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    pub fn tile_type(&self) -> &str {
        &self.tile_type
    }

    pub fn tile(&self) -> &dyn Tile {
        self.tile.as_ref()
    }

    pub fn query(&self) -> Option<&Query> {
        self.query.as_deref()
    }
}

impl GenerationRequest for TileRequest {
    fn hash(&self) -> String {
        let coord = self.coord.to_string();
        let tile_hash = self.tile.hash();
        let query_hash = self.query.as_ref().map(|q| q.hash()).unwrap_or_default();
        hash_components(&[
            "tile",
            &self.uri,
            &coord,
            &self.tile_type,
            &tile_hash,
            &query_hash,
        ])
    }

    fn create(&self) -> Result<Vec<u8>, BackendError> {
        self.tile.create(&self.uri, &self.coord, self.query())
    }
}

impl fmt::Debug for TileRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileRequest")
            .field("uri", &self.uri)
            .field("coord", &self.coord)
            .field("tile_type", &self.tile_type)
            .field("query", &self.query.as_ref().map(|q| q.hash()))
            .finish()
    }
}
