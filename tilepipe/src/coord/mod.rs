//! Tile coordinate types.
//!
//! The pipeline treats coordinates as opaque addressing: projection math
//! lives with the tile backends that consume them.

mod types;

pub use types::TileCoord;
