//! Coordinate type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tile coordinates in the TMS/Slippy Map grid.
///
/// `(0, 0)` addresses the first tile at zoom `z`; interpretation of the
/// axes is left to the tile backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// X coordinate (column)
    pub x: u32,
    /// Y coordinate (row)
    pub y: u32,
    /// Zoom level
    pub z: u32,
}

impl TileCoord {
    /// Creates a new tile coordinate.
    #[inline]
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Returns the number of tiles along one axis at this zoom level.
    ///
    /// Saturates at `u64::MAX` for zoom levels beyond 63.
    #[inline]
    pub fn tiles_per_axis(&self) -> u64 {
        1u64.checked_shl(self.z).unwrap_or(u64::MAX)
    }

    /// Returns true if `x` and `y` fall inside the grid for this zoom level.
    #[inline]
    pub fn is_in_range(&self) -> bool {
        let n = self.tiles_per_axis();
        u64::from(self.x) < n && u64::from(self.y) < n
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}
