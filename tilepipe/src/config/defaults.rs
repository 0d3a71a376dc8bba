//! Default values for pipeline settings.

use crate::compression::Compression;

/// Default payload codec.
pub const DEFAULT_COMPRESSION: Compression = Compression::Gzip;

/// Default number of concurrent backend `create` calls.
pub const DEFAULT_MAX_CONCURRENT: usize = 32;

/// Default number of requests allowed to wait for a slot.
pub const DEFAULT_QUEUE_LENGTH: usize = 256 * 8;
