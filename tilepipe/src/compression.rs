//! Payload compression applied before storage.
//!
//! The compression id is part of every store key, so payloads written with
//! one setting are never read back with another.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use thiserror::Error;

/// Errors from compressing or decompressing a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompressionError {
    #[error("{codec} compression failed: {message}")]
    Compress {
        codec: &'static str,
        message: String,
    },

    #[error("{codec} decompression failed: {message}")]
    Decompress {
        codec: &'static str,
        message: String,
    },

    #[error("unknown compression `{0}` (expected gzip, zlib or none)")]
    Unknown(String),
}

/// Codec applied to payloads before they reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Compression {
    #[default]
    Gzip,
    Zlib,
    None,
}

impl Compression {
    /// Identifier used in store keys and configuration.
    pub fn id(self) -> &'static str {
        match self {
            Compression::Gzip => "gzip",
            Compression::Zlib => "zlib",
            Compression::None => "none",
        }
    }

    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        let err = |e: std::io::Error| CompressionError::Compress {
            codec: self.id(),
            message: e.to_string(),
        };

        match self {
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(data).map_err(err)?;
                encoder.finish().map_err(err)
            }
            Compression::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(data).map_err(err)?;
                encoder.finish().map_err(err)
            }
            Compression::None => Ok(data.to_vec()),
        }
    }

    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        let err = |e: std::io::Error| CompressionError::Decompress {
            codec: self.id(),
            message: e.to_string(),
        };

        let mut out = Vec::new();
        match self {
            Compression::Gzip => {
                GzDecoder::new(data).read_to_end(&mut out).map_err(err)?;
            }
            Compression::Zlib => {
                ZlibDecoder::new(data).read_to_end(&mut out).map_err(err)?;
            }
            Compression::None => out.extend_from_slice(data),
        }
        Ok(out)
    }
}

impl FromStr for Compression {
    type Err = CompressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gzip" => Ok(Compression::Gzip),
            "zlib" => Ok(Compression::Zlib),
            "none" | "" => Ok(Compression::None),
            _ => Err(CompressionError::Unknown(s.to_string())),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Compression; 3] = [Compression::Gzip, Compression::Zlib, Compression::None];

    #[test]
    fn test_round_trip() {
        let payload = b"tile payload tile payload tile payload".repeat(32);
        for codec in ALL {
            let packed = codec.compress(&payload).unwrap();
            assert_eq!(codec.decompress(&packed).unwrap(), payload, "{codec}");
        }
    }

    #[test]
    fn test_empty_payload() {
        for codec in ALL {
            let packed = codec.compress(&[]).unwrap();
            assert!(codec.decompress(&packed).unwrap().is_empty(), "{codec}");
        }
    }

    #[test]
    fn test_gzip_shrinks_repetitive_data() {
        let payload = vec![7u8; 4096];
        assert!(Compression::Gzip.compress(&payload).unwrap().len() < 256);
    }

    #[test]
    fn test_gzip_header() {
        let packed = Compression::Gzip.compress(b"x").unwrap();
        assert_eq!(&packed[..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn test_corrupt_input() {
        let err = Compression::Zlib.decompress(b"not zlib").unwrap_err();
        assert!(matches!(err, CompressionError::Decompress { codec: "zlib", .. }));
    }

    #[test]
    fn test_parse_and_display() {
        for codec in ALL {
            assert_eq!(codec.id().parse::<Compression>().unwrap(), codec);
            assert_eq!(codec.to_string(), codec.id());
        }
        assert_eq!("GZIP".parse::<Compression>().unwrap(), Compression::Gzip);
        assert_eq!("".parse::<Compression>().unwrap(), Compression::None);
        assert!("brotli".parse::<Compression>().is_err());
        assert_eq!(Compression::default(), Compression::Gzip);
    }
}
