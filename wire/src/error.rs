//! Error types for fixed-header decoding.

use std::fmt;

/// Errors raised while validating the 16-byte fixed header.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HeaderError {
    /// Buffer is too small to contain the fixed header.
    TooSmall { actual: usize, required: usize },

    /// First byte is neither `l` nor `B`.
    BadEndianMarker { found: u8 },

    /// Unknown message type byte.
    InvalidType { found: u8 },

    /// Unsupported major protocol version.
    UnsupportedVersion { found: u8 },

    /// Serial number is zero.
    InvalidSerial,

    /// Buffer length does not match header + fields + padding + body.
    LengthMismatch { expected: usize, actual: usize },
}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooSmall { actual, required } => {
                write!(
                    f,
                    "buffer too small for header: {actual} bytes, need at least {required}"
                )
            }
            Self::BadEndianMarker { found } => {
                write!(f, "bad endian marker: 0x{found:02X}")
            }
            Self::InvalidType { found } => {
                write!(f, "invalid message type: {found}")
            }
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported protocol version: {found}")
            }
            Self::InvalidSerial => write!(f, "message serial is zero"),
            Self::LengthMismatch { expected, actual } => {
                write!(
                    f,
                    "message length mismatch: header describes {expected} bytes but {actual} received"
                )
            }
        }
    }
}

impl std::error::Error for HeaderError {}
