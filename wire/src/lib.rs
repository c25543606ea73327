//! Wire framing for D-Bus messages: the 16-byte fixed header, endianness
//! handling, header field codes, and the protocol limits.
//!
//! This crate handles only the fixed layout at the front of a message. The
//! variable regions (header fields, body) are interpreted by the `message`
//! crate.
//!
//! # Design Principles
//!
//! - **Stable wire format** - Layout and limits come from the protocol, not
//!   from configuration.
//! - **Bounded decoding** - Every read is length-checked before access.
//! - **No domain knowledge** - This crate frames bytes, it does not
//!   interpret bodies.

mod endian;
mod error;
mod header;
mod limits;

pub use endian::Endian;
pub use error::HeaderError;
pub use header::{FieldCode, Flags, Header, MessageType, HEADER_SIZE, VERSION};
pub use limits::{ARRAY_MAX_BYTES, CONTAINER_DEPTH_MAX, MESSAGE_SIZE_MAX};

/// Rounds `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two.
#[must_use]
pub const fn align_to(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}
