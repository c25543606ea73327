//! D-Bus message codec: construct, serialize, parse, and traverse messages
//! in the D-Bus wire format.
//!
//! Two symmetric pipelines share one [`Message`] object:
//!
//! - **Build**: a constructor, typed appends and container opens/closes,
//!   then [`Message::seal`], which assigns the serial and materializes the
//!   serialized view.
//! - **Parse**: [`Message::from_buffer`] takes ownership of a received
//!   buffer, validates the header, enumerates the header fields, and the
//!   read cursor traverses the body on demand, zero-copy.
//!
//! # Design Principles
//!
//! - **Validation at read time** - The writer trusts itself; everything
//!   taken off the wire is validated before it is handed out.
//! - **No panics on input** - Malformed buffers surface as errors.
//! - **Offsets, not pointers** - Interior references survive region
//!   growth by construction.

mod container;
mod dump;
mod error;
mod fields;
mod message;
mod reader;
mod region;
mod seal;
mod value;
mod writer;

pub use error::{Error, Malformed, MessageResult};
pub use message::{Credentials, Message, MethodError};
pub use reader::Peek;
pub use value::Value;

pub use signature::Type;
pub use wire::{Endian, Flags, MessageType};
