//! The 16-byte fixed header, message types, flags, and field codes.

use crate::endian::Endian;
use crate::error::HeaderError;

/// Size of the fixed header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Major protocol version this crate speaks.
pub const VERSION: u8 = 1;

/// The four message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    MethodCall = 1,
    MethodReturn = 2,
    MethodError = 3,
    Signal = 4,
}

impl MessageType {
    /// Parses a message type byte.
    #[must_use]
    pub const fn parse(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::MethodCall),
            2 => Some(Self::MethodReturn),
            3 => Some(Self::MethodError),
            4 => Some(Self::Signal),
            _ => None,
        }
    }

    /// Returns the wire byte for this type.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Header flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(u8);

impl Flags {
    /// Flag indicating the sender does not expect a reply.
    pub const NO_REPLY_EXPECTED: u8 = 1 << 0;

    /// Creates flags from a raw byte.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    /// Returns the raw flag byte.
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Returns `true` if no reply is expected.
    #[must_use]
    pub const fn no_reply_expected(self) -> bool {
        self.0 & Self::NO_REPLY_EXPECTED != 0
    }

    /// Returns these flags with the no-reply bit set.
    #[must_use]
    pub const fn with_no_reply_expected(self) -> Self {
        Self(self.0 | Self::NO_REPLY_EXPECTED)
    }

    /// Returns these flags with the no-reply bit cleared.
    #[must_use]
    pub const fn without_no_reply_expected(self) -> Self {
        Self(self.0 & !Self::NO_REPLY_EXPECTED)
    }
}

/// Header field codes carried in the fields region.
///
/// Code 0 is invalid on the wire; codes above [`FieldCode::UnixFds`] are
/// unknown and skipped by parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldCode {
    Path = 1,
    Interface = 2,
    Member = 3,
    ErrorName = 4,
    ReplySerial = 5,
    Destination = 6,
    Sender = 7,
    Signature = 8,
    UnixFds = 9,
}

impl FieldCode {
    /// Parses a field code byte; unknown codes yield `None`.
    #[must_use]
    pub const fn parse(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Path),
            2 => Some(Self::Interface),
            3 => Some(Self::Member),
            4 => Some(Self::ErrorName),
            5 => Some(Self::ReplySerial),
            6 => Some(Self::Destination),
            7 => Some(Self::Sender),
            8 => Some(Self::Signature),
            9 => Some(Self::UnixFds),
            _ => None,
        }
    }

    /// Returns the wire byte for this code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// The fixed header of a message.
///
/// ```text
/// off  size  field
///  0    1    endian marker ('l' | 'B')
///  1    1    message type (1..4)
///  2    1    flags
///  3    1    major protocol version (= 1)
///  4    4    body size
///  8    4    serial (nonzero)
/// 12    4    fields-region size
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Byte order of every multi-byte integer in the message.
    pub endian: Endian,
    /// Message type.
    pub kind: MessageType,
    /// Flag bits.
    pub flags: Flags,
    /// Major protocol version.
    pub version: u8,
    /// Size of the body region in bytes.
    pub body_size: u32,
    /// Message serial; zero only while a built message is unsealed.
    pub serial: u32,
    /// Size of the fields region in bytes, excluding trailing padding.
    pub fields_size: u32,
}

impl Header {
    /// Creates a header for a new native-endian message of the given type.
    #[must_use]
    pub const fn new(kind: MessageType) -> Self {
        Self {
            endian: Endian::NATIVE,
            kind,
            flags: Flags::from_raw(0),
            version: VERSION,
            body_size: 0,
            serial: 0,
            fields_size: 0,
        }
    }

    /// Encodes the header into its 16-byte wire form.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0] = self.endian.marker();
        out[1] = self.kind.code();
        out[2] = self.flags.raw();
        out[3] = self.version;
        out[4..8].copy_from_slice(&self.endian.write_u32(self.body_size));
        out[8..12].copy_from_slice(&self.endian.write_u32(self.serial));
        out[12..16].copy_from_slice(&self.endian.write_u32(self.fields_size));
        out
    }

    /// Decodes and validates a fixed header from the front of `buf`.
    ///
    /// # Errors
    ///
    /// Rejects short buffers, unknown endian markers, unknown message
    /// types, versions other than 1, and zero serials.
    pub fn decode(buf: &[u8]) -> Result<Self, HeaderError> {
        if buf.len() < HEADER_SIZE {
            return Err(HeaderError::TooSmall {
                actual: buf.len(),
                required: HEADER_SIZE,
            });
        }

        let endian = Endian::from_marker(buf[0])
            .ok_or(HeaderError::BadEndianMarker { found: buf[0] })?;
        let kind =
            MessageType::parse(buf[1]).ok_or(HeaderError::InvalidType { found: buf[1] })?;
        let flags = Flags::from_raw(buf[2]);
        let version = buf[3];
        if version != VERSION {
            return Err(HeaderError::UnsupportedVersion { found: version });
        }

        let body_size = endian.read_u32(buf[4..8].try_into().unwrap());
        let serial = endian.read_u32(buf[8..12].try_into().unwrap());
        if serial == 0 {
            return Err(HeaderError::InvalidSerial);
        }
        let fields_size = endian.read_u32(buf[12..16].try_into().unwrap());

        Ok(Self {
            endian,
            kind,
            flags,
            version,
            body_size,
            serial,
            fields_size,
        })
    }
}
