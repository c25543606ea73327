//! Error types for message operations.

use std::fmt;

use wire::HeaderError;

/// Result type for message operations.
pub type MessageResult<T> = Result<T, Error>;

/// Errors that can occur while building, sealing, parsing, or traversing a
/// message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A caller-supplied argument is unusable (bad type code, ill-formed
    /// signature, wrong container kind for the position).
    InvalidArgument {
        /// What was wrong.
        what: &'static str,
    },

    /// The message is in the wrong lifecycle state for the operation.
    InvalidState {
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// The sealed flag forbids the operation.
    PermissionDenied {
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// The signature position disagrees with the operation's type.
    TypeMismatch {
        /// Type code at the signature position, 0 at end of contents.
        expected: u8,
        /// Type code the caller asked for.
        requested: u8,
    },

    /// A header field that can be set only once is already present.
    Exists {
        /// The field in question.
        what: &'static str,
    },

    /// Allocation failed or a region would exceed the wire-format ceiling.
    OutOfMemory,

    /// The fixed header failed validation.
    Header(HeaderError),

    /// The variable regions failed validation.
    Malformed(Malformed),
}

/// Detail for [`Error::Malformed`]: what exactly was wrong with a received
/// message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Malformed {
    /// Alignment padding contained a nonzero byte.
    NonZeroPadding { offset: usize },

    /// A read would run past the end of its region.
    OutOfBounds { needed: usize, available: usize },

    /// A value runs past the end of its enclosing array.
    Truncated,

    /// An array length prefix exceeds the 64 MiB cap.
    ArrayTooLarge { size: u32 },

    /// More containers are open than the depth bound allows.
    DepthExceeded { depth: usize },

    /// A string is not valid UTF-8.
    InvalidUtf8,

    /// A string is missing its NUL terminator or embeds a NUL.
    BadStringFraming,

    /// An object path failed the path grammar.
    InvalidObjectPath,

    /// An interface name failed the name grammar.
    InvalidInterfaceName,

    /// A member name failed the name grammar.
    InvalidMemberName,

    /// An error name failed the name grammar.
    InvalidErrorName,

    /// A bus name failed the name grammar.
    InvalidBusName,

    /// A signature failed the type grammar.
    InvalidSignature,

    /// A header field carried code 0.
    InvalidFieldCode,

    /// A known header field carried the wrong variant signature.
    UnexpectedFieldSignature { code: u8 },

    /// A reply-serial field carried the value 0.
    ZeroReplySerial,

    /// A header field required for the message type is missing.
    MissingField { what: &'static str },

    /// Empty body with a signature, or a body with no signature.
    BodySignatureMismatch,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument { what } => write!(f, "invalid argument: {what}"),
            Self::InvalidState { operation } => {
                write!(f, "invalid state: cannot {operation}")
            }
            Self::PermissionDenied { operation } => {
                write!(f, "permission denied: cannot {operation}")
            }
            Self::TypeMismatch {
                expected,
                requested,
            } => {
                if *expected == 0 {
                    write!(
                        f,
                        "type mismatch: contents exhausted, requested '{}'",
                        *requested as char
                    )
                } else {
                    write!(
                        f,
                        "type mismatch: signature has '{}', requested '{}'",
                        *expected as char, *requested as char
                    )
                }
            }
            Self::Exists { what } => write!(f, "{what} is already set"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::Header(err) => write!(f, "bad header: {err}"),
            Self::Malformed(err) => write!(f, "malformed message: {err}"),
        }
    }
}

impl fmt::Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonZeroPadding { offset } => {
                write!(f, "nonzero padding byte at offset {offset}")
            }
            Self::OutOfBounds { needed, available } => {
                write!(f, "read out of bounds: need {needed} bytes, have {available}")
            }
            Self::Truncated => write!(f, "value truncated by its container"),
            Self::ArrayTooLarge { size } => {
                write!(f, "array of {size} bytes exceeds the 64 MiB cap")
            }
            Self::DepthExceeded { depth } => {
                write!(f, "container depth {depth} exceeds the bound")
            }
            Self::InvalidUtf8 => write!(f, "string is not valid UTF-8"),
            Self::BadStringFraming => write!(f, "string framing is broken"),
            Self::InvalidObjectPath => write!(f, "invalid object path"),
            Self::InvalidInterfaceName => write!(f, "invalid interface name"),
            Self::InvalidMemberName => write!(f, "invalid member name"),
            Self::InvalidErrorName => write!(f, "invalid error name"),
            Self::InvalidBusName => write!(f, "invalid bus name"),
            Self::InvalidSignature => write!(f, "invalid type signature"),
            Self::InvalidFieldCode => write!(f, "header field code 0"),
            Self::UnexpectedFieldSignature { code } => {
                write!(f, "unexpected signature for header field {code}")
            }
            Self::ZeroReplySerial => write!(f, "reply serial is zero"),
            Self::MissingField { what } => {
                write!(f, "required header field missing: {what}")
            }
            Self::BodySignatureMismatch => {
                write!(f, "body size and signature disagree about emptiness")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Header(err) => Some(err),
            _ => None,
        }
    }
}

impl From<HeaderError> for Error {
    fn from(err: HeaderError) -> Self {
        Self::Header(err)
    }
}

impl From<Malformed> for Error {
    fn from(err: Malformed) -> Self {
        Self::Malformed(err)
    }
}
