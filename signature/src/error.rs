//! Error types for signature operations.

use std::fmt;

/// Result type for signature operations.
pub type SignatureResult<T> = Result<T, SignatureError>;

/// Errors that can occur while walking a type signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// The signature is not a well-formed sequence of complete types.
    Invalid,

    /// Array or struct nesting exceeds the grammar bound.
    NestingTooDeep {
        /// The depth that was reached.
        depth: u32,
    },
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => write!(f, "ill-formed type signature"),
            Self::NestingTooDeep { depth } => {
                write!(f, "signature nesting too deep: {depth} levels")
            }
        }
    }
}

impl std::error::Error for SignatureError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_invalid() {
        let err = SignatureError::Invalid;
        assert!(err.to_string().contains("ill-formed"));
    }

    #[test]
    fn error_display_nesting() {
        let err = SignatureError::NestingTooDeep { depth: 33 };
        assert!(err.to_string().contains("33"));
    }

    #[test]
    fn error_equality() {
        assert_eq!(SignatureError::Invalid, SignatureError::Invalid);
        assert_ne!(
            SignatureError::NestingTooDeep { depth: 33 },
            SignatureError::NestingTooDeep { depth: 34 }
        );
    }

    #[test]
    fn error_is_std_error() {
        fn assert_error<E: std::error::Error>() {}
        assert_error::<SignatureError>();
    }
}
