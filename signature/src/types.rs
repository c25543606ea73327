//! The D-Bus type table: codes, alignments, and wire sizes.

/// Opening bracket of a struct in a signature.
pub const STRUCT_BEGIN: u8 = b'(';
/// Closing bracket of a struct in a signature.
pub const STRUCT_END: u8 = b')';
/// Opening bracket of a dict entry in a signature.
pub const DICT_ENTRY_BEGIN: u8 = b'{';
/// Closing bracket of a dict entry in a signature.
pub const DICT_ENTRY_END: u8 = b'}';

/// A D-Bus type.
///
/// Basic types have a fixed alignment and, except for the three
/// string-like types, a fixed wire size. Container types carry further
/// typed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Byte,
    Boolean,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Double,
    String,
    ObjectPath,
    Signature,
    UnixFd,
    Array,
    Variant,
    Struct,
    DictEntry,
}

impl Type {
    /// Parses a type from its signature code.
    ///
    /// Struct and dict entry use their canonical codes `r` and `e`; the
    /// bracket forms that appear inside signatures are not type codes.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            b'y' => Self::Byte,
            b'b' => Self::Boolean,
            b'n' => Self::Int16,
            b'q' => Self::Uint16,
            b'i' => Self::Int32,
            b'u' => Self::Uint32,
            b'x' => Self::Int64,
            b't' => Self::Uint64,
            b'd' => Self::Double,
            b's' => Self::String,
            b'o' => Self::ObjectPath,
            b'g' => Self::Signature,
            b'h' => Self::UnixFd,
            b'a' => Self::Array,
            b'v' => Self::Variant,
            b'r' => Self::Struct,
            b'e' => Self::DictEntry,
            _ => return None,
        })
    }

    /// Returns the signature code for this type.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Byte => b'y',
            Self::Boolean => b'b',
            Self::Int16 => b'n',
            Self::Uint16 => b'q',
            Self::Int32 => b'i',
            Self::Uint32 => b'u',
            Self::Int64 => b'x',
            Self::Uint64 => b't',
            Self::Double => b'd',
            Self::String => b's',
            Self::ObjectPath => b'o',
            Self::Signature => b'g',
            Self::UnixFd => b'h',
            Self::Array => b'a',
            Self::Variant => b'v',
            Self::Struct => b'r',
            Self::DictEntry => b'e',
        }
    }

    /// Returns `true` for the basic (non-container) types.
    #[must_use]
    pub const fn is_basic(self) -> bool {
        !self.is_container()
    }

    /// Returns `true` for the four container types.
    #[must_use]
    pub const fn is_container(self) -> bool {
        matches!(
            self,
            Self::Array | Self::Variant | Self::Struct | Self::DictEntry
        )
    }

    /// Natural alignment of a value of this type, in bytes.
    #[must_use]
    pub const fn alignment(self) -> usize {
        match self {
            Self::Byte | Self::Signature | Self::Variant => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Boolean
            | Self::Int32
            | Self::Uint32
            | Self::UnixFd
            | Self::String
            | Self::ObjectPath
            | Self::Array => 4,
            Self::Int64 | Self::Uint64 | Self::Double | Self::Struct | Self::DictEntry => 8,
        }
    }

    /// Wire size for fixed-width basic types, `None` for string-like and
    /// container types.
    #[must_use]
    pub const fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Byte => Some(1),
            Self::Int16 | Self::Uint16 => Some(2),
            Self::Boolean | Self::Int32 | Self::Uint32 | Self::UnixFd => Some(4),
            Self::Int64 | Self::Uint64 | Self::Double => Some(8),
            Self::String
            | Self::ObjectPath
            | Self::Signature
            | Self::Array
            | Self::Variant
            | Self::Struct
            | Self::DictEntry => None,
        }
    }
}

/// Alignment of the value described by the first byte of a signature.
///
/// Unlike [`Type::alignment`] this accepts the bracket forms that actually
/// occur inside signatures (`(` and `{`, both 8-byte aligned).
#[must_use]
pub const fn alignment_of(code: u8) -> Option<usize> {
    if code == STRUCT_BEGIN || code == DICT_ENTRY_BEGIN {
        return Some(8);
    }
    match Type::from_code(code) {
        Some(t) => Some(t.alignment()),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_roundtrip_all_types() {
        for code in [
            b'y', b'b', b'n', b'q', b'i', b'u', b'x', b't', b'd', b's', b'o', b'g', b'h', b'a',
            b'v', b'r', b'e',
        ] {
            let t = Type::from_code(code).unwrap();
            assert_eq!(t.code(), code);
        }
    }

    #[test]
    fn unknown_code_rejected() {
        assert_eq!(Type::from_code(b'z'), None);
        assert_eq!(Type::from_code(0), None);
        assert_eq!(Type::from_code(b'('), None);
        assert_eq!(Type::from_code(b'{'), None);
    }

    #[test]
    fn basic_and_container_partition() {
        assert!(Type::Byte.is_basic());
        assert!(Type::String.is_basic());
        assert!(Type::UnixFd.is_basic());
        assert!(Type::Array.is_container());
        assert!(Type::Variant.is_container());
        assert!(Type::Struct.is_container());
        assert!(Type::DictEntry.is_container());
        assert!(!Type::Array.is_basic());
    }

    #[test]
    fn alignment_table() {
        assert_eq!(Type::Byte.alignment(), 1);
        assert_eq!(Type::Boolean.alignment(), 4);
        assert_eq!(Type::Int16.alignment(), 2);
        assert_eq!(Type::Uint16.alignment(), 2);
        assert_eq!(Type::Int32.alignment(), 4);
        assert_eq!(Type::Uint32.alignment(), 4);
        assert_eq!(Type::Int64.alignment(), 8);
        assert_eq!(Type::Uint64.alignment(), 8);
        assert_eq!(Type::Double.alignment(), 8);
        assert_eq!(Type::String.alignment(), 4);
        assert_eq!(Type::ObjectPath.alignment(), 4);
        assert_eq!(Type::Signature.alignment(), 1);
        assert_eq!(Type::UnixFd.alignment(), 4);
        assert_eq!(Type::Array.alignment(), 4);
        assert_eq!(Type::Variant.alignment(), 1);
        assert_eq!(Type::Struct.alignment(), 8);
        assert_eq!(Type::DictEntry.alignment(), 8);
    }

    #[test]
    fn fixed_size_table() {
        assert_eq!(Type::Byte.fixed_size(), Some(1));
        assert_eq!(Type::Boolean.fixed_size(), Some(4));
        assert_eq!(Type::Int16.fixed_size(), Some(2));
        assert_eq!(Type::Uint64.fixed_size(), Some(8));
        assert_eq!(Type::Double.fixed_size(), Some(8));
        assert_eq!(Type::UnixFd.fixed_size(), Some(4));
        assert_eq!(Type::String.fixed_size(), None);
        assert_eq!(Type::Signature.fixed_size(), None);
        assert_eq!(Type::Array.fixed_size(), None);
    }

    #[test]
    fn alignment_of_bracket_forms() {
        assert_eq!(alignment_of(b'('), Some(8));
        assert_eq!(alignment_of(b'{'), Some(8));
        assert_eq!(alignment_of(b'a'), Some(4));
        assert_eq!(alignment_of(b'v'), Some(1));
        assert_eq!(alignment_of(b'y'), Some(1));
        assert_eq!(alignment_of(b'?'), None);
    }

    #[test]
    fn type_is_copy_and_hashable() {
        use std::collections::HashSet;
        let t = Type::Uint32;
        let copied = t; // Copy
        assert_eq!(t, copied);

        let mut set = HashSet::new();
        set.insert(Type::Uint32);
        set.insert(Type::String);
        assert!(set.contains(&Type::Uint32));
    }
}
