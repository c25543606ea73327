//! D-Bus type system: the basic-type table, the signature grammar, and the
//! name validators used when parsing message headers.
//!
//! This crate knows nothing about messages or buffers, only about type
//! codes and the strings that describe them.
//!
//! # Design Principles
//!
//! - **Pure predicates** - Validation never allocates and never panics.
//! - **Bounded recursion** - Array and struct nesting are each capped at 32,
//!   signatures at 255 bytes, so walking untrusted signatures is safe.

mod error;
mod grammar;
mod names;
mod types;

pub use error::{SignatureError, SignatureResult};
pub use grammar::{
    signature_element_length, signature_is_pair, signature_is_single, signature_is_valid,
    SIGNATURE_MAX_LENGTH,
};
pub use names::{
    error_name_is_valid, interface_name_is_valid, member_name_is_valid, object_path_is_valid,
    service_name_is_valid, NAME_MAX_LENGTH,
};
pub use types::{
    alignment_of, Type, DICT_ENTRY_BEGIN, DICT_ENTRY_END, STRUCT_BEGIN, STRUCT_END,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_api_exports() {
        // Verify all expected items are exported
        let _ = Type::Byte;
        let _ = STRUCT_BEGIN;
        let _ = DICT_ENTRY_END;
        let _ = SIGNATURE_MAX_LENGTH;
        let _ = NAME_MAX_LENGTH;

        let _: SignatureResult<()> = Ok(());
    }

    #[test]
    fn grammar_and_types_integration() {
        // A dict array is a single complete type whose element is a pair.
        assert!(signature_is_single("a{sv}"));
        assert!(signature_is_pair("sv"));
        assert_eq!(alignment_of(b'{'), Some(8));
    }
}
