//! The parse pipeline: type-directed cursor operations over the body.

use signature::{
    alignment_of, object_path_is_valid, signature_element_length, signature_is_pair,
    signature_is_single, signature_is_valid, Type, DICT_ENTRY_BEGIN, DICT_ENTRY_END,
    STRUCT_BEGIN, STRUCT_END,
};
use wire::{align_to, ARRAY_MAX_BYTES, CONTAINER_DEPTH_MAX};

use crate::container::{Container, ContainerKind};
use crate::error::{Error, Malformed, MessageResult};
use crate::message::Message;
use crate::value::Value;

/// What the read cursor is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peek<'a> {
    /// End of the current container's contents (`container` is `None` at
    /// the end of the whole body).
    End { container: Option<Type> },
    /// A basic value of the given type.
    Basic(Type),
    /// A container; `contents` borrows from the message and is
    /// invalidated by the next `peek_type` call.
    Container { kind: Type, contents: &'a str },
}

/// Advances `rindex` over `align`-padding plus `nbytes`, verifying the
/// padding is all-zero and the read stays inside `data`. Returns the
/// aligned start offset.
pub(crate) fn buffer_peek(
    data: &[u8],
    rindex: &mut usize,
    align: usize,
    nbytes: usize,
) -> MessageResult<usize> {
    let start = align_to(*rindex, align);
    let end = start
        .checked_add(nbytes)
        .ok_or(Error::Malformed(Malformed::OutOfBounds {
            needed: usize::MAX,
            available: data.len(),
        }))?;
    if end > data.len() {
        return Err(Malformed::OutOfBounds {
            needed: end,
            available: data.len(),
        }
        .into());
    }

    for (i, &byte) in data[*rindex..start].iter().enumerate() {
        if byte != 0 {
            return Err(Malformed::NonZeroPadding {
                offset: *rindex + i,
            }
            .into());
        }
    }

    *rindex = end;
    Ok(start)
}

/// Validates a NUL-terminated string slice (terminator included in
/// `bytes`): terminated, with no embedded NUL.
pub(crate) fn validate_nul(bytes: &[u8]) -> MessageResult<()> {
    let Some((&last, inner)) = bytes.split_last() else {
        return Err(Malformed::BadStringFraming.into());
    };
    if last != 0 || inner.contains(&0) {
        return Err(Malformed::BadStringFraming.into());
    }
    Ok(())
}

impl Message {
    fn require_sealed_for_read(&self) -> MessageResult<()> {
        if self.sealed {
            Ok(())
        } else {
            Err(Error::PermissionDenied {
                operation: "read from an unsealed message",
            })
        }
    }

    /// Whether `index` sits at or past the end of the current array.
    fn end_of_array(&self, index: usize) -> bool {
        let c = self.current();
        let Some(size_offset) = c.array_size else {
            return false;
        };
        let length = self.body_u32_at(size_offset) as usize;
        index >= c.begin + length
    }

    /// `buffer_peek` over the body that also reports the end of the
    /// current array as `None`.
    fn peek_body(
        &self,
        rindex: &mut usize,
        align: usize,
        nbytes: usize,
    ) -> MessageResult<Option<usize>> {
        if self.end_of_array(*rindex) {
            return Ok(None);
        }
        buffer_peek(self.storage.body(), rindex, align, nbytes).map(Some)
    }

    /// Reads a string-like value and returns the byte range of its
    /// contents in the body. Assumes the signature position was already
    /// checked.
    pub(crate) fn read_string_like_range(
        &mut self,
        ty: Type,
    ) -> MessageResult<Option<(usize, usize)>> {
        let mut ri = self.rindex;
        let (offset, len) = match ty {
            Type::String | Type::ObjectPath => {
                let Some(len_off) = self.peek_body(&mut ri, 4, 4)? else {
                    return Ok(None);
                };
                let len = self.body_u32_at(len_off) as usize;
                let Some(offset) = self.peek_body(&mut ri, 1, len + 1)? else {
                    return Err(Malformed::Truncated.into());
                };
                (offset, len)
            }
            Type::Signature => {
                let Some(len_off) = self.peek_body(&mut ri, 1, 1)? else {
                    return Ok(None);
                };
                let len = self.storage.body()[len_off] as usize;
                let Some(offset) = self.peek_body(&mut ri, 1, len + 1)? else {
                    return Err(Malformed::Truncated.into());
                };
                (offset, len)
            }
            _ => {
                return Err(Error::InvalidArgument {
                    what: "not a string-like type",
                })
            }
        };

        let bytes = &self.storage.body()[offset..offset + len + 1];
        validate_nul(bytes)?;
        let s = std::str::from_utf8(&bytes[..len])
            .map_err(|_| Error::from(Malformed::InvalidUtf8))?;
        match ty {
            Type::ObjectPath if !object_path_is_valid(s) => {
                return Err(Malformed::InvalidObjectPath.into())
            }
            Type::Signature if !signature_is_valid(s, true) => {
                return Err(Malformed::InvalidSignature.into())
            }
            _ => {}
        }

        self.rindex = ri;
        if !self.current().in_array() {
            self.current_mut().index += 1;
        }
        Ok(Some((offset, len)))
    }

    /// Reads one basic value at the cursor.
    ///
    /// Returns `Ok(None)` when the current container's contents are
    /// exhausted. String-like values borrow from the message body.
    ///
    /// # Errors
    ///
    /// Fails on unsealed messages, when the signature position holds a
    /// different type, and on any body validation failure.
    pub fn read_basic(&mut self, ty: Type) -> MessageResult<Option<Value<'_>>> {
        self.require_sealed_for_read()?;
        if !ty.is_basic() {
            return Err(Error::InvalidArgument {
                what: "read_basic requires a basic type",
            });
        }

        let Some(code) = self.current().current_code() else {
            return Ok(None);
        };
        if code != ty.code() {
            return Err(Error::TypeMismatch {
                expected: code,
                requested: ty.code(),
            });
        }

        match ty {
            Type::String | Type::ObjectPath | Type::Signature => {
                let Some((offset, len)) = self.read_string_like_range(ty)? else {
                    return Ok(None);
                };
                let bytes = &self.storage.body()[offset..offset + len];
                let s = std::str::from_utf8(bytes)
                    .map_err(|_| Error::from(Malformed::InvalidUtf8))?;
                Ok(Some(match ty {
                    Type::String => Value::Str(s),
                    Type::ObjectPath => Value::ObjectPath(s),
                    _ => Value::Signature(s),
                }))
            }
            _ => {
                let align = ty.alignment();
                let size = ty.fixed_size().ok_or(Error::InvalidArgument {
                    what: "type has no fixed size",
                })?;
                let mut ri = self.rindex;
                let Some(offset) = self.peek_body(&mut ri, align, size)? else {
                    return Ok(None);
                };

                let endian = self.header.endian;
                let body = self.storage.body();
                let value = match ty {
                    Type::Byte => Value::Byte(body[offset]),
                    Type::Boolean => Value::Boolean(
                        endian.read_u32(body[offset..offset + 4].try_into().unwrap()) != 0,
                    ),
                    Type::Int16 => Value::Int16(
                        endian.read_u16(body[offset..offset + 2].try_into().unwrap()) as i16,
                    ),
                    Type::Uint16 => Value::Uint16(
                        endian.read_u16(body[offset..offset + 2].try_into().unwrap()),
                    ),
                    Type::Int32 => Value::Int32(
                        endian.read_u32(body[offset..offset + 4].try_into().unwrap()) as i32,
                    ),
                    Type::Uint32 => Value::Uint32(
                        endian.read_u32(body[offset..offset + 4].try_into().unwrap()),
                    ),
                    Type::UnixFd => Value::UnixFd(
                        endian.read_u32(body[offset..offset + 4].try_into().unwrap()),
                    ),
                    Type::Int64 => Value::Int64(
                        endian.read_u64(body[offset..offset + 8].try_into().unwrap()) as i64,
                    ),
                    Type::Uint64 => Value::Uint64(
                        endian.read_u64(body[offset..offset + 8].try_into().unwrap()),
                    ),
                    Type::Double => Value::Double(f64::from_bits(
                        endian.read_u64(body[offset..offset + 8].try_into().unwrap()),
                    )),
                    _ => {
                        return Err(Error::InvalidArgument {
                            what: "not a fixed-size basic type",
                        })
                    }
                };

                self.rindex = ri;
                if !self.current().in_array() {
                    self.current_mut().index += 1;
                }
                Ok(Some(value))
            }
        }
    }

    /// Enters a container at the cursor.
    ///
    /// Returns `Ok(false)` when the current contents are exhausted (there
    /// is nothing to enter).
    ///
    /// # Errors
    ///
    /// Fails on type mismatch, on the depth bound, and on malformed
    /// framing (array over the cap, bad variant signature).
    pub fn enter_container(&mut self, kind: Type, contents: &str) -> MessageResult<bool> {
        self.require_sealed_for_read()?;
        if self.containers.len() >= CONTAINER_DEPTH_MAX {
            return Err(Malformed::DepthExceeded {
                depth: self.containers.len() + 1,
            }
            .into());
        }
        let Some(container_kind) = ContainerKind::from_type(kind) else {
            return Err(Error::InvalidArgument {
                what: "not a container type",
            });
        };
        if self.current().current_code().is_none() {
            return Ok(false);
        }

        let array_size = match container_kind {
            ContainerKind::Array => match self.enter_array(contents)? {
                Some(size_offset) => Some(size_offset),
                None => return Ok(false),
            },
            ContainerKind::Variant => {
                if !self.enter_variant(contents)? {
                    return Ok(false);
                }
                None
            }
            ContainerKind::Struct => {
                if !self.enter_struct(contents)? {
                    return Ok(false);
                }
                None
            }
            ContainerKind::DictEntry => {
                if !self.enter_dict_entry(contents)? {
                    return Ok(false);
                }
                None
            }
        };

        self.containers.push(Container {
            kind: Some(container_kind),
            signature: contents.to_owned(),
            index: 0,
            array_size,
            begin: self.rindex,
        });
        Ok(true)
    }

    fn enter_array(&mut self, contents: &str) -> MessageResult<Option<usize>> {
        if !signature_is_single(contents) {
            return Err(Error::InvalidArgument {
                what: "array contents must be a single complete type",
            });
        }
        let element_alignment = alignment_of(contents.as_bytes()[0]).ok_or(
            Error::InvalidArgument {
                what: "unknown array element type",
            },
        )?;

        let c = self.current();
        let Some(code) = c.current_code() else {
            return Ok(None);
        };
        let start = c.index + 1;
        let bytes = c.signature.as_bytes();
        if code != b'a'
            || bytes.len() < start + contents.len()
            || &bytes[start..start + contents.len()] != contents.as_bytes()
        {
            return Err(Error::TypeMismatch {
                expected: code,
                requested: b'a',
            });
        }

        let mut ri = self.rindex;
        let Some(size_offset) = self.peek_body(&mut ri, 4, 4)? else {
            return Ok(None);
        };
        let size = self.body_u32_at(size_offset);
        if size > ARRAY_MAX_BYTES {
            return Err(Malformed::ArrayTooLarge { size }.into());
        }
        if self.peek_body(&mut ri, element_alignment, 0)?.is_none() {
            return Err(Malformed::Truncated.into());
        }

        let contents_len = contents.len();
        if !self.current().in_array() {
            self.current_mut().index += 1 + contents_len;
        }
        self.rindex = ri;
        Ok(Some(size_offset))
    }

    fn enter_variant(&mut self, contents: &str) -> MessageResult<bool> {
        if !signature_is_single(contents) {
            return Err(Error::InvalidArgument {
                what: "variant contents must be a single complete type",
            });
        }
        if contents.as_bytes().first() == Some(&DICT_ENTRY_BEGIN) {
            return Err(Error::InvalidArgument {
                what: "variants cannot hold bare dict entries",
            });
        }

        let Some(code) = self.current().current_code() else {
            return Ok(false);
        };
        if code != b'v' {
            return Err(Error::TypeMismatch {
                expected: code,
                requested: b'v',
            });
        }

        let mut ri = self.rindex;
        let Some(len_off) = self.peek_body(&mut ri, 1, 1)? else {
            return Ok(false);
        };
        let len = self.storage.body()[len_off] as usize;
        let Some(sig_off) = self.peek_body(&mut ri, 1, len + 1)? else {
            return Err(Malformed::Truncated.into());
        };

        let bytes = &self.storage.body()[sig_off..sig_off + len + 1];
        validate_nul(bytes)?;
        let s = std::str::from_utf8(&bytes[..len])
            .map_err(|_| Error::from(Malformed::InvalidUtf8))?;
        if !signature_is_valid(s, true) {
            return Err(Malformed::InvalidSignature.into());
        }
        if s != contents {
            return Err(Error::TypeMismatch {
                expected: s.as_bytes().first().copied().unwrap_or(0),
                requested: contents.as_bytes()[0],
            });
        }

        if !self.current().in_array() {
            self.current_mut().index += 1;
        }
        self.rindex = ri;
        Ok(true)
    }

    fn enter_struct(&mut self, contents: &str) -> MessageResult<bool> {
        if contents.is_empty() || !signature_is_valid(contents, false) {
            return Err(Error::InvalidArgument {
                what: "struct contents must be a nonempty signature",
            });
        }

        let c = self.current();
        let Some(code) = c.current_code() else {
            return Ok(false);
        };
        let start = c.index + 1;
        let bytes = c.signature.as_bytes();
        let matches = code == STRUCT_BEGIN
            && bytes.len() > start + contents.len()
            && &bytes[start..start + contents.len()] == contents.as_bytes()
            && bytes[start + contents.len()] == STRUCT_END;
        if !matches {
            return Err(Error::TypeMismatch {
                expected: code,
                requested: STRUCT_BEGIN,
            });
        }

        let mut ri = self.rindex;
        if self.peek_body(&mut ri, 8, 0)?.is_none() {
            return Ok(false);
        }

        let advance = 1 + contents.len() + 1;
        if !self.current().in_array() {
            self.current_mut().index += advance;
        }
        self.rindex = ri;
        Ok(true)
    }

    fn enter_dict_entry(&mut self, contents: &str) -> MessageResult<bool> {
        if !signature_is_pair(contents) {
            return Err(Error::InvalidArgument {
                what: "dict entry contents must be a basic key and one value",
            });
        }
        if !self.current().in_array() {
            return Err(Error::InvalidArgument {
                what: "dict entries only occur inside arrays",
            });
        }

        let c = self.current();
        let Some(code) = c.current_code() else {
            return Ok(false);
        };
        let start = c.index + 1;
        let bytes = c.signature.as_bytes();
        let matches = code == DICT_ENTRY_BEGIN
            && bytes.len() > start + contents.len()
            && &bytes[start..start + contents.len()] == contents.as_bytes()
            && bytes[start + contents.len()] == DICT_ENTRY_END;
        if !matches {
            return Err(Error::TypeMismatch {
                expected: code,
                requested: DICT_ENTRY_BEGIN,
            });
        }

        let mut ri = self.rindex;
        if self.peek_body(&mut ri, 8, 0)?.is_none() {
            return Ok(false);
        }

        let advance = 1 + contents.len() + 1;
        if !self.current().in_array() {
            self.current_mut().index += advance;
        }
        self.rindex = ri;
        Ok(true)
    }

    /// Leaves the innermost entered container.
    ///
    /// # Errors
    ///
    /// Fails when no container is entered, when an array was not consumed
    /// exactly to its announced length, or when a non-array container has
    /// unread contents.
    pub fn exit_container(&mut self) -> MessageResult<()> {
        self.require_sealed_for_read()?;
        if self.containers.is_empty() {
            return Err(Error::InvalidState {
                operation: "exit a container when none is entered",
            });
        }

        let c = self.containers.last().unwrap();
        if let Some(size_offset) = c.array_size {
            let length = self.body_u32_at(size_offset) as usize;
            if c.begin + length != self.rindex {
                return Err(Error::InvalidState {
                    operation: "exit an array before its end",
                });
            }
        } else if c.current_code().is_some() {
            return Err(Error::InvalidState {
                operation: "exit a container with unread contents",
            });
        }

        self.containers.pop();
        Ok(())
    }

    fn peek_end(&self) -> Peek<'static> {
        Peek::End {
            container: self.current().kind.map(ContainerKind::to_type),
        }
    }

    /// Inspects the type at the cursor without advancing it.
    ///
    /// For arrays, structs, and dict entries the returned contents string
    /// is backed by a cache in the message that the next call overwrites;
    /// for variants it views the signature bytes in the body. Either way
    /// it is invalidated by the next `peek_type`.
    pub fn peek_type(&mut self) -> MessageResult<Peek<'_>> {
        self.require_sealed_for_read()?;

        let Some(code) = self.current().current_code() else {
            return Ok(self.peek_end());
        };
        if self.end_of_array(self.rindex) {
            return Ok(self.peek_end());
        }

        if let Some(ty) = Type::from_code(code) {
            if ty.is_basic() {
                return Ok(Peek::Basic(ty));
            }
        }

        if code == b'a' {
            let c = self.current();
            let rest = &c.signature[c.index + 1..];
            let len = signature_element_length(rest)
                .map_err(|_| Error::from(Malformed::InvalidSignature))?;
            let contents = rest[..len].to_owned();
            self.peeked_signature = Some(contents);
            return Ok(Peek::Container {
                kind: Type::Array,
                contents: self.peeked_signature.as_deref().unwrap(),
            });
        }

        if code == STRUCT_BEGIN || code == DICT_ENTRY_BEGIN {
            let kind = if code == STRUCT_BEGIN {
                Type::Struct
            } else {
                Type::DictEntry
            };
            let c = self.current();
            let rest = &c.signature[c.index..];
            let len = signature_element_length(rest)
                .map_err(|_| Error::from(Malformed::InvalidSignature))?;
            let contents = rest[1..len - 1].to_owned();
            self.peeked_signature = Some(contents);
            return Ok(Peek::Container {
                kind,
                contents: self.peeked_signature.as_deref().unwrap(),
            });
        }

        if code == b'v' {
            let mut ri = self.rindex;
            let Some(len_off) = self.peek_body(&mut ri, 1, 1)? else {
                return Ok(self.peek_end());
            };
            let len = self.storage.body()[len_off] as usize;
            let Some(sig_off) = self.peek_body(&mut ri, 1, len + 1)? else {
                return Err(Malformed::Truncated.into());
            };
            let bytes = &self.storage.body()[sig_off..sig_off + len + 1];
            validate_nul(bytes)?;
            let s = std::str::from_utf8(&bytes[..len])
                .map_err(|_| Error::from(Malformed::InvalidUtf8))?;
            if !signature_is_valid(s, true) {
                return Err(Malformed::InvalidSignature.into());
            }
            return Ok(Peek::Container {
                kind: Type::Variant,
                contents: s,
            });
        }

        Err(Malformed::InvalidSignature.into())
    }

    /// Resets the read cursor.
    ///
    /// With `complete` the whole message rewinds to its first argument;
    /// otherwise only the current container rewinds to its beginning.
    /// Returns whether there is anything to read.
    pub fn rewind(&mut self, complete: bool) -> MessageResult<bool> {
        self.require_sealed_for_read()?;

        if complete {
            self.containers.clear();
            self.rindex = 0;
            self.root.index = 0;
        } else {
            let begin = self.current().begin;
            self.current_mut().index = 0;
            self.rindex = begin;
        }
        Ok(!self.current().signature.is_empty())
    }

    /// Walks past the values matching `types` without materializing them.
    pub fn skip(&mut self, types: &str) -> MessageResult<()> {
        self.require_sealed_for_read()?;
        self.skip_internal(types)
    }

    fn skip_internal(&mut self, types: &str) -> MessageResult<()> {
        let bytes = types.as_bytes();
        let mut pos = 0;
        while pos < bytes.len() {
            let code = bytes[pos];
            match code {
                b'a' => {
                    let element_len = signature_element_length(&types[pos + 1..]).map_err(|_| {
                        Error::InvalidArgument {
                            what: "array element type is ill-formed",
                        }
                    })?;
                    let contents = &types[pos + 1..pos + 1 + element_len];
                    if !self.enter_container(Type::Array, contents)? {
                        return Err(Error::TypeMismatch {
                            expected: 0,
                            requested: code,
                        });
                    }
                    loop {
                        if let Peek::End { .. } = self.peek_type()? {
                            break;
                        }
                        self.skip_internal(contents)?;
                    }
                    self.exit_container()?;
                    pos += 1 + element_len;
                }
                b'v' => {
                    let contents = match self.peek_type()? {
                        Peek::Container {
                            kind: Type::Variant,
                            contents,
                        } => contents.to_owned(),
                        _ => {
                            return Err(Error::TypeMismatch {
                                expected: 0,
                                requested: code,
                            })
                        }
                    };
                    if !self.enter_container(Type::Variant, &contents)? {
                        return Err(Error::TypeMismatch {
                            expected: 0,
                            requested: code,
                        });
                    }
                    self.skip_internal(&contents)?;
                    self.exit_container()?;
                    pos += 1;
                }
                b'(' | b'{' => {
                    let element_len = signature_element_length(&types[pos..]).map_err(|_| {
                        Error::InvalidArgument {
                            what: "container type is ill-formed",
                        }
                    })?;
                    let inner = &types[pos + 1..pos + element_len - 1];
                    let kind = if code == b'(' {
                        Type::Struct
                    } else {
                        Type::DictEntry
                    };
                    if !self.enter_container(kind, inner)? {
                        return Err(Error::TypeMismatch {
                            expected: 0,
                            requested: code,
                        });
                    }
                    self.skip_internal(inner)?;
                    self.exit_container()?;
                    pos += element_len;
                }
                _ => {
                    let Some(ty) = Type::from_code(code).filter(|t| t.is_basic()) else {
                        return Err(Error::InvalidArgument {
                            what: "unknown type code in type string",
                        });
                    };
                    if self.read_basic(ty)?.is_none() {
                        return Err(Error::TypeMismatch {
                            expected: 0,
                            requested: code,
                        });
                    }
                    pos += 1;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sealed_roundtrip(build: impl FnOnce(&mut Message)) -> Message {
        let mut m = Message::new_signal("/foo", "com.example", "Bar").unwrap();
        build(&mut m);
        m.seal(1).unwrap();
        Message::from_buffer(m.to_blob().unwrap(), None, None).unwrap()
    }

    #[test]
    fn read_before_seal_is_refused() {
        let mut m = Message::new_signal("/foo", "com.example", "Bar").unwrap();
        let err = m.read_basic(Type::Uint32).unwrap_err();
        assert!(matches!(err, Error::PermissionDenied { .. }));
        assert!(m.peek_type().is_err());
        assert!(m.rewind(true).is_err());
    }

    #[test]
    fn read_basic_values_roundtrip() {
        let mut m = sealed_roundtrip(|m| {
            m.append_basic(Value::Byte(0xAB)).unwrap();
            m.append_basic(Value::Boolean(true)).unwrap();
            m.append_basic(Value::Int16(-7)).unwrap();
            m.append_basic(Value::Uint64(1 << 40)).unwrap();
            m.append_basic(Value::Double(2.5)).unwrap();
            m.append_basic(Value::Str("hello")).unwrap();
        });

        assert_eq!(m.read_basic(Type::Byte).unwrap(), Some(Value::Byte(0xAB)));
        assert_eq!(
            m.read_basic(Type::Boolean).unwrap(),
            Some(Value::Boolean(true))
        );
        assert_eq!(m.read_basic(Type::Int16).unwrap(), Some(Value::Int16(-7)));
        assert_eq!(
            m.read_basic(Type::Uint64).unwrap(),
            Some(Value::Uint64(1 << 40))
        );
        assert_eq!(
            m.read_basic(Type::Double).unwrap(),
            Some(Value::Double(2.5))
        );
        assert_eq!(
            m.read_basic(Type::String).unwrap(),
            Some(Value::Str("hello"))
        );
        // Contents exhausted.
        assert_eq!(m.read_basic(Type::Byte).unwrap(), None);
    }

    #[test]
    fn read_wrong_type_reports_mismatch() {
        let mut m = sealed_roundtrip(|m| {
            m.append_basic(Value::Uint32(1)).unwrap();
        });
        let err = m.read_basic(Type::String).unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch {
                expected: b'u',
                requested: b's'
            }
        ));
    }

    #[test]
    fn peek_then_enter_struct() {
        let mut m = sealed_roundtrip(|m| {
            m.open_container(Type::Struct, "yu").unwrap();
            m.append_basic(Value::Byte(1)).unwrap();
            m.append_basic(Value::Uint32(2)).unwrap();
            m.close_container().unwrap();
        });

        let contents = match m.peek_type().unwrap() {
            Peek::Container {
                kind: Type::Struct,
                contents,
            } => contents.to_owned(),
            other => panic!("expected struct, got {other:?}"),
        };
        assert_eq!(contents, "yu");
        assert!(m.enter_container(Type::Struct, &contents).unwrap());
        assert_eq!(m.read_basic(Type::Byte).unwrap(), Some(Value::Byte(1)));
        assert_eq!(m.read_basic(Type::Uint32).unwrap(), Some(Value::Uint32(2)));
        assert!(matches!(
            m.peek_type().unwrap(),
            Peek::End {
                container: Some(Type::Struct)
            }
        ));
        m.exit_container().unwrap();
        assert!(matches!(
            m.peek_type().unwrap(),
            Peek::End { container: None }
        ));
    }

    #[test]
    fn array_iteration_detects_end() {
        let mut m = sealed_roundtrip(|m| {
            m.open_container(Type::Array, "u").unwrap();
            for i in 0..3 {
                m.append_basic(Value::Uint32(i)).unwrap();
            }
            m.close_container().unwrap();
        });

        assert!(m.enter_container(Type::Array, "u").unwrap());
        for i in 0..3 {
            assert_eq!(
                m.read_basic(Type::Uint32).unwrap(),
                Some(Value::Uint32(i))
            );
        }
        assert_eq!(m.read_basic(Type::Uint32).unwrap(), None);
        assert!(matches!(
            m.peek_type().unwrap(),
            Peek::End {
                container: Some(Type::Array)
            }
        ));
        m.exit_container().unwrap();
    }

    #[test]
    fn exit_array_early_is_refused() {
        let mut m = sealed_roundtrip(|m| {
            m.open_container(Type::Array, "u").unwrap();
            m.append_basic(Value::Uint32(1)).unwrap();
            m.append_basic(Value::Uint32(2)).unwrap();
            m.close_container().unwrap();
        });

        assert!(m.enter_container(Type::Array, "u").unwrap());
        m.read_basic(Type::Uint32).unwrap();
        let err = m.exit_container().unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
    }

    #[test]
    fn empty_array_enters_at_end() {
        let mut m = sealed_roundtrip(|m| {
            m.open_container(Type::Array, "s").unwrap();
            m.close_container().unwrap();
        });

        assert!(m.enter_container(Type::Array, "s").unwrap());
        assert_eq!(m.read_basic(Type::String).unwrap(), None);
        m.exit_container().unwrap();
    }

    #[test]
    fn rewind_complete_restarts_traversal() {
        let mut m = sealed_roundtrip(|m| {
            m.append_basic(Value::Uint32(7)).unwrap();
            m.append_basic(Value::Str("x")).unwrap();
        });

        assert_eq!(m.read_basic(Type::Uint32).unwrap(), Some(Value::Uint32(7)));
        assert!(m.rewind(true).unwrap());
        assert_eq!(m.read_basic(Type::Uint32).unwrap(), Some(Value::Uint32(7)));
        assert_eq!(m.read_basic(Type::String).unwrap(), Some(Value::Str("x")));
    }

    #[test]
    fn rewind_reports_empty_body() {
        let mut call = Message::new_method_call(None, "/", None, "Hello").unwrap();
        call.seal(1).unwrap();
        let mut m = Message::from_buffer(call.to_blob().unwrap(), None, None).unwrap();
        assert!(!m.rewind(true).unwrap());
    }

    #[test]
    fn skip_walks_compound_values() {
        let mut m = sealed_roundtrip(|m| {
            m.append(
                "ua{sv}s",
                &[
                    Value::Uint32(7),
                    Value::Uint32(1),
                    Value::Str("k"),
                    Value::Signature("y"),
                    Value::Byte(9),
                    Value::Str("tail"),
                ],
            )
            .unwrap();
        });

        m.skip("ua{sv}").unwrap();
        assert_eq!(
            m.read_basic(Type::String).unwrap(),
            Some(Value::Str("tail"))
        );
    }

    #[test]
    fn enter_variant_checks_contents() {
        let mut m = sealed_roundtrip(|m| {
            m.open_container(Type::Variant, "u").unwrap();
            m.append_basic(Value::Uint32(1)).unwrap();
            m.close_container().unwrap();
        });

        let err = m.enter_container(Type::Variant, "s").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        assert!(m.enter_container(Type::Variant, "u").unwrap());
    }

    #[test]
    fn peek_variant_reads_embedded_signature() {
        let mut m = sealed_roundtrip(|m| {
            m.open_container(Type::Variant, "au").unwrap();
            m.open_container(Type::Array, "u").unwrap();
            m.close_container().unwrap();
            m.close_container().unwrap();
        });

        match m.peek_type().unwrap() {
            Peek::Container {
                kind: Type::Variant,
                contents,
            } => assert_eq!(contents, "au"),
            other => panic!("expected variant, got {other:?}"),
        }
    }
}
