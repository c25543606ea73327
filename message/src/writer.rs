//! The build pipeline: typed appends and container opening/closing.

use signature::{
    alignment_of, signature_element_length, signature_is_pair, signature_is_single,
    signature_is_valid, Type, SIGNATURE_MAX_LENGTH,
};
use wire::CONTAINER_DEPTH_MAX;

use crate::container::{Container, ContainerKind};
use crate::error::{Error, MessageResult};
use crate::message::{FieldSlice, Message, Storage};
use crate::value::Value;

impl Message {
    /// Grows the body region and credits every open array's length slot
    /// with the appended delta (padding included).
    pub(crate) fn extend_body(&mut self, align: usize, n: usize) -> MessageResult<usize> {
        let endian = self.header.endian;
        let containers = &self.containers;
        let Storage::Built { body, .. } = &mut self.storage else {
            return Err(Error::InvalidState {
                operation: "grow the body of a received message",
            });
        };

        let before = body.len();
        let start = body.extend(align, n)?;
        let added = (body.len() - before) as u32;

        if added > 0 {
            for container in containers {
                if let Some(size_offset) = container.array_size {
                    let bytes = body.as_slice()[size_offset..size_offset + 4]
                        .try_into()
                        .unwrap();
                    let current = endian.read_u32(bytes);
                    body.write_at(size_offset, &endian.write_u32(current + added));
                }
            }
        }

        self.header.body_size = self.storage.body().len() as u32;
        Ok(start)
    }

    pub(crate) fn write_body_at(&mut self, offset: usize, bytes: &[u8]) {
        if let Storage::Built { body, .. } = &mut self.storage {
            body.write_at(offset, bytes);
        }
    }

    fn body_len(&self) -> usize {
        self.storage.body().len()
    }

    fn truncate_body(&mut self, len: usize) {
        if let Storage::Built { body, .. } = &mut self.storage {
            body.truncate(len);
        }
        self.header.body_size = len as u32;
    }

    /// Checks the current signature slot against `code`, extending the
    /// root signature when writing at the outermost position.
    ///
    /// Returns `true` if the signature was extended (and must be truncated
    /// back should the write fail).
    fn claim_signature_slot(&mut self, code: u8) -> MessageResult<bool> {
        let c = self.current_mut();
        match c.current_code() {
            Some(existing) if existing == code => Ok(false),
            Some(existing) => Err(Error::TypeMismatch {
                expected: existing,
                requested: code,
            }),
            None => {
                if c.kind.is_some() {
                    return Err(Error::TypeMismatch {
                        expected: 0,
                        requested: code,
                    });
                }
                c.signature.push(code as char);
                Ok(true)
            }
        }
    }

    /// Like [`claim_signature_slot`](Self::claim_signature_slot) for a
    /// container expression `open contents close?`. Returns whether the
    /// signature was extended and the cursor position past the expression.
    fn claim_container_slot(
        &mut self,
        open: u8,
        contents: &str,
        close: Option<u8>,
        allow_extend: bool,
    ) -> MessageResult<(bool, usize)> {
        let c = self.current_mut();
        match c.current_code() {
            Some(code) => {
                if code != open {
                    return Err(Error::TypeMismatch {
                        expected: code,
                        requested: open,
                    });
                }
                let bytes = c.signature.as_bytes();
                let start = c.index + 1;
                let contents_match = bytes.len() >= start + contents.len()
                    && &bytes[start..start + contents.len()] == contents.as_bytes()
                    && close
                        .is_none_or(|cl| bytes.get(start + contents.len()) == Some(&cl));
                if !contents_match {
                    return Err(Error::TypeMismatch {
                        expected: code,
                        requested: open,
                    });
                }
                let nindex = start + contents.len() + usize::from(close.is_some());
                Ok((false, nindex))
            }
            None => {
                if !allow_extend || c.kind.is_some() {
                    return Err(Error::TypeMismatch {
                        expected: 0,
                        requested: open,
                    });
                }
                c.signature.push(open as char);
                c.signature.push_str(contents);
                if let Some(cl) = close {
                    c.signature.push(cl as char);
                }
                Ok((true, c.signature.len()))
            }
        }
    }

    /// Truncates a tentatively extended signature back to the cursor.
    fn unclaim_signature(&mut self, extended: bool) {
        if extended {
            let c = self.current_mut();
            let index = c.index;
            c.signature.truncate(index);
        }
    }

    fn advance_index(&mut self, nindex: usize) {
        if !self.current().in_array() {
            self.current_mut().index = nindex;
        }
    }

    /// Appends one basic value.
    ///
    /// # Errors
    ///
    /// Fails on sealed messages, on a type that disagrees with the current
    /// signature position, and on growth failure; a tentatively extended
    /// signature is truncated back on failure.
    pub fn append_basic(&mut self, value: Value<'_>) -> MessageResult<()> {
        self.append_basic_stored(value).map(|_| ())
    }

    /// `append_basic` that also reports where a string-like value landed.
    pub(crate) fn append_basic_stored(
        &mut self,
        value: Value<'_>,
    ) -> MessageResult<Option<FieldSlice>> {
        if self.sealed {
            return Err(Error::PermissionDenied {
                operation: "append to a sealed message",
            });
        }

        let extended = self.claim_signature_slot(value.kind().code())?;
        match self.write_basic_body(&value) {
            Ok(stored) => {
                if !self.current().in_array() {
                    self.current_mut().index += 1;
                }
                Ok(stored)
            }
            Err(e) => {
                self.unclaim_signature(extended);
                Err(e)
            }
        }
    }

    fn write_basic_body(&mut self, value: &Value<'_>) -> MessageResult<Option<FieldSlice>> {
        let endian = self.header.endian;
        match *value {
            Value::Str(s) | Value::ObjectPath(s) => {
                let len = s.len();
                if len as u64 >= u64::from(u32::MAX) {
                    return Err(Error::InvalidArgument {
                        what: "string longer than the wire format allows",
                    });
                }
                let off = self.extend_body(4, 4 + len + 1)?;
                self.write_body_at(off, &endian.write_u32(len as u32));
                self.write_body_at(off + 4, s.as_bytes());
                // Trailing NUL is already zero-filled.
                Ok(Some(FieldSlice {
                    offset: off + 4,
                    len,
                }))
            }
            Value::Signature(s) => {
                let len = s.len();
                if len > SIGNATURE_MAX_LENGTH {
                    return Err(Error::InvalidArgument {
                        what: "signature longer than 255 bytes",
                    });
                }
                let off = self.extend_body(1, 1 + len + 1)?;
                self.write_body_at(off, &[len as u8]);
                self.write_body_at(off + 1, s.as_bytes());
                Ok(Some(FieldSlice {
                    offset: off + 1,
                    len,
                }))
            }
            Value::Byte(v) => {
                let off = self.extend_body(1, 1)?;
                self.write_body_at(off, &[v]);
                Ok(None)
            }
            Value::Boolean(v) => {
                let off = self.extend_body(4, 4)?;
                self.write_body_at(off, &endian.write_u32(u32::from(v)));
                Ok(None)
            }
            Value::Int16(v) => {
                let off = self.extend_body(2, 2)?;
                self.write_body_at(off, &endian.write_u16(v as u16));
                Ok(None)
            }
            Value::Uint16(v) => {
                let off = self.extend_body(2, 2)?;
                self.write_body_at(off, &endian.write_u16(v));
                Ok(None)
            }
            Value::Int32(v) => {
                let off = self.extend_body(4, 4)?;
                self.write_body_at(off, &endian.write_u32(v as u32));
                Ok(None)
            }
            Value::Uint32(v) | Value::UnixFd(v) => {
                let off = self.extend_body(4, 4)?;
                self.write_body_at(off, &endian.write_u32(v));
                Ok(None)
            }
            Value::Int64(v) => {
                let off = self.extend_body(8, 8)?;
                self.write_body_at(off, &endian.write_u64(v as u64));
                Ok(None)
            }
            Value::Uint64(v) => {
                let off = self.extend_body(8, 8)?;
                self.write_body_at(off, &endian.write_u64(v));
                Ok(None)
            }
            Value::Double(v) => {
                let off = self.extend_body(8, 8)?;
                self.write_body_at(off, &endian.write_u64(v.to_bits()));
                Ok(None)
            }
        }
    }

    /// Opens a container of the given kind with the given contents
    /// signature.
    ///
    /// # Errors
    ///
    /// Fails on sealed messages, ill-formed contents, a position that
    /// disagrees with the current signature, or when the depth bound is
    /// reached.
    pub fn open_container(&mut self, kind: Type, contents: &str) -> MessageResult<()> {
        if self.sealed {
            return Err(Error::PermissionDenied {
                operation: "open a container in a sealed message",
            });
        }
        if self.containers.len() >= CONTAINER_DEPTH_MAX {
            return Err(Error::InvalidArgument {
                what: "container depth exceeded",
            });
        }
        let Some(container_kind) = ContainerKind::from_type(kind) else {
            return Err(Error::InvalidArgument {
                what: "not a container type",
            });
        };

        let array_size = match container_kind {
            ContainerKind::Array => Some(self.open_array(contents)?),
            ContainerKind::Variant => {
                self.open_variant(contents)?;
                None
            }
            ContainerKind::Struct => {
                self.open_struct(contents)?;
                None
            }
            ContainerKind::DictEntry => {
                self.open_dict_entry(contents)?;
                None
            }
        };

        self.containers.push(Container {
            kind: Some(container_kind),
            signature: contents.to_owned(),
            index: 0,
            array_size,
            begin: self.storage.body().len(),
        });
        Ok(())
    }

    /// Emits the length placeholder and element-alignment padding, returns
    /// the placeholder's body offset.
    fn open_array(&mut self, contents: &str) -> MessageResult<usize> {
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

        let (extended, nindex) = self.claim_container_slot(b'a', contents, None, true)?;

        let saved = self.body_len();
        let size_offset = match self.extend_body(4, 4) {
            Ok(off) => off,
            Err(e) => {
                self.unclaim_signature(extended);
                return Err(e);
            }
        };
        // The placeholder starts at zero; element-alignment padding is not
        // part of the array length.
        if let Err(e) = self.extend_body(element_alignment, 0) {
            self.unclaim_signature(extended);
            self.truncate_body(saved);
            return Err(e);
        }

        self.advance_index(nindex);
        Ok(size_offset)
    }

    fn open_variant(&mut self, contents: &str) -> MessageResult<()> {
        if !signature_is_single(contents) {
            return Err(Error::InvalidArgument {
                what: "variant contents must be a single complete type",
            });
        }
        if contents.as_bytes().first() == Some(&signature::DICT_ENTRY_BEGIN) {
            return Err(Error::InvalidArgument {
                what: "variants cannot hold bare dict entries",
            });
        }

        let (extended, nindex) = self.claim_container_slot(b'v', "", None, true)?;

        let len = contents.len();
        match self.extend_body(1, 1 + len + 1) {
            Ok(off) => {
                self.write_body_at(off, &[len as u8]);
                self.write_body_at(off + 1, contents.as_bytes());
                self.advance_index(nindex);
                Ok(())
            }
            Err(e) => {
                self.unclaim_signature(extended);
                Err(e)
            }
        }
    }

    fn open_struct(&mut self, contents: &str) -> MessageResult<()> {
        if contents.is_empty() || !signature_is_valid(contents, false) {
            return Err(Error::InvalidArgument {
                what: "struct contents must be a nonempty signature",
            });
        }

        let (extended, nindex) =
            self.claim_container_slot(signature::STRUCT_BEGIN, contents, Some(signature::STRUCT_END), true)?;

        // Contents are 8-byte aligned.
        match self.extend_body(8, 0) {
            Ok(_) => {
                self.advance_index(nindex);
                Ok(())
            }
            Err(e) => {
                self.unclaim_signature(extended);
                Err(e)
            }
        }
    }

    fn open_dict_entry(&mut self, contents: &str) -> MessageResult<()> {
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

        let (_, nindex) = self.claim_container_slot(
            signature::DICT_ENTRY_BEGIN,
            contents,
            Some(signature::DICT_ENTRY_END),
            false,
        )?;

        self.extend_body(8, 0)?;
        self.advance_index(nindex);
        Ok(())
    }

    /// Closes the innermost open container.
    ///
    /// # Errors
    ///
    /// Fails on sealed messages, when no container is open, and when a
    /// non-array container's contents are incomplete.
    pub fn close_container(&mut self) -> MessageResult<()> {
        if self.sealed {
            return Err(Error::PermissionDenied {
                operation: "close a container in a sealed message",
            });
        }
        if self.containers.is_empty() {
            return Err(Error::InvalidState {
                operation: "close a container when none is open",
            });
        }

        let c = self.containers.last().unwrap();
        if !c.in_array() && c.current_code().is_some() {
            return Err(Error::InvalidState {
                operation: "close a container with incomplete contents",
            });
        }

        self.containers.pop();
        Ok(())
    }

    /// Appends a whole argument list driven by a type string.
    ///
    /// Arguments are consumed left to right. An `a` consumes a `Uint32`
    /// element count followed by that many element groups; a `v` consumes
    /// a `Signature` naming the contents followed by the contents.
    pub fn append(&mut self, types: &str, args: &[Value<'_>]) -> MessageResult<()> {
        if self.sealed {
            return Err(Error::PermissionDenied {
                operation: "append to a sealed message",
            });
        }
        let mut iter = args.iter();
        self.append_from(types, &mut iter)?;
        if iter.next().is_some() {
            return Err(Error::InvalidArgument {
                what: "more arguments than the type string consumes",
            });
        }
        Ok(())
    }

    fn append_from<'v>(
        &mut self,
        types: &str,
        args: &mut std::slice::Iter<'_, Value<'v>>,
    ) -> MessageResult<()> {
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
                    let count = match args.next() {
                        Some(Value::Uint32(n)) => *n,
                        _ => {
                            return Err(Error::InvalidArgument {
                                what: "array element count must be a Uint32 argument",
                            })
                        }
                    };
                    self.open_container(Type::Array, contents)?;
                    for _ in 0..count {
                        self.append_from(contents, args)?;
                    }
                    self.close_container()?;
                    pos += 1 + element_len;
                }
                b'v' => {
                    let contents = match args.next() {
                        Some(Value::Signature(s)) => *s,
                        _ => {
                            return Err(Error::InvalidArgument {
                                what: "variant contents must be a Signature argument",
                            })
                        }
                    };
                    self.open_container(Type::Variant, contents)?;
                    self.append_from(contents, args)?;
                    self.close_container()?;
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
                    self.open_container(kind, inner)?;
                    self.append_from(inner, args)?;
                    self.close_container()?;
                    pos += element_len;
                }
                _ => {
                    let Some(ty) = Type::from_code(code).filter(|t| t.is_basic()) else {
                        return Err(Error::InvalidArgument {
                            what: "unknown type code in type string",
                        });
                    };
                    let value = *args.next().ok_or(Error::InvalidArgument {
                        what: "missing argument for type string",
                    })?;
                    if value.kind() != ty {
                        return Err(Error::TypeMismatch {
                            expected: code,
                            requested: value.kind().code(),
                        });
                    }
                    self.append_basic(value)?;
                    pos += 1;
                }
            }
        }
        Ok(())
    }
}
