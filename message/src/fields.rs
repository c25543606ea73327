//! Header fields: append helpers for the build path and the one-shot
//! parser that populates quick-access references on receipt.

use signature::{
    alignment_of, error_name_is_valid, interface_name_is_valid, member_name_is_valid,
    object_path_is_valid, service_name_is_valid, signature_element_length, signature_is_valid,
    Type, SIGNATURE_MAX_LENGTH,
};
use wire::{Endian, FieldCode, MessageType, ARRAY_MAX_BYTES};

use crate::error::{Error, Malformed, MessageResult};
use crate::message::{FieldSlice, Message, Storage};
use crate::reader::{buffer_peek, validate_nul};

impl Message {
    fn extend_fields(&mut self, align: usize, n: usize) -> MessageResult<usize> {
        let Storage::Built { fields, .. } = &mut self.storage else {
            return Err(Error::InvalidState {
                operation: "grow the fields of a received message",
            });
        };
        let start = fields.extend(align, n)?;
        self.header.fields_size = self.storage.fields().len() as u32;
        Ok(start)
    }

    fn write_fields_at(&mut self, offset: usize, bytes: &[u8]) {
        if let Storage::Built { fields, .. } = &mut self.storage {
            fields.write_at(offset, bytes);
        }
    }

    /// Appends a string-valued header field (`s` or `o`); returns where
    /// the string landed.
    pub(crate) fn append_field_string(
        &mut self,
        code: FieldCode,
        ty: Type,
        value: &str,
    ) -> MessageResult<FieldSlice> {
        let len = value.len();
        if len as u64 >= u64::from(u32::MAX) {
            return Err(Error::InvalidArgument {
                what: "field string longer than the wire format allows",
            });
        }

        // Field code byte, one-char variant signature, u32 length, bytes,
        // NUL. Entries are 8-aligned.
        let off = self.extend_fields(8, 4 + 4 + len + 1)?;
        let endian = self.header.endian;
        self.write_fields_at(off, &[code.code(), 1, ty.code(), 0]);
        self.write_fields_at(off + 4, &endian.write_u32(len as u32));
        self.write_fields_at(off + 8, value.as_bytes());
        Ok(FieldSlice {
            offset: off + 8,
            len,
        })
    }

    /// Appends a signature-valued header field (`g`).
    pub(crate) fn append_field_signature(
        &mut self,
        code: FieldCode,
        value: &str,
    ) -> MessageResult<FieldSlice> {
        let len = value.len();
        if len > SIGNATURE_MAX_LENGTH {
            return Err(Error::InvalidArgument {
                what: "signature longer than 255 bytes",
            });
        }

        let off = self.extend_fields(8, 4 + 1 + len + 1)?;
        self.write_fields_at(off, &[code.code(), 1, Type::Signature.code(), 0, len as u8]);
        self.write_fields_at(off + 5, value.as_bytes());
        Ok(FieldSlice {
            offset: off + 5,
            len,
        })
    }

    /// Appends a u32-valued header field (`u`).
    pub(crate) fn append_field_u32(&mut self, code: FieldCode, value: u32) -> MessageResult<()> {
        let off = self.extend_fields(8, 4 + 4)?;
        let endian = self.header.endian;
        self.write_fields_at(off, &[code.code(), 1, Type::Uint32.code(), 0]);
        self.write_fields_at(off + 4, &endian.write_u32(value));
        Ok(())
    }

    /// Enumerates the fields region of a received message, validating each
    /// known field and skipping unknown ones, then enforces the per-type
    /// header requirements and the body/signature consistency rule.
    pub(crate) fn parse_fields(&mut self) -> MessageResult<()> {
        let endian = self.header.endian;
        let mut ri = 0usize;

        loop {
            let parsed = {
                let data = self.storage.fields();
                if ri >= data.len() {
                    break;
                }
                parse_one_field(data, endian, &mut ri)?
            };
            match parsed {
                ParsedField::Path(slice) => self.path = Some(slice),
                ParsedField::Interface(slice) => self.interface = Some(slice),
                ParsedField::Member(slice) => self.member = Some(slice),
                ParsedField::ErrorName(slice) => self.error_name = Some(slice),
                ParsedField::Destination(slice) => self.destination = Some(slice),
                ParsedField::Sender(slice) => self.sender = Some(slice),
                ParsedField::ReplySerial(serial) => self.reply_serial = serial,
                ParsedField::UnixFds(count) => self.unix_fds = count,
                ParsedField::Signature(sig) => self.root.signature = sig,
                ParsedField::Skipped => {}
            }
        }

        if self.root.signature.is_empty() != self.storage.body().is_empty() {
            return Err(Malformed::BodySignatureMismatch.into());
        }

        match self.header.kind {
            MessageType::Signal => {
                if self.path.is_none() {
                    return Err(Malformed::MissingField { what: "path" }.into());
                }
                if self.interface.is_none() {
                    return Err(Malformed::MissingField { what: "interface" }.into());
                }
                if self.member.is_none() {
                    return Err(Malformed::MissingField { what: "member" }.into());
                }
            }
            MessageType::MethodCall => {
                if self.path.is_none() {
                    return Err(Malformed::MissingField { what: "path" }.into());
                }
                if self.member.is_none() {
                    return Err(Malformed::MissingField { what: "member" }.into());
                }
            }
            MessageType::MethodReturn => {
                if self.reply_serial == 0 {
                    return Err(Malformed::MissingField {
                        what: "reply serial",
                    }
                    .into());
                }
            }
            MessageType::MethodError => {
                if self.reply_serial == 0 {
                    return Err(Malformed::MissingField {
                        what: "reply serial",
                    }
                    .into());
                }
                if self.error_name.is_none() {
                    return Err(Malformed::MissingField { what: "error name" }.into());
                }
            }
        }

        // Best-effort read of the error message; failure is not an error.
        if self.header.kind == MessageType::MethodError {
            if let Ok(Some((offset, len))) = self.try_read_leading_string() {
                self.error_message = Some(FieldSlice { offset, len });
            }
            self.containers.clear();
            self.rindex = 0;
            self.root.index = 0;
        }

        Ok(())
    }

    fn try_read_leading_string(&mut self) -> MessageResult<Option<(usize, usize)>> {
        if self.root.current_code() != Some(b's') {
            return Ok(None);
        }
        self.read_string_like_range(Type::String)
    }
}

enum ParsedField {
    Path(FieldSlice),
    Interface(FieldSlice),
    Member(FieldSlice),
    ErrorName(FieldSlice),
    Destination(FieldSlice),
    Sender(FieldSlice),
    ReplySerial(u32),
    UnixFds(u32),
    Signature(String),
    Skipped,
}

fn parse_one_field(data: &[u8], endian: Endian, ri: &mut usize) -> MessageResult<ParsedField> {
    // Each entry is an 8-aligned struct of (code byte, variant).
    let code_off = buffer_peek(data, ri, 8, 1)?;
    let code = data[code_off];
    let (sig_off, sig_len) = peek_field_signature(data, ri)?;
    let sig = &data[sig_off..sig_off + sig_len];

    if code == 0 {
        return Err(Malformed::InvalidFieldCode.into());
    }
    let Some(field) = FieldCode::parse(code) else {
        // Unknown field: skip its value, driven by the variant signature.
        let mut rest = std::str::from_utf8(sig).map_err(|_| Error::from(Malformed::InvalidUtf8))?;
        skip_field_value(data, endian, ri, None, &mut rest)?;
        return Ok(ParsedField::Skipped);
    };

    let expect = |expected: &[u8]| -> MessageResult<()> {
        if sig == expected {
            Ok(())
        } else {
            Err(Malformed::UnexpectedFieldSignature { code }.into())
        }
    };

    match field {
        FieldCode::Path => {
            expect(b"o")?;
            let slice = peek_field_string(
                data,
                endian,
                ri,
                object_path_is_valid,
                Malformed::InvalidObjectPath,
            )?;
            Ok(ParsedField::Path(slice))
        }
        FieldCode::Interface => {
            expect(b"s")?;
            let slice = peek_field_string(
                data,
                endian,
                ri,
                interface_name_is_valid,
                Malformed::InvalidInterfaceName,
            )?;
            Ok(ParsedField::Interface(slice))
        }
        FieldCode::Member => {
            expect(b"s")?;
            let slice = peek_field_string(
                data,
                endian,
                ri,
                member_name_is_valid,
                Malformed::InvalidMemberName,
            )?;
            Ok(ParsedField::Member(slice))
        }
        FieldCode::ErrorName => {
            expect(b"s")?;
            let slice = peek_field_string(
                data,
                endian,
                ri,
                error_name_is_valid,
                Malformed::InvalidErrorName,
            )?;
            Ok(ParsedField::ErrorName(slice))
        }
        FieldCode::ReplySerial => {
            expect(b"u")?;
            let serial = peek_field_u32(data, endian, ri)?;
            if serial == 0 {
                return Err(Malformed::ZeroReplySerial.into());
            }
            Ok(ParsedField::ReplySerial(serial))
        }
        FieldCode::Destination => {
            expect(b"s")?;
            let slice = peek_field_string(
                data,
                endian,
                ri,
                service_name_is_valid,
                Malformed::InvalidBusName,
            )?;
            Ok(ParsedField::Destination(slice))
        }
        FieldCode::Sender => {
            expect(b"s")?;
            let slice = peek_field_string(
                data,
                endian,
                ri,
                service_name_is_valid,
                Malformed::InvalidBusName,
            )?;
            Ok(ParsedField::Sender(slice))
        }
        FieldCode::Signature => {
            expect(b"g")?;
            let (off, len) = peek_field_signature(data, ri)?;
            let sig = std::str::from_utf8(&data[off..off + len])
                .map_err(|_| Error::from(Malformed::InvalidUtf8))?;
            Ok(ParsedField::Signature(sig.to_owned()))
        }
        FieldCode::UnixFds => {
            expect(b"u")?;
            Ok(ParsedField::UnixFds(peek_field_u32(data, endian, ri)?))
        }
    }
}

fn peek_field_u32(data: &[u8], endian: Endian, ri: &mut usize) -> MessageResult<u32> {
    let off = buffer_peek(data, ri, 4, 4)?;
    Ok(endian.read_u32(data[off..off + 4].try_into().unwrap()))
}

fn peek_field_string(
    data: &[u8],
    endian: Endian,
    ri: &mut usize,
    validate: fn(&str) -> bool,
    invalid: Malformed,
) -> MessageResult<FieldSlice> {
    let len = peek_field_u32(data, endian, ri)? as usize;
    let off = buffer_peek(data, ri, 1, len + 1)?;

    let bytes = &data[off..off + len + 1];
    validate_nul(bytes)?;
    let s =
        std::str::from_utf8(&bytes[..len]).map_err(|_| Error::from(Malformed::InvalidUtf8))?;
    if !validate(s) {
        return Err(invalid.into());
    }
    Ok(FieldSlice { offset: off, len })
}

fn peek_field_signature(data: &[u8], ri: &mut usize) -> MessageResult<(usize, usize)> {
    let len_off = buffer_peek(data, ri, 1, 1)?;
    let len = data[len_off] as usize;
    let off = buffer_peek(data, ri, 1, len + 1)?;

    let bytes = &data[off..off + len + 1];
    validate_nul(bytes)?;
    let s =
        std::str::from_utf8(&bytes[..len]).map_err(|_| Error::from(Malformed::InvalidUtf8))?;
    if !signature_is_valid(s, true) {
        return Err(Malformed::InvalidSignature.into());
    }
    Ok((off, len))
}

/// Walks `ri` past one value sequence in the fields region, consuming
/// `sig` as it goes. With `array_bytes` set, stops once that many bytes
/// have been consumed (the signature is then reused per element).
fn skip_field_value<'a>(
    data: &'a [u8],
    endian: Endian,
    ri: &mut usize,
    array_bytes: Option<u32>,
    sig: &mut &'a str,
) -> MessageResult<()> {
    let origin = *ri;
    loop {
        if let Some(limit) = array_bytes {
            if *ri - origin >= limit as usize {
                return Ok(());
            }
        }
        let cur: &'a str = *sig;
        let Some(&code) = cur.as_bytes().first() else {
            return Ok(());
        };

        match code {
            b's' => {
                peek_field_string(data, endian, ri, |_| true, Malformed::InvalidUtf8)?;
                *sig = &cur[1..];
            }
            b'o' => {
                peek_field_string(
                    data,
                    endian,
                    ri,
                    object_path_is_valid,
                    Malformed::InvalidObjectPath,
                )?;
                *sig = &cur[1..];
            }
            b'g' => {
                peek_field_signature(data, ri)?;
                *sig = &cur[1..];
            }
            b'a' => {
                let element_len = signature_element_length(&cur[1..])
                    .map_err(|_| Error::from(Malformed::InvalidSignature))?;
                let contents = &cur[1..1 + element_len];
                let alignment = alignment_of(contents.as_bytes()[0])
                    .ok_or(Error::from(Malformed::InvalidSignature))?;

                let size = peek_field_u32(data, endian, ri)?;
                if size > ARRAY_MAX_BYTES {
                    return Err(Malformed::ArrayTooLarge { size }.into());
                }
                buffer_peek(data, ri, alignment, 0)?;

                let mut inner = contents;
                skip_field_value(data, endian, ri, Some(size), &mut inner)?;
                *sig = &cur[1 + element_len..];
            }
            b'v' => {
                let (off, len) = peek_field_signature(data, ri)?;
                let mut inner = std::str::from_utf8(&data[off..off + len])
                    .map_err(|_| Error::from(Malformed::InvalidUtf8))?;
                skip_field_value(data, endian, ri, None, &mut inner)?;
                *sig = &cur[1..];
            }
            b'(' | b'{' => {
                let element_len = signature_element_length(cur)
                    .map_err(|_| Error::from(Malformed::InvalidSignature))?;
                let mut inner = &cur[1..element_len - 1];
                skip_field_value(data, endian, ri, None, &mut inner)?;
                *sig = &cur[element_len..];
            }
            _ => {
                let Some(ty) = Type::from_code(code).filter(|t| t.is_basic()) else {
                    return Err(Malformed::InvalidSignature.into());
                };
                let size = ty.fixed_size().ok_or(Error::from(Malformed::InvalidSignature))?;
                buffer_peek(data, ri, ty.alignment(), size)?;
                *sig = &cur[1..];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;

    #[test]
    fn field_entries_are_8_aligned_structs() {
        let m = Message::new_signal("/foo", "com.example", "Bar").unwrap();
        let fields = m.storage.fields();

        // First entry: PATH, variant signature "o", then the path string.
        assert_eq!(fields[0], FieldCode::Path.code());
        assert_eq!(fields[1], 1);
        assert_eq!(fields[2], b'o');
        assert_eq!(fields[3], 0);
        let endian = m.endian();
        assert_eq!(endian.read_u32(fields[4..8].try_into().unwrap()), 4);
        assert_eq!(&fields[8..13], b"/foo\0");

        // Second entry begins at the next 8-byte boundary.
        assert_eq!(fields[13..16], [0, 0, 0]);
        assert_eq!(fields[16], FieldCode::Interface.code());
    }

    #[test]
    fn unknown_field_is_skipped_on_parse() {
        let mut m = Message::new_signal("/foo", "com.example", "Bar").unwrap();
        // A field code from the future, carrying a u32.
        m.append_field_u32(FieldCode::parse(9).unwrap(), 1).unwrap();
        m.seal(1).unwrap();
        let mut blob = m.to_blob().unwrap();

        // Rewrite the code byte to something unknown (> UnixFds); the
        // entry sits last in the fields region.
        let pos = blob
            .iter()
            .position(|&b| b == FieldCode::UnixFds.code())
            .unwrap();
        blob[pos] = 200;

        let received = Message::from_buffer(blob, None, None).unwrap();
        assert_eq!(received.unix_fds(), 0);
        assert_eq!(received.path(), Some("/foo"));
    }

    #[test]
    fn zero_field_code_is_rejected() {
        let mut m = Message::new_signal("/foo", "com.example", "Bar").unwrap();
        m.append_field_u32(FieldCode::parse(9).unwrap(), 1).unwrap();
        m.seal(1).unwrap();
        let mut blob = m.to_blob().unwrap();
        let pos = blob
            .iter()
            .position(|&b| b == FieldCode::UnixFds.code())
            .unwrap();
        blob[pos] = 0;

        let err = Message::from_buffer(blob, None, None).unwrap_err();
        assert_eq!(err, Error::Malformed(Malformed::InvalidFieldCode));
    }

    #[test]
    fn known_field_with_wrong_signature_is_rejected() {
        let mut m = Message::new_signal("/foo", "com.example", "Bar").unwrap();
        m.seal(1).unwrap();
        let mut blob = m.to_blob().unwrap();

        // The INTERFACE entry's variant signature says "s"; forge it to
        // "u" so the field no longer matches its table entry.
        let pos = blob
            .windows(4)
            .position(|w| w == [FieldCode::Interface.code(), 1, b's', 0])
            .unwrap();
        blob[pos + 2] = b'u';

        let err = Message::from_buffer(blob, None, None).unwrap_err();
        assert!(matches!(
            err,
            Error::Malformed(Malformed::UnexpectedFieldSignature { code }) if code == FieldCode::Interface.code()
        ));
    }

    #[test]
    fn invalid_path_in_field_is_rejected() {
        let mut m = Message::new_signal("/foo", "com.example", "Bar").unwrap();
        m.seal(1).unwrap();
        let mut blob = m.to_blob().unwrap();

        // Corrupt the path string to break the path grammar.
        let pos = blob.windows(4).position(|w| w == *b"/foo").unwrap();
        blob[pos] = b'x';

        let err = Message::from_buffer(blob, None, None).unwrap_err();
        assert_eq!(err, Error::Malformed(Malformed::InvalidObjectPath));
    }

    #[test]
    fn missing_required_field_is_rejected() {
        // A signal without an interface: build a method call (which does
        // not require one) and forge its type byte to signal.
        let mut m = Message::new_method_call(None, "/foo", None, "Bar").unwrap();
        m.seal(1).unwrap();
        let mut blob = m.to_blob().unwrap();
        blob[1] = MessageType::Signal.code();

        let err = Message::from_buffer(blob, None, None).unwrap_err();
        assert_eq!(
            err,
            Error::Malformed(Malformed::MissingField { what: "interface" })
        );
    }

    #[test]
    fn body_without_signature_is_rejected() {
        let mut m = Message::new_signal("/foo", "com.example", "Bar").unwrap();
        m.append_basic(crate::Value::Uint32(7)).unwrap();
        m.seal(1).unwrap();
        let mut blob = m.to_blob().unwrap();

        // Blank out the SIGNATURE field into an unknown (skippable)
        // field code so the body is left signature-less.
        let pos = blob
            .windows(4)
            .position(|w| w == [FieldCode::Signature.code(), 1, b'g', 0])
            .unwrap();
        blob[pos] = 254;

        let err = Message::from_buffer(blob, None, None).unwrap_err();
        assert_eq!(err, Error::Malformed(Malformed::BodySignatureMismatch));
    }

    #[test]
    fn error_message_is_read_best_effort() {
        let mut call = Message::new_method_call(None, "/", None, "Frob").unwrap();
        call.seal(100).unwrap();
        let mut reply =
            Message::new_method_error(&call, "com.example.BadArg", Some("nope")).unwrap();
        reply.seal(101).unwrap();

        let received = Message::from_buffer(reply.to_blob().unwrap(), None, None).unwrap();
        let error = received.error().unwrap();
        assert_eq!(error.name, "com.example.BadArg");
        assert_eq!(error.message, Some("nope"));
        assert_eq!(received.reply_serial(), Some(100));
    }

    #[test]
    fn error_message_read_leaves_cursor_at_start() {
        let mut call = Message::new_method_call(None, "/", None, "Frob").unwrap();
        call.seal(100).unwrap();
        let mut reply = Message::new_method_error(&call, "com.example.Bad", Some("why")).unwrap();
        reply.seal(101).unwrap();

        let mut received = Message::from_buffer(reply.to_blob().unwrap(), None, None).unwrap();
        assert_eq!(
            received.read_basic(Type::String).unwrap(),
            Some(crate::Value::Str("why"))
        );
    }
}
