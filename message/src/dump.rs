//! Human-readable rendering of a sealed message, for diagnostics.

use std::fmt::Write;

use signature::Type;

use crate::error::MessageResult;
use crate::message::Message;
use crate::reader::Peek;
use crate::value::Value;

impl Message {
    /// Renders the header summary and a full body walk.
    ///
    /// Rewinds the read cursor to the start before and after walking, so
    /// it can be called on a message that is mid-traversal.
    pub fn dump(&mut self) -> MessageResult<String> {
        let mut out = String::new();

        let _ = writeln!(
            out,
            "type={:?} serial={} flags={:#04x} endian={:?}",
            self.message_type(),
            self.serial().unwrap_or(0),
            self.flags().raw(),
            self.endian(),
        );
        let _ = writeln!(
            out,
            "path={} interface={} member={}",
            self.path().unwrap_or("-"),
            self.interface().unwrap_or("-"),
            self.member().unwrap_or("-"),
        );
        let _ = writeln!(
            out,
            "destination={} sender={} reply_serial={}",
            self.destination().unwrap_or("-"),
            self.sender().unwrap_or("-"),
            self.reply_serial()
                .map_or_else(|| "-".to_owned(), |s| s.to_string()),
        );
        if let Some(error) = self.error() {
            let _ = writeln!(
                out,
                "error.name={} error.message={}",
                error.name,
                error.message.unwrap_or("-")
            );
        }

        self.rewind(true)?;
        let _ = writeln!(out, "BEGIN_MESSAGE \"{}\" {{", self.signature());

        let mut level = 1usize;
        loop {
            match self.peek_type()? {
                Peek::End { container } => {
                    if level <= 1 {
                        break;
                    }
                    self.exit_container()?;
                    level -= 1;
                    let label = match container {
                        Some(Type::Array) => "END_ARRAY",
                        Some(Type::Variant) => "END_VARIANT",
                        Some(Type::Struct) => "END_STRUCT",
                        Some(Type::DictEntry) => "END_DICT_ENTRY",
                        _ => "END",
                    };
                    let _ = writeln!(out, "{}}} {label}", "\t".repeat(level));
                }
                Peek::Container { kind, contents } => {
                    let contents = contents.to_owned();
                    self.enter_container(kind, &contents)?;
                    let label = match kind {
                        Type::Array => "BEGIN_ARRAY",
                        Type::Variant => "BEGIN_VARIANT",
                        Type::Struct => "BEGIN_STRUCT",
                        _ => "BEGIN_DICT_ENTRY",
                    };
                    let _ = writeln!(out, "{}{label} \"{contents}\" {{", "\t".repeat(level));
                    level += 1;
                }
                Peek::Basic(ty) => {
                    let prefix = "\t".repeat(level);
                    let Some(value) = self.read_basic(ty)? else {
                        break;
                    };
                    let rendered = match value {
                        Value::Byte(v) => format!("BYTE: {v}"),
                        Value::Boolean(v) => format!("BOOLEAN: {v}"),
                        Value::Int16(v) => format!("INT16: {v}"),
                        Value::Uint16(v) => format!("UINT16: {v}"),
                        Value::Int32(v) => format!("INT32: {v}"),
                        Value::Uint32(v) => format!("UINT32: {v}"),
                        Value::Int64(v) => format!("INT64: {v}"),
                        Value::Uint64(v) => format!("UINT64: {v}"),
                        Value::Double(v) => format!("DOUBLE: {v}"),
                        Value::Str(v) => format!("STRING: {v:?}"),
                        Value::ObjectPath(v) => format!("OBJECT_PATH: {v:?}"),
                        Value::Signature(v) => format!("SIGNATURE: {v:?}"),
                        Value::UnixFd(v) => format!("UNIX_FD: {v}"),
                    };
                    let _ = writeln!(out, "{prefix}{rendered}");
                }
            }
        }

        let _ = writeln!(out, "}} END_MESSAGE");
        self.rewind(true)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Message, Value};
    use signature::Type;

    #[test]
    fn dump_walks_nested_containers() {
        let mut m = Message::new_signal("/foo", "com.example", "Bar").unwrap();
        m.append(
            "sa{sv}",
            &[
                Value::Str("head"),
                Value::Uint32(1),
                Value::Str("count"),
                Value::Signature("u"),
                Value::Uint32(42),
            ],
        )
        .unwrap();
        m.seal(12).unwrap();

        let mut received = Message::from_buffer(m.to_blob().unwrap(), None, None).unwrap();
        let text = received.dump().unwrap();

        assert!(text.contains("serial=12"));
        assert!(text.contains("path=/foo"));
        assert!(text.contains("BEGIN_MESSAGE \"sa{sv}\""));
        assert!(text.contains("STRING: \"head\""));
        assert!(text.contains("BEGIN_ARRAY \"{sv}\""));
        assert!(text.contains("BEGIN_DICT_ENTRY \"sv\""));
        assert!(text.contains("BEGIN_VARIANT \"u\""));
        assert!(text.contains("UINT32: 42"));
        assert!(text.contains("END_MESSAGE"));

        // The walk rewinds; the body can be read again afterwards.
        assert_eq!(
            received.read_basic(Type::String).unwrap(),
            Some(Value::Str("head"))
        );
    }

    #[test]
    fn dump_renders_empty_body() {
        let mut m = Message::new_method_call(None, "/", None, "Hello").unwrap();
        m.seal(1).unwrap();
        let mut received = Message::from_buffer(m.to_blob().unwrap(), None, None).unwrap();
        let text = received.dump().unwrap();
        assert!(text.contains("BEGIN_MESSAGE \"\""));
        assert!(text.contains("END_MESSAGE"));
    }
}
