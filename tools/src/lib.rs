//! Report building for the busmsg inspection CLI.

use message::{Message, MessageResult};
use serde::Serialize;

/// Everything `inspect` reports about one serialized message.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub endian: char,
    pub kind: String,
    pub flags: u8,
    pub serial: u32,
    pub reply_serial: Option<u32>,
    pub path: Option<String>,
    pub interface: Option<String>,
    pub member: Option<String>,
    pub destination: Option<String>,
    pub sender: Option<String>,
    pub error_name: Option<String>,
    pub error_message: Option<String>,
    pub signature: String,
    pub unix_fds: u32,
    pub wire_size: usize,
}

/// Parses a serialized message and summarizes its header and fields.
///
/// # Errors
///
/// Any parse failure of the buffer.
pub fn inspect_message(bytes: &[u8]) -> MessageResult<InspectReport> {
    let m = Message::from_buffer(bytes.to_vec(), None, None)?;
    let error = m.error();
    Ok(InspectReport {
        endian: m.endian().marker() as char,
        kind: format!("{:?}", m.message_type()),
        flags: m.flags().raw(),
        serial: m.serial().unwrap_or(0),
        reply_serial: m.reply_serial(),
        path: m.path().map(str::to_owned),
        interface: m.interface().map(str::to_owned),
        member: m.member().map(str::to_owned),
        destination: m.destination().map(str::to_owned),
        sender: m.sender().map(str::to_owned),
        error_name: error.map(|e| e.name.to_owned()),
        error_message: error.and_then(|e| e.message.map(str::to_owned)),
        signature: m.signature().to_owned(),
        unix_fds: m.unix_fds(),
        wire_size: bytes.len(),
    })
}

/// Renders a report as `key: value` lines, omitting absent fields.
#[must_use]
pub fn format_report_pretty(report: &InspectReport) -> String {
    let mut out = String::new();
    let mut line = |key: &str, value: String| {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(&value);
        out.push('\n');
    };

    line("kind", report.kind.clone());
    line("endian", report.endian.to_string());
    line("flags", format!("{:#04x}", report.flags));
    line("serial", report.serial.to_string());
    if let Some(reply_serial) = report.reply_serial {
        line("reply_serial", reply_serial.to_string());
    }
    for (key, value) in [
        ("path", &report.path),
        ("interface", &report.interface),
        ("member", &report.member),
        ("destination", &report.destination),
        ("sender", &report.sender),
        ("error_name", &report.error_name),
        ("error_message", &report.error_message),
    ] {
        if let Some(value) = value {
            line(key, value.clone());
        }
    }
    line("signature", format!("{:?}", report.signature));
    if report.unix_fds > 0 {
        line("unix_fds", report.unix_fds.to_string());
    }
    line("wire_size", format!("{} bytes", report.wire_size));
    out
}

/// Parses a serialized message and renders the full body walk.
///
/// # Errors
///
/// Any parse or traversal failure of the buffer.
pub fn dump_message(bytes: &[u8]) -> MessageResult<String> {
    let mut m = Message::from_buffer(bytes.to_vec(), None, None)?;
    m.dump()
}

#[cfg(test)]
mod tests {
    use super::*;
    use message::Value;

    fn sample_blob() -> Vec<u8> {
        let mut m = message::Message::new_signal("/foo", "com.example", "Bar").unwrap();
        m.append_basic(Value::Uint32(7)).unwrap();
        m.seal(9).unwrap();
        m.to_blob().unwrap()
    }

    #[test]
    fn inspect_summarizes_header() {
        let blob = sample_blob();
        let report = inspect_message(&blob).unwrap();
        assert_eq!(report.kind, "Signal");
        assert_eq!(report.serial, 9);
        assert_eq!(report.path.as_deref(), Some("/foo"));
        assert_eq!(report.signature, "u");
        assert_eq!(report.wire_size, blob.len());
    }

    #[test]
    fn pretty_format_lists_present_fields() {
        let report = inspect_message(&sample_blob()).unwrap();
        let text = format_report_pretty(&report);
        assert!(text.contains("kind: Signal"));
        assert!(text.contains("path: /foo"));
        assert!(text.contains("serial: 9"));
        assert!(!text.contains("error_name"));
    }

    #[test]
    fn report_serializes_to_json() {
        let report = inspect_message(&sample_blob()).unwrap();
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"kind\":\"Signal\""));
        assert!(json.contains("\"signature\":\"u\""));
    }

    #[test]
    fn dump_renders_body() {
        let text = dump_message(&sample_blob()).unwrap();
        assert!(text.contains("UINT32: 7"));
    }

    #[test]
    fn inspect_rejects_garbage() {
        assert!(inspect_message(&[0u8; 40]).is_err());
    }
}
