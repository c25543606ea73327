#![no_main]

use libfuzzer_sys::fuzz_target;
use message::{Message, Type, Value};

// Drive the writer with fuzz-chosen appends, then seal and reparse. The
// writer may refuse inputs but must never corrupt the message: whatever
// seals must parse.
fuzz_target!(|data: &[u8]| {
    let Ok(mut m) = Message::new_signal("/fuzz", "com.example.Fuzz", "Run") else {
        return;
    };

    let mut bytes = data.iter().copied();
    for _ in 0..256 {
        let Some(op) = bytes.next() else { break };
        let _ = match op % 8 {
            0 => m.append_basic(Value::Byte(bytes.next().unwrap_or(0))),
            1 => m.append_basic(Value::Boolean(bytes.next().unwrap_or(0) & 1 == 1)),
            2 => m.append_basic(Value::Uint32(u32::from(bytes.next().unwrap_or(0)))),
            3 => m.append_basic(Value::Uint64(u64::from(bytes.next().unwrap_or(0)) << 33)),
            4 => m.append_basic(Value::Str("fuzz")),
            5 => m.open_container(Type::Array, "u"),
            6 => m.append_basic(Value::Uint32(u32::from(bytes.next().unwrap_or(0)))),
            _ => m.close_container(),
        };
    }
    while m.close_container().is_ok() {}

    if m.seal(1).is_err() {
        return;
    }
    let blob = match m.to_blob() {
        Ok(blob) => blob,
        Err(_) => return,
    };
    let mut reparsed = Message::from_buffer(blob, None, None).expect("sealed message must parse");
    let _ = reparsed.dump();
});
