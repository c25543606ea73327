#![no_main]

use libfuzzer_sys::fuzz_target;
use message::{Message, Peek, Type};

// Parse arbitrary bytes and, when a message validates, walk its entire
// body through the cursor API. Nothing here may panic.
fuzz_target!(|data: &[u8]| {
    let Ok(mut m) = Message::from_buffer(data.to_vec(), None, None) else {
        return;
    };

    let _ = m.path();
    let _ = m.interface();
    let _ = m.member();
    let _ = m.destination();
    let _ = m.sender();
    let _ = m.error();
    let _ = m.serial();
    let _ = m.reply_serial();
    let _ = m.unix_fds();

    // A full walk exercises peek/enter/read/exit on whatever the fields
    // declared as the body signature.
    let _ = m.dump();

    // Re-walk manually with a bounded step count.
    if m.rewind(true).unwrap_or(false) {
        let mut depth = 0usize;
        for _ in 0..4096 {
            match m.peek_type() {
                Ok(Peek::End { .. }) => {
                    if depth == 0 {
                        break;
                    }
                    if m.exit_container().is_err() {
                        break;
                    }
                    depth -= 1;
                }
                Ok(Peek::Container { kind, contents }) => {
                    let contents = contents.to_owned();
                    match m.enter_container(kind, &contents) {
                        Ok(true) => depth += 1,
                        _ => break,
                    }
                }
                Ok(Peek::Basic(ty)) => {
                    if !matches!(m.read_basic(ty), Ok(Some(_))) {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    }

    let _ = Type::from_code(data.first().copied().unwrap_or(0));
});
