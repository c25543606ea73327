use message::{Message, Type, Value};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Byte(u8),
    Boolean(bool),
    Int16(i16),
    Uint16(u16),
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    DoubleBits(u64),
    Str(String),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<u8>().prop_map(Op::Byte),
        any::<bool>().prop_map(Op::Boolean),
        any::<i16>().prop_map(Op::Int16),
        any::<u16>().prop_map(Op::Uint16),
        any::<i32>().prop_map(Op::Int32),
        any::<u32>().prop_map(Op::Uint32),
        any::<i64>().prop_map(Op::Int64),
        any::<u64>().prop_map(Op::Uint64),
        any::<u64>().prop_map(Op::DoubleBits),
        "[a-zA-Z0-9 /._-]{0,24}".prop_map(Op::Str),
    ]
}

impl Op {
    fn ty(&self) -> Type {
        match self {
            Op::Byte(_) => Type::Byte,
            Op::Boolean(_) => Type::Boolean,
            Op::Int16(_) => Type::Int16,
            Op::Uint16(_) => Type::Uint16,
            Op::Int32(_) => Type::Int32,
            Op::Uint32(_) => Type::Uint32,
            Op::Int64(_) => Type::Int64,
            Op::Uint64(_) => Type::Uint64,
            Op::DoubleBits(_) => Type::Double,
            Op::Str(_) => Type::String,
        }
    }

    fn value(&self) -> Value<'_> {
        match self {
            Op::Byte(v) => Value::Byte(*v),
            Op::Boolean(v) => Value::Boolean(*v),
            Op::Int16(v) => Value::Int16(*v),
            Op::Uint16(v) => Value::Uint16(*v),
            Op::Int32(v) => Value::Int32(*v),
            Op::Uint32(v) => Value::Uint32(*v),
            Op::Int64(v) => Value::Int64(*v),
            Op::Uint64(v) => Value::Uint64(*v),
            Op::DoubleBits(v) => Value::Double(f64::from_bits(*v)),
            Op::Str(v) => Value::Str(v),
        }
    }

    fn matches(&self, read: &Value<'_>) -> bool {
        match (self, read) {
            // NaN payloads survive; compare doubles by bits.
            (Op::DoubleBits(bits), Value::Double(v)) => v.to_bits() == *bits,
            _ => self.value() == *read,
        }
    }
}

proptest! {
    #[test]
    fn prop_build_parse_roundtrip(ops in prop::collection::vec(op_strategy(), 0..32)) {
        let mut m = Message::new_signal("/prop", "com.example.Prop", "Run").unwrap();
        for op in &ops {
            m.append_basic(op.value()).unwrap();
        }
        m.seal(1).unwrap();

        let blob = m.to_blob().unwrap();
        let mut received = Message::from_buffer(blob, None, None).unwrap();
        prop_assert_eq!(received.signature(), m.signature());

        for op in &ops {
            let read = received.read_basic(op.ty()).unwrap();
            let read = read.expect("value present");
            prop_assert!(op.matches(&read), "wrote {:?}, read {:?}", op, read);
        }
        prop_assert_eq!(received.read_basic(Type::Byte).unwrap(), None);
    }

    #[test]
    fn prop_rewind_is_idempotent(ops in prop::collection::vec(op_strategy(), 1..16)) {
        let mut m = Message::new_signal("/prop", "com.example.Prop", "Run").unwrap();
        for op in &ops {
            m.append_basic(op.value()).unwrap();
        }
        m.seal(1).unwrap();

        let mut received = Message::from_buffer(m.to_blob().unwrap(), None, None).unwrap();
        for _ in 0..2 {
            prop_assert!(received.rewind(true).unwrap());
            for op in &ops {
                let read = received.read_basic(op.ty()).unwrap().expect("value present");
                prop_assert!(op.matches(&read));
            }
        }
    }

    #[test]
    fn prop_blob_reserializes_identically(ops in prop::collection::vec(op_strategy(), 0..16)) {
        let mut m = Message::new_signal("/prop", "com.example.Prop", "Run").unwrap();
        for op in &ops {
            m.append_basic(op.value()).unwrap();
        }
        m.seal(1).unwrap();
        let blob = m.to_blob().unwrap();

        let received = Message::from_buffer(blob.clone(), None, None).unwrap();
        prop_assert_eq!(received.to_blob().unwrap(), blob);
    }
}
