#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::protocol::descriptor::{FieldDescriptor, RecordDescriptor};
    use crate::protocol::{PrimitiveKind, Value, ValueDescriptor, WirecallError};

    fn round_trip(descriptor: &ValueDescriptor, value: &Value) -> Value {
        let mut buf = Vec::new();
        encode(&mut buf, descriptor, value).unwrap();

        let mut reader = Reader::new(&buf);
        let decoded = decode(&mut reader, descriptor).unwrap();
        assert!(reader.is_empty(), "decode left {} bytes", reader.remaining());
        decoded
    }

    #[test]
    fn test_primitive_round_trips() {
        let cases = [
            (PrimitiveKind::Bool, Value::Bool(true)),
            (PrimitiveKind::I8, Value::I8(-7)),
            (PrimitiveKind::Char, Value::Char(0x263A)),
            (PrimitiveKind::I16, Value::I16(-12345)),
            (PrimitiveKind::I32, Value::I32(0x1234_5678)),
            (PrimitiveKind::I64, Value::I64(-9_000_000_000)),
            (PrimitiveKind::F32, Value::F32(1.25)),
            (PrimitiveKind::F64, Value::F64(-0.001)),
        ];
        for (kind, value) in cases {
            let descriptor = ValueDescriptor::Primitive(kind);
            assert_eq!(round_trip(&descriptor, &value), value);
        }
    }

    #[test]
    fn test_primitive_wire_sizes() {
        let cases = [
            (PrimitiveKind::Bool, Value::Bool(false), 1),
            (PrimitiveKind::I8, Value::I8(1), 1),
            (PrimitiveKind::Char, Value::Char(65), 2),
            (PrimitiveKind::I16, Value::I16(1), 2),
            (PrimitiveKind::I32, Value::I32(1), 4),
            (PrimitiveKind::I64, Value::I64(1), 8),
            (PrimitiveKind::F32, Value::F32(1.0), 4),
            (PrimitiveKind::F64, Value::F64(1.0), 8),
        ];
        for (kind, value, body) in cases {
            let mut buf = Vec::new();
            encode(&mut buf, &ValueDescriptor::Primitive(kind), &value).unwrap();
            assert_eq!(buf.len(), 1 + body, "{:?}", kind);
            assert_eq!(kind.wire_size(), body);
        }
    }

    #[test]
    fn test_i32_is_big_endian() {
        let mut buf = Vec::new();
        encode(
            &mut buf,
            &ValueDescriptor::Primitive(PrimitiveKind::I32),
            &Value::I32(1),
        )
        .unwrap();
        assert_eq!(buf, [0x00, 0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_empty_string_wire_bytes() {
        let mut buf = Vec::new();
        encode(&mut buf, &ValueDescriptor::Utf8String, &Value::from("")).unwrap();
        assert_eq!(buf, [0x00, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_null_string_wire_bytes() {
        let mut buf = Vec::new();
        encode(&mut buf, &ValueDescriptor::Utf8String, &Value::Null).unwrap();
        assert_eq!(buf, [0x01]);
    }

    #[test]
    fn test_null_and_empty_string_both_round_trip() {
        assert_eq!(
            round_trip(&ValueDescriptor::Utf8String, &Value::Null),
            Value::Null
        );
        assert_eq!(
            round_trip(&ValueDescriptor::Utf8String, &Value::from("")),
            Value::from("")
        );
    }

    #[test]
    fn test_string_round_trip_multibyte() {
        let value = Value::from("héllo wörld ☃");
        assert_eq!(round_trip(&ValueDescriptor::Utf8String, &value), value);
    }

    #[test]
    fn test_primitive_array_wire_bytes() {
        // No per-element null tags: 1 tag + 4 length + 3 * 4 bytes.
        let descriptor = ValueDescriptor::array(ValueDescriptor::Primitive(PrimitiveKind::I32));
        let value = Value::Array(vec![Value::I32(1), Value::I32(2), Value::I32(3)]);

        let mut buf = Vec::new();
        encode(&mut buf, &descriptor, &value).unwrap();
        assert_eq!(
            buf,
            [
                0x00, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02,
                0x00, 0x00, 0x00, 0x03
            ]
        );

        let mut reader = Reader::new(&buf);
        assert_eq!(decode(&mut reader, &descriptor).unwrap(), value);
    }

    #[test]
    fn test_empty_primitive_array_is_five_bytes() {
        let descriptor = ValueDescriptor::array(ValueDescriptor::Primitive(PrimitiveKind::I64));
        let mut buf = Vec::new();
        encode(&mut buf, &descriptor, &Value::Array(Vec::new())).unwrap();
        assert_eq!(buf, [0x00, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_composite_array_elements_carry_tags() {
        let descriptor = ValueDescriptor::array(ValueDescriptor::Utf8String);
        let value = Value::Array(vec![Value::from("a"), Value::Null, Value::from("bc")]);
        assert_eq!(round_trip(&descriptor, &value), value);

        // a null element is a single tag byte
        let mut buf = Vec::new();
        encode(&mut buf, &descriptor, &value).unwrap();
        // tag + len + (tag + len + 1) + (tag) + (tag + len + 2)
        assert_eq!(buf.len(), 1 + 4 + 6 + 1 + 7);
    }

    #[test]
    fn test_null_element_in_primitive_array_is_rejected() {
        let descriptor = ValueDescriptor::array(ValueDescriptor::Primitive(PrimitiveKind::I16));
        let value = Value::Array(vec![Value::I16(1), Value::Null]);

        let mut buf = Vec::new();
        let err = encode(&mut buf, &descriptor, &value).unwrap_err();
        assert!(matches!(err, WirecallError::TypeMismatch { .. }));
    }

    #[test]
    fn test_decode_null_tag_for_primitive_slot() {
        let mut reader = Reader::new(&[0x01]);
        let err = decode(&mut reader, &ValueDescriptor::Primitive(PrimitiveKind::I32)).unwrap_err();
        assert!(matches!(err, WirecallError::NullPrimitive));
    }

    #[test]
    fn test_decode_malformed_tag() {
        let mut reader = Reader::new(&[0x02]);
        let err = decode(&mut reader, &ValueDescriptor::Utf8String).unwrap_err();
        assert!(matches!(err, WirecallError::MalformedTag(2)));
    }

    #[test]
    fn test_decode_negative_length() {
        let mut bytes = vec![0x00];
        bytes.extend_from_slice(&(-4i32).to_be_bytes());
        let mut reader = Reader::new(&bytes);
        let err = decode(
            &mut reader,
            &ValueDescriptor::array(ValueDescriptor::Primitive(PrimitiveKind::I8)),
        )
        .unwrap_err();
        assert!(matches!(err, WirecallError::MalformedLength(-4)));
    }

    #[test]
    fn test_decode_underflow() {
        // announces a 10-byte string but carries only 2 bytes
        let mut bytes = vec![0x00];
        bytes.extend_from_slice(&10i32.to_be_bytes());
        bytes.extend_from_slice(b"hi");

        let mut reader = Reader::new(&bytes);
        let err = decode(&mut reader, &ValueDescriptor::Utf8String).unwrap_err();
        assert!(matches!(
            err,
            WirecallError::UnexpectedEnd {
                needed: 10,
                remaining: 2
            }
        ));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let mut bytes = vec![0x00];
        bytes.extend_from_slice(&2i32.to_be_bytes());
        bytes.extend_from_slice(&[0xFF, 0xFE]);

        let mut reader = Reader::new(&bytes);
        let err = decode(&mut reader, &ValueDescriptor::Utf8String).unwrap_err();
        assert!(matches!(err, WirecallError::InvalidText(_)));
    }

    /// A chain of `levels` single-field records; slot depths run 0..levels-1.
    fn nested_record(levels: usize) -> (ValueDescriptor, Value) {
        let mut descriptor = ValueDescriptor::Primitive(PrimitiveKind::I32);
        let mut value = Value::I32(42);
        for _ in 1..levels {
            descriptor = ValueDescriptor::Record(RecordDescriptor::new(vec![
                FieldDescriptor::new("inner", descriptor),
            ]));
            value = Value::Record(vec![value]);
        }
        (descriptor, value)
    }

    #[test]
    fn test_depth_twenty_succeeds() {
        let (descriptor, value) = nested_record(MAX_DEPTH + 1);
        assert_eq!(round_trip(&descriptor, &value), value);
    }

    #[test]
    fn test_depth_twenty_one_is_rejected_on_encode() {
        let (descriptor, value) = nested_record(MAX_DEPTH + 2);
        let mut buf = Vec::new();
        let err = encode(&mut buf, &descriptor, &value).unwrap_err();
        assert!(matches!(err, WirecallError::DepthExceeded));
    }

    #[test]
    fn test_depth_twenty_one_is_rejected_on_decode() {
        // encode at the limit, then decode with one extra record layer so
        // only the decoder trips
        let (descriptor, value) = nested_record(MAX_DEPTH + 1);
        let mut buf = Vec::new();
        encode(&mut buf, &descriptor, &value).unwrap();

        let (deep_descriptor, _) = nested_record(MAX_DEPTH + 2);
        let mut bytes = vec![0x00];
        bytes.extend_from_slice(&buf);

        let mut reader = Reader::new(&bytes);
        let err = decode(&mut reader, &deep_descriptor).unwrap_err();
        assert!(matches!(err, WirecallError::DepthExceeded));
    }

    #[test]
    fn test_record_skips_immutable_fields() {
        let descriptor = ValueDescriptor::Record(RecordDescriptor::new(vec![
            FieldDescriptor::immutable("version", ValueDescriptor::Primitive(PrimitiveKind::I32)),
            FieldDescriptor::new("name", ValueDescriptor::Utf8String),
        ]));
        let original = Value::Record(vec![Value::I32(3), Value::from("zed")]);

        let mut buf = Vec::new();
        encode(&mut buf, &descriptor, &original).unwrap();
        // only the mutable string travels: tag + (tag + len + 3)
        assert_eq!(buf.len(), 1 + 1 + 4 + 3);

        let mut reader = Reader::new(&buf);
        let decoded = decode(&mut reader, &descriptor).unwrap();
        // mutable field restored, immutable field back at its default
        assert_eq!(decoded, Value::Record(vec![Value::I32(0), Value::from("zed")]));
    }

    #[test]
    fn test_record_prototype_supplies_defaults() {
        let descriptor = ValueDescriptor::Record(
            RecordDescriptor::new(vec![
                FieldDescriptor::immutable("unit", ValueDescriptor::Utf8String),
                FieldDescriptor::new("count", ValueDescriptor::Primitive(PrimitiveKind::I64)),
            ])
            .with_prototype(vec![Value::from("ms"), Value::I64(0)]),
        );
        let original = Value::Record(vec![Value::from("ignored"), Value::I64(17)]);

        let mut buf = Vec::new();
        encode(&mut buf, &descriptor, &original).unwrap();
        let mut reader = Reader::new(&buf);
        let decoded = decode(&mut reader, &descriptor).unwrap();

        assert_eq!(decoded, Value::Record(vec![Value::from("ms"), Value::I64(17)]));
    }

    #[test]
    fn test_record_prototype_arity_mismatch() {
        let descriptor = ValueDescriptor::Record(
            RecordDescriptor::new(vec![FieldDescriptor::new(
                "count",
                ValueDescriptor::Primitive(PrimitiveKind::I32),
            )])
            .with_prototype(vec![Value::I32(0), Value::I32(1)]),
        );

        let mut reader = Reader::new(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x05]);
        let err = decode(&mut reader, &descriptor).unwrap_err();
        assert!(matches!(err, WirecallError::UnconstructibleRecord(_)));
    }

    #[test]
    fn test_null_record_round_trip() {
        let descriptor = ValueDescriptor::Record(RecordDescriptor::new(vec![
            FieldDescriptor::new("x", ValueDescriptor::Primitive(PrimitiveKind::F64)),
        ]));
        assert_eq!(round_trip(&descriptor, &Value::Null), Value::Null);
    }

    #[test]
    fn test_nested_record_and_arrays_round_trip() {
        let point = RecordDescriptor::new(vec![
            FieldDescriptor::new("x", ValueDescriptor::Primitive(PrimitiveKind::F64)),
            FieldDescriptor::new("y", ValueDescriptor::Primitive(PrimitiveKind::F64)),
        ]);
        let descriptor = ValueDescriptor::Record(RecordDescriptor::new(vec![
            FieldDescriptor::new("label", ValueDescriptor::Utf8String),
            FieldDescriptor::new(
                "points",
                ValueDescriptor::array(ValueDescriptor::Record(point)),
            ),
            FieldDescriptor::new(
                "weights",
                ValueDescriptor::array(ValueDescriptor::Primitive(PrimitiveKind::I16)),
            ),
        ]));
        let value = Value::Record(vec![
            Value::from("path"),
            Value::Array(vec![
                Value::Record(vec![Value::F64(0.0), Value::F64(1.0)]),
                Value::Null,
                Value::Record(vec![Value::F64(-2.5), Value::F64(3.75)]),
            ]),
            Value::Array(vec![Value::I16(1), Value::I16(2)]),
        ]);
        assert_eq!(round_trip(&descriptor, &value), value);
    }

    #[test]
    fn test_encode_type_mismatch() {
        let mut buf = Vec::new();
        let err = encode(
            &mut buf,
            &ValueDescriptor::Utf8String,
            &Value::I32(1),
        )
        .unwrap_err();
        assert!(matches!(err, WirecallError::TypeMismatch { .. }));
    }

    #[test]
    fn test_several_slots_share_one_buffer() {
        // a message is just concatenated slots; decode them back in order
        let descriptors = [
            ValueDescriptor::Utf8String,
            ValueDescriptor::Primitive(PrimitiveKind::I32),
            ValueDescriptor::array(ValueDescriptor::Primitive(PrimitiveKind::Bool)),
        ];
        let values = [
            Value::from("sum"),
            Value::I32(-1),
            Value::Array(vec![Value::Bool(true), Value::Bool(false)]),
        ];

        let mut buf = Vec::new();
        for (descriptor, value) in descriptors.iter().zip(&values) {
            encode(&mut buf, descriptor, value).unwrap();
        }

        let mut reader = Reader::new(&buf);
        for (descriptor, value) in descriptors.iter().zip(&values) {
            assert_eq!(&decode(&mut reader, descriptor).unwrap(), value);
        }
        assert!(reader.is_empty());
    }
}
