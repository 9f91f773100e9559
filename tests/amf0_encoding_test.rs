//! AMF0 encoding tests
//!
//! Byte-level checks of the value encoder used for `onMetaData`.

use zvd_flv::format::amf0::{markers, MAX_SHORT_STRING};
use zvd_flv::format::{Amf0Encoder, Amf0Value};

fn encode(value: Amf0Value) -> Vec<u8> {
    value.encode().unwrap().to_vec()
}

#[test]
fn test_number() {
    assert_eq!(
        encode(Amf0Value::Number(419.0)),
        vec![0x00, 0x40, 0x7A, 0x30, 0x00, 0x00, 0x00, 0x00, 0x00]
    );
    assert_eq!(encode(Amf0Value::Number(0.0)), vec![0x00; 9]);
}

#[test]
fn test_boolean() {
    assert_eq!(encode(Amf0Value::Boolean(true)), vec![0x01, 0x01]);
    assert_eq!(encode(Amf0Value::Boolean(false)), vec![0x01, 0x00]);
}

#[test]
fn test_short_strings() {
    assert_eq!(encode(Amf0Value::from("")), vec![0x02, 0x00, 0x00]);
    assert_eq!(
        encode(Amf0Value::from("hello")),
        vec![0x02, 0x00, 0x05, b'h', b'e', b'l', b'l', b'o']
    );
}

#[test]
fn test_long_string_promotion() {
    let at_limit = "a".repeat(MAX_SHORT_STRING);
    let bytes = encode(Amf0Value::String(at_limit));
    assert_eq!(bytes[0], markers::STRING);
    assert_eq!(&bytes[1..3], &[0xFF, 0xFF]);
    assert_eq!(bytes.len(), 3 + MAX_SHORT_STRING);

    let past_limit = "a".repeat(MAX_SHORT_STRING + 1);
    let value = Amf0Value::String(past_limit);
    assert_eq!(value.marker(), markers::LONG_STRING);
    let bytes = encode(value);
    assert_eq!(&bytes[..5], &[0x0C, 0x00, 0x01, 0x00, 0x00]);
    assert_eq!(bytes.len(), 5 + MAX_SHORT_STRING + 1);

    assert_eq!(
        encode(Amf0Value::LongString("ab".to_string())),
        vec![0x0C, 0, 0, 0, 2, b'a', b'b']
    );
}

#[test]
fn test_ecma_array_layout() {
    let value = Amf0Value::ecma_array(vec![
        ("duration", Amf0Value::Number(0.0)),
        ("stereo", Amf0Value::Boolean(true)),
    ]);
    let bytes = encode(value);

    let mut expected = vec![markers::ECMA_ARRAY, 0, 0, 0, 2];
    expected.extend_from_slice(&[0, 8]);
    expected.extend_from_slice(b"duration");
    expected.extend_from_slice(&[0x00; 9]);
    expected.extend_from_slice(&[0, 6]);
    expected.extend_from_slice(b"stereo");
    expected.extend_from_slice(&[0x01, 0x01]);
    expected.extend_from_slice(&[0, 0, 9]);
    assert_eq!(bytes, expected);
}

#[test]
fn test_object_and_strict_array() {
    let object = Amf0Value::object(vec![("a", Amf0Value::Null)]);
    assert_eq!(encode(object), vec![0x03, 0, 1, b'a', 0x05, 0, 0, 9]);

    let empty = Amf0Value::object(vec![]);
    assert_eq!(encode(empty), vec![0x03, 0, 0, 9]);

    let array = Amf0Value::StrictArray(vec![Amf0Value::Undefined, Amf0Value::Boolean(false)]);
    assert_eq!(encode(array), vec![0x0A, 0, 0, 0, 2, 0x06, 0x01, 0x00]);
}

#[test]
fn test_date_and_reference() {
    let bytes = encode(Amf0Value::Date(1.0));
    assert_eq!(bytes.len(), 11);
    assert_eq!(bytes[0], markers::DATE);
    assert_eq!(&bytes[1..9], &1.0f64.to_be_bytes());
    assert_eq!(&bytes[9..], &[0, 0]);

    assert_eq!(encode(Amf0Value::Reference(0x0102)), vec![0x07, 0x01, 0x02]);
}

#[test]
fn test_incremental_encoder() {
    let mut encoder = Amf0Encoder::new();
    encoder.write_string("onMetaData").unwrap();
    encoder.write_null();
    encoder.write_reserved_marker();
    assert_eq!(encoder.as_slice().len(), 3 + 10 + 1 + 1);
    assert_eq!(encoder.as_slice()[13], markers::NULL);
    assert_eq!(encoder.as_slice()[14], markers::MOVIE_CLIP);

    encoder.reset();
    assert!(encoder.as_slice().is_empty());
}

#[test]
fn test_oversized_key_is_rejected() {
    let key = "k".repeat(MAX_SHORT_STRING + 1);
    let value = Amf0Value::EcmaArray(vec![(key, Amf0Value::Null)]);
    assert!(value.encode().is_err());
}
