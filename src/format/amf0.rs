//! AMF0 (Action Message Format 0) encoding
//!
//! AMF0 is the typed value format carried in FLV script data tags. Values are
//! a one-byte type marker followed by a marker-specific body. Object and
//! ECMA array properties are written as a bare length-prefixed key followed by
//! a typed value, and closed by the `00 00 09` end sentinel.

use crate::error::{Error, Result};
use crate::util::ByteWriter;
use bytes::Bytes;

/// Ordered property list used for objects and ECMA arrays
pub type Amf0Properties = Vec<(String, Amf0Value)>;

/// AMF0 data types
#[derive(Debug, Clone, PartialEq)]
pub enum Amf0Value {
    Number(f64),
    Boolean(bool),
    /// Written as a short string, or as a long string past 65535 bytes
    String(String),
    /// Always written with the long string marker
    LongString(String),
    Object(Amf0Properties),
    Null,
    Undefined,
    Reference(u16),
    EcmaArray(Amf0Properties),
    StrictArray(Vec<Amf0Value>),
    /// Milliseconds since the Unix epoch
    Date(f64),
}

/// AMF0 type markers
pub mod markers {
    pub const NUMBER: u8 = 0x00;
    pub const BOOLEAN: u8 = 0x01;
    pub const STRING: u8 = 0x02;
    pub const OBJECT: u8 = 0x03;
    pub const MOVIE_CLIP: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const UNDEFINED: u8 = 0x06;
    pub const REFERENCE: u8 = 0x07;
    pub const ECMA_ARRAY: u8 = 0x08;
    pub const OBJECT_END: u8 = 0x09;
    pub const STRICT_ARRAY: u8 = 0x0A;
    pub const DATE: u8 = 0x0B;
    pub const LONG_STRING: u8 = 0x0C;
}

/// Longest payload a short string can carry
pub const MAX_SHORT_STRING: usize = u16::MAX as usize;

impl Amf0Value {
    /// Encode this value into a fresh byte buffer
    pub fn encode(&self) -> Result<Bytes> {
        let mut encoder = Amf0Encoder::new();
        encoder.write_value(self)?;
        Ok(encoder.to_bytes())
    }

    /// Build an ECMA array from borrowed keys
    pub fn ecma_array(properties: Vec<(&str, Amf0Value)>) -> Self {
        Amf0Value::EcmaArray(Self::own_keys(properties))
    }

    /// Build an anonymous object from borrowed keys
    pub fn object(properties: Vec<(&str, Amf0Value)>) -> Self {
        Amf0Value::Object(Self::own_keys(properties))
    }

    fn own_keys(properties: Vec<(&str, Amf0Value)>) -> Amf0Properties {
        properties
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect()
    }

    /// Marker byte this value will be written with
    pub fn marker(&self) -> u8 {
        match self {
            Amf0Value::Number(_) => markers::NUMBER,
            Amf0Value::Boolean(_) => markers::BOOLEAN,
            Amf0Value::String(s) if s.len() > MAX_SHORT_STRING => markers::LONG_STRING,
            Amf0Value::String(_) => markers::STRING,
            Amf0Value::LongString(_) => markers::LONG_STRING,
            Amf0Value::Object(_) => markers::OBJECT,
            Amf0Value::Null => markers::NULL,
            Amf0Value::Undefined => markers::UNDEFINED,
            Amf0Value::Reference(_) => markers::REFERENCE,
            Amf0Value::EcmaArray(_) => markers::ECMA_ARRAY,
            Amf0Value::StrictArray(_) => markers::STRICT_ARRAY,
            Amf0Value::Date(_) => markers::DATE,
        }
    }
}

impl From<f64> for Amf0Value {
    fn from(value: f64) -> Self {
        Amf0Value::Number(value)
    }
}

impl From<u32> for Amf0Value {
    fn from(value: u32) -> Self {
        Amf0Value::Number(value as f64)
    }
}

impl From<bool> for Amf0Value {
    fn from(value: bool) -> Self {
        Amf0Value::Boolean(value)
    }
}

impl From<&str> for Amf0Value {
    fn from(value: &str) -> Self {
        Amf0Value::String(value.to_string())
    }
}

impl From<String> for Amf0Value {
    fn from(value: String) -> Self {
        Amf0Value::String(value)
    }
}

/// Incremental AMF0 writer over a [`ByteWriter`]
#[derive(Debug, Default)]
pub struct Amf0Encoder {
    writer: ByteWriter,
}

impl Amf0Encoder {
    pub fn new() -> Self {
        Amf0Encoder {
            writer: ByteWriter::new(),
        }
    }

    /// Underlying writer, for callers that interleave raw fields
    pub fn writer_mut(&mut self) -> &mut ByteWriter {
        &mut self.writer
    }

    /// Bytes written since the last reset
    pub fn as_slice(&self) -> &[u8] {
        self.writer.as_slice()
    }

    pub fn to_bytes(&self) -> Bytes {
        self.writer.to_bytes()
    }

    pub fn reset(&mut self) {
        self.writer.reset();
    }

    /// Write any value, choosing the marker from its variant
    pub fn write_value(&mut self, value: &Amf0Value) -> Result<()> {
        match value {
            Amf0Value::Number(n) => self.write_number(*n),
            Amf0Value::Boolean(b) => self.write_boolean(*b),
            Amf0Value::String(s) => {
                if s.len() > MAX_SHORT_STRING {
                    self.write_long_string(s)?;
                } else {
                    self.write_string(s)?;
                }
            }
            Amf0Value::LongString(s) => self.write_long_string(s)?,
            Amf0Value::Object(props) => self.write_object(props)?,
            Amf0Value::Null => self.write_null(),
            Amf0Value::Undefined => self.write_undefined(),
            Amf0Value::Reference(index) => self.write_reference(*index),
            Amf0Value::EcmaArray(props) => self.write_ecma_array(props)?,
            Amf0Value::StrictArray(values) => self.write_strict_array(values)?,
            Amf0Value::Date(millis) => self.write_date(*millis),
        }
        Ok(())
    }

    pub fn write_number(&mut self, value: f64) {
        self.writer.write_u8(markers::NUMBER);
        self.writer.write_f64(value);
    }

    pub fn write_boolean(&mut self, value: bool) {
        self.writer.write_u8(markers::BOOLEAN);
        self.writer.write_u8(value as u8);
    }

    /// Short string; fails past 65535 bytes
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.writer.write_u8(markers::STRING);
        self.write_utf8(value)
    }

    /// Long string; fails past `u32::MAX` bytes
    pub fn write_long_string(&mut self, value: &str) -> Result<()> {
        let len = long_string_len(value.len())?;
        self.writer.write_u8(markers::LONG_STRING);
        self.writer.write_u32(len);
        self.writer.write_str(value);
        Ok(())
    }

    pub fn write_object(&mut self, properties: &[(String, Amf0Value)]) -> Result<()> {
        self.writer.write_u8(markers::OBJECT);
        self.write_properties(properties)
    }

    /// Reserved movie clip marker; carries no body
    pub fn write_reserved_marker(&mut self) {
        self.writer.write_u8(markers::MOVIE_CLIP);
    }

    pub fn write_null(&mut self) {
        self.writer.write_u8(markers::NULL);
    }

    pub fn write_undefined(&mut self) {
        self.writer.write_u8(markers::UNDEFINED);
    }

    pub fn write_reference(&mut self, index: u16) {
        self.writer.write_u8(markers::REFERENCE);
        self.writer.write_u16(index);
    }

    pub fn write_ecma_array(&mut self, properties: &[(String, Amf0Value)]) -> Result<()> {
        self.writer.write_u8(markers::ECMA_ARRAY);
        self.writer.write_u32(properties.len() as u32);
        self.write_properties(properties)
    }

    /// The `00 00 09` sentinel closing an object or ECMA array
    pub fn write_object_end(&mut self) {
        self.writer.write_u16(0);
        self.writer.write_u8(markers::OBJECT_END);
    }

    pub fn write_strict_array(&mut self, values: &[Amf0Value]) -> Result<()> {
        self.writer.write_u8(markers::STRICT_ARRAY);
        self.writer.write_u32(values.len() as u32);
        for value in values {
            self.write_value(value)?;
        }
        Ok(())
    }

    /// Date as epoch milliseconds; the timezone field is always zero
    pub fn write_date(&mut self, millis: f64) {
        self.writer.write_u8(markers::DATE);
        self.writer.write_f64(millis);
        self.writer.write_i16(0);
    }

    fn write_properties(&mut self, properties: &[(String, Amf0Value)]) -> Result<()> {
        for (key, value) in properties {
            self.write_utf8(key)?;
            self.write_value(value)?;
        }
        self.write_object_end();
        Ok(())
    }

    /// Length-prefixed UTF-8 with no marker, as used for keys
    fn write_utf8(&mut self, value: &str) -> Result<()> {
        if value.len() > MAX_SHORT_STRING {
            return Err(Error::invalid_input(format!(
                "AMF0 short string of {} bytes exceeds {}",
                value.len(),
                MAX_SHORT_STRING
            )));
        }
        self.writer.write_u16(value.len() as u16);
        self.writer.write_str(value);
        Ok(())
    }
}

fn long_string_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        Error::invalid_input(format!(
            "AMF0 long string of {} bytes exceeds {}",
            len,
            u32::MAX
        ))
    })
}
