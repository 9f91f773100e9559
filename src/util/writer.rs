//! Growable big-endian byte writer
//!
//! `ByteWriter` is the bottom layer of the FLV encoding stack. It keeps a
//! zero-filled backing store and a write cursor; every write lands at the
//! cursor and advances it, growing the store when needed. Seeking backwards
//! and writing again overwrites in place, which is what the tag encoder relies
//! on when patching sizes.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;

/// Initial capacity of a fresh writer
const DEFAULT_CAPACITY: usize = 1024;

/// Minimum number of bytes added on each growth step
const MIN_GROWTH: usize = 512;

/// Position-tracked byte buffer with big-endian fixed-width writes
#[derive(Debug, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
    position: usize,
}

impl ByteWriter {
    /// Create a writer with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a writer with the given initial capacity
    pub fn with_capacity(capacity: usize) -> Self {
        ByteWriter {
            buf: vec![0; capacity],
            position: 0,
        }
    }

    /// Current write position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Size of the backing store
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes written so far, up to the cursor
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.position]
    }

    /// Snapshot of the bytes up to the cursor
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_slice())
    }

    /// Move the cursor back to the start; capacity is kept
    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// Move the cursor to an absolute position within the backing store
    pub fn seek(&mut self, position: usize) -> Result<()> {
        if position > self.buf.len() {
            return Err(Error::invalid_input(format!(
                "seek to {} beyond capacity {}",
                position,
                self.buf.len()
            )));
        }
        self.position = position;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) {
        self.ensure_available(1);
        self.buf[self.position] = value;
        self.position += 1;
    }

    pub fn write_i8(&mut self, value: i8) {
        self.write_u8(value as u8);
    }

    pub fn write_u16(&mut self, value: u16) {
        let pos = self.advance(2);
        BigEndian::write_u16(&mut self.buf[pos..], value);
    }

    pub fn write_i16(&mut self, value: i16) {
        let pos = self.advance(2);
        BigEndian::write_i16(&mut self.buf[pos..], value);
    }

    /// Write the low 24 bits of `value`
    pub fn write_u24(&mut self, value: u32) {
        let pos = self.advance(3);
        BigEndian::write_u24(&mut self.buf[pos..], value & 0x00FF_FFFF);
    }

    /// Write a signed value as 24-bit two's complement
    pub fn write_i24(&mut self, value: i32) {
        let pos = self.advance(3);
        BigEndian::write_i24(&mut self.buf[pos..], value.clamp(-0x80_0000, 0x7F_FFFF));
    }

    pub fn write_u32(&mut self, value: u32) {
        let pos = self.advance(4);
        BigEndian::write_u32(&mut self.buf[pos..], value);
    }

    pub fn write_i32(&mut self, value: i32) {
        let pos = self.advance(4);
        BigEndian::write_i32(&mut self.buf[pos..], value);
    }

    pub fn write_f32(&mut self, value: f32) {
        let pos = self.advance(4);
        BigEndian::write_f32(&mut self.buf[pos..], value);
    }

    pub fn write_f64(&mut self, value: f64) {
        let pos = self.advance(8);
        BigEndian::write_f64(&mut self.buf[pos..], value);
    }

    /// Write a raw byte range
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let pos = self.advance(bytes.len());
        self.buf[pos..pos + bytes.len()].copy_from_slice(bytes);
    }

    /// Write the UTF-8 bytes of `text` with no length prefix
    pub fn write_str(&mut self, text: &str) {
        self.write_bytes(text.as_bytes());
    }

    /// Reserve `len` bytes at the cursor and return where they start
    fn advance(&mut self, len: usize) -> usize {
        self.ensure_available(len);
        let pos = self.position;
        self.position += len;
        pos
    }

    fn ensure_available(&mut self, len: usize) {
        let required = self.position + len;
        if required <= self.buf.len() {
            return;
        }
        let new_size = (self.buf.len() * 2).max(required + MIN_GROWTH);
        self.buf.resize(new_size, 0);
    }
}

impl Default for ByteWriter {
    fn default() -> Self {
        Self::new()
    }
}
