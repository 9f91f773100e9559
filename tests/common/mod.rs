//! Common test utilities for ZVD-FLV integration tests
//!
//! Provides a scripted platform encoder whose behaviour can be observed after
//! it has been boxed into a track, frame builders, and an FLV tag walker that
//! checks the framing of muxer output.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::rc::Rc;
use zvd_flv::codec::{
    AudioEncoderConfig, AudioFrame, EncodeOptions, EncodedChunk, PlatformEncoder, RawFrame,
    VideoEncoderConfig, VideoFrame,
};
use zvd_flv::error::{Error, Result};
use zvd_flv::util::Buffer;

// ============================================================================
// Scripted encoder
// ============================================================================

/// What a scripted encoder has been asked to do
#[derive(Debug, Default)]
pub struct EncoderLog {
    pub configured: bool,
    pub frames: usize,
    pub key_requests: Vec<bool>,
    pub flushes: usize,
    pub closed: bool,
}

/// Platform encoder that forwards frames as chunks and records every call
///
/// Emits the decoder config on every output chunk unless told otherwise, so
/// tests can check that only the first one becomes a sequence header.
pub struct ScriptedEncoder<C, F> {
    log: Rc<RefCell<EncoderLog>>,
    decoder_config: Option<Buffer>,
    repeat_config: bool,
    hold: usize,
    held: VecDeque<EncodedChunk>,
    ready: VecDeque<EncodedChunk>,
    fail_after: Option<usize>,
    fail_close: bool,
    _marker: PhantomData<fn(C, F)>,
}

impl<C, F: RawFrame> ScriptedEncoder<C, F> {
    pub fn new(decoder_config: Option<Vec<u8>>) -> (Self, Rc<RefCell<EncoderLog>>) {
        let log = Rc::new(RefCell::new(EncoderLog::default()));
        let encoder = ScriptedEncoder {
            log: Rc::clone(&log),
            decoder_config: decoder_config.map(Buffer::from_vec),
            repeat_config: true,
            hold: 0,
            held: VecDeque::new(),
            ready: VecDeque::new(),
            fail_after: None,
            fail_close: false,
            _marker: PhantomData,
        };
        (encoder, log)
    }

    /// Keep the last `frames` frames until flushed
    pub fn holding(mut self, frames: usize) -> Self {
        self.hold = frames;
        self
    }

    /// Report a failure once `frames` frames have been accepted
    pub fn failing_after(mut self, frames: usize) -> Self {
        self.fail_after = Some(frames);
        self
    }

    /// Report a failure from `close`
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    fn release_held(&mut self, keep: usize) {
        while self.held.len() > keep {
            if let Some(chunk) = self.held.pop_front() {
                self.ready.push_back(chunk);
            }
        }
    }
}

impl<C, F: RawFrame> PlatformEncoder for ScriptedEncoder<C, F> {
    type Config = C;
    type Frame = F;

    fn configure(&mut self, _config: &C) -> Result<()> {
        self.log.borrow_mut().configured = true;
        Ok(())
    }

    fn encode(&mut self, frame: F, options: EncodeOptions) -> Result<()> {
        let frames = {
            let mut log = self.log.borrow_mut();
            log.frames += 1;
            log.key_requests.push(options.key_frame);
            log.frames
        };
        if let Some(limit) = self.fail_after {
            if frames > limit {
                return Err(Error::encoder("scripted failure"));
            }
        }

        let mut chunk = EncodedChunk::new(
            frame.data().clone(),
            frame.timestamp(),
            frame.is_key() || options.key_frame,
        );
        if self.repeat_config {
            chunk.decoder_config = self.decoder_config.clone();
        }
        self.held.push_back(chunk);
        self.release_held(self.hold);
        Ok(())
    }

    fn receive_chunk(&mut self) -> Result<EncodedChunk> {
        self.ready.pop_front().ok_or(Error::TryAgain)
    }

    fn flush(&mut self) -> Result<()> {
        self.log.borrow_mut().flushes += 1;
        self.release_held(0);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.log.borrow_mut().closed = true;
        if self.fail_close {
            return Err(Error::encoder("close failed"));
        }
        Ok(())
    }

    fn queue_size(&self) -> usize {
        self.held.len()
    }
}

pub type ScriptedAudioEncoder = ScriptedEncoder<AudioEncoderConfig, AudioFrame>;
pub type ScriptedVideoEncoder = ScriptedEncoder<VideoEncoderConfig, VideoFrame>;

// ============================================================================
// Frames and decoder configs
// ============================================================================

/// Minimal AVCDecoderConfigurationRecord
pub fn avc_config() -> Vec<u8> {
    vec![
        0x01, 0x64, 0x00, 0x28, 0xFF, 0xE1, 0x00, 0x04, 0x67, 0x64, 0x00, 0x28, 0x01, 0x00,
        0x02, 0x68, 0xEE,
    ]
}

/// AAC-LC, 44.1 kHz, stereo
pub fn aac_config() -> Vec<u8> {
    vec![0x12, 0x10]
}

/// Video frame at `timestamp_us` carrying a one-NAL payload
pub fn video_frame(timestamp_us: i64, key: bool) -> VideoFrame {
    let nal = if key { 0x65 } else { 0x41 };
    VideoFrame::new(Buffer::from_vec(vec![0, 0, 0, 1, nal]), 1280, 720, timestamp_us)
        .with_keyframe(key)
}

/// 1024-sample AAC frame at `timestamp_us`
pub fn audio_frame(timestamp_us: i64) -> AudioFrame {
    AudioFrame::new(Buffer::from_vec(vec![0x21, 0x10, 0x04]), 1024, 44_100, 2)
        .with_timestamp(timestamp_us)
}

// ============================================================================
// FLV tag walker
// ============================================================================

/// One tag read back from muxer output
#[derive(Debug, Clone)]
pub struct ParsedTag {
    pub tag_type: u8,
    pub timestamp: u32,
    /// Type-specific header plus payload
    pub data: Vec<u8>,
}

impl ParsedTag {
    pub fn is_audio(&self) -> bool {
        self.tag_type == 8
    }

    pub fn is_video(&self) -> bool {
        self.tag_type == 9
    }

    pub fn is_script(&self) -> bool {
        self.tag_type == 18
    }

    /// Sequence header tags carry packet type 0 in their second byte
    pub fn is_sequence_header(&self) -> bool {
        (self.is_audio() || self.is_video()) && self.data.len() > 1 && self.data[1] == 0
    }
}

/// Parse an FLV byte stream, checking the header and every back-pointer
pub fn parse_flv(bytes: &[u8]) -> (u8, Vec<ParsedTag>) {
    assert!(bytes.len() >= 13, "file shorter than the FLV header");
    assert_eq!(&bytes[..3], b"FLV");
    assert_eq!(bytes[3], 1);
    assert_eq!(&bytes[5..9], &[0, 0, 0, 9]);
    assert_eq!(&bytes[9..13], &[0, 0, 0, 0]);
    let flags = bytes[4];

    let mut tags = Vec::new();
    let mut pos = 13;
    while pos < bytes.len() {
        let tag = &bytes[pos..];
        assert!(tag.len() >= 15, "truncated tag at offset {}", pos);
        let size = u32::from_be_bytes([0, tag[1], tag[2], tag[3]]) as usize;
        let timestamp = u32::from_be_bytes([tag[7], tag[4], tag[5], tag[6]]);
        assert_eq!(&tag[8..11], &[0, 0, 0], "stream id must be zero");
        let end = 11 + size;
        let back = u32::from_be_bytes([tag[end], tag[end + 1], tag[end + 2], tag[end + 3]]);
        assert_eq!(back as usize, 11 + size, "back-pointer at offset {}", pos + end);

        tags.push(ParsedTag {
            tag_type: tag[0],
            timestamp,
            data: tag[11..end].to_vec(),
        });
        pos += end + 4;
    }
    (flags, tags)
}
