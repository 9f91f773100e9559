//! Encoder boundary
//!
//! The platform encoder is an external collaborator: it accepts raw frames,
//! is configured once, and hands back encoded chunks. It is modelled here as
//! a send/receive trait in the same shape as a software codec, so the track
//! wrapper can poll it after every frame and after a flush.

use crate::error::{Error, Result};
use crate::util::Buffer;
use serde::{Deserialize, Serialize};

/// Encoded output of the platform encoder
#[derive(Debug, Clone)]
pub struct EncodedChunk {
    /// Encoded bytes
    pub data: Buffer,
    /// Raw timestamp in microseconds on the encoder's clock
    pub timestamp: i64,
    /// Chunk is independently decodable
    pub is_key: bool,
    /// Decoder configuration record, when the encoder reports one
    pub decoder_config: Option<Buffer>,
}

impl EncodedChunk {
    pub fn new(data: Buffer, timestamp: i64, is_key: bool) -> Self {
        EncodedChunk {
            data,
            timestamp,
            is_key,
            decoder_config: None,
        }
    }

    pub fn with_decoder_config(mut self, config: Buffer) -> Self {
        self.decoder_config = Some(config);
        self
    }
}

/// Per-frame encode options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Force this frame to be coded as a keyframe
    pub key_frame: bool,
}

/// Platform encoder driven by an encoder track
pub trait PlatformEncoder {
    type Config;
    type Frame;

    /// Apply the encoder configuration
    fn configure(&mut self, config: &Self::Config) -> Result<()>;

    /// Send a frame to the encoder
    fn encode(&mut self, frame: Self::Frame, options: EncodeOptions) -> Result<()>;

    /// Receive an encoded chunk; `Error::TryAgain` when none is ready
    fn receive_chunk(&mut self) -> Result<EncodedChunk>;

    /// Drain everything the encoder is holding; returns once drained
    fn flush(&mut self) -> Result<()>;

    /// Release the encoder
    fn close(&mut self) -> Result<()>;

    /// Frames accepted but not yet emitted
    fn queue_size(&self) -> usize {
        0
    }
}

/// Video encoder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoEncoderConfig {
    /// Codec string, e.g. `avc1.640028`
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub framerate: f64,
    /// Target bitrate in bits per second
    pub bitrate: u64,
    /// Force a keyframe every N frames; 0 leaves it to the encoder
    pub keyframe_interval: u32,
}

impl VideoEncoderConfig {
    pub fn new(codec: &str, width: u32, height: u32) -> Self {
        VideoEncoderConfig {
            codec: codec.to_string(),
            width,
            height,
            ..Default::default()
        }
    }

    pub fn with_framerate(mut self, framerate: f64) -> Self {
        self.framerate = framerate;
        self
    }

    pub fn with_bitrate(mut self, bitrate: u64) -> Self {
        self.bitrate = bitrate;
        self
    }

    pub fn with_keyframe_interval(mut self, interval: u32) -> Self {
        self.keyframe_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::config(format!(
                "invalid video dimensions {}x{}",
                self.width, self.height
            )));
        }
        if !(self.framerate > 0.0) {
            return Err(Error::config(format!("invalid framerate {}", self.framerate)));
        }
        Ok(())
    }
}

impl Default for VideoEncoderConfig {
    fn default() -> Self {
        VideoEncoderConfig {
            codec: "avc1.42001f".to_string(),
            width: 1280,
            height: 720,
            framerate: 30.0,
            bitrate: 2_000_000,
            keyframe_interval: 60,
        }
    }
}

/// Audio encoder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioEncoderConfig {
    /// Codec string, e.g. `mp4a.40.2`
    pub codec: String,
    pub sample_rate: u32,
    pub channel_count: u16,
    /// Target bitrate in bits per second
    pub bitrate: u64,
}

impl AudioEncoderConfig {
    pub fn new(codec: &str, sample_rate: u32, channel_count: u16) -> Self {
        AudioEncoderConfig {
            codec: codec.to_string(),
            sample_rate,
            channel_count,
            ..Default::default()
        }
    }

    pub fn with_bitrate(mut self, bitrate: u64) -> Self {
        self.bitrate = bitrate;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::config("audio sample rate must be non-zero"));
        }
        if !(1..=2).contains(&self.channel_count) {
            return Err(Error::config(format!(
                "FLV carries mono or stereo audio, got {} channels",
                self.channel_count
            )));
        }
        Ok(())
    }
}

impl Default for AudioEncoderConfig {
    fn default() -> Self {
        AudioEncoderConfig {
            codec: "mp4a.40.2".to_string(),
            sample_rate: 44_100,
            channel_count: 2,
            bitrate: 128_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_config_builder() {
        let config = VideoEncoderConfig::new("avc1.640028", 1920, 1080)
            .with_framerate(25.0)
            .with_bitrate(4_000_000)
            .with_keyframe_interval(50);
        assert_eq!(config.width, 1920);
        assert_eq!(config.keyframe_interval, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let bad = VideoEncoderConfig::new("avc1.640028", 0, 720);
        assert!(bad.validate().is_err());

        let audio = AudioEncoderConfig::new("mp4a.40.2", 48_000, 6);
        assert!(matches!(audio.validate(), Err(Error::Config(_))));
        assert!(AudioEncoderConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_from_json_uses_defaults() {
        let config: AudioEncoderConfig =
            serde_json::from_str(r#"{"sample_rate": 48000}"#).unwrap();
        assert_eq!(config.sample_rate, 48_000);
        assert_eq!(config.channel_count, 2);
        assert_eq!(config.codec, "mp4a.40.2");
    }
}
