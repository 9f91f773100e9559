//! FLV (Flash Video) container format
//!
//! FLV is Adobe's container format primarily used for web streaming.
//! Still widely used for RTMP ingest and HTTP-FLV live delivery.
//!
//! File layout: a 9-byte header followed by `PreviousTagSize0` (always zero),
//! then a run of tags. Each tag is an 11-byte tag header, a type-specific
//! header, the payload, and a trailing 4-byte back-pointer holding the size of
//! the whole tag (`11 + data_size`).

pub mod encoder;
pub mod metadata;
pub mod muxer;
pub mod strategy;

pub use encoder::FlvEncoder;
pub use metadata::build_metadata;
pub use muxer::FlvMuxer;
pub use strategy::{MuxStrategy, StrategyTable};

use crate::error::{Error, Result};
use crate::util::ByteWriter;

/// Size of the fixed FLV file header
pub const FLV_HEADER_SIZE: u32 = 9;

/// Size of the fixed tag header preceding every tag body
pub const TAG_HEADER_SIZE: u32 = 11;

/// Largest body a tag's 24-bit size field can describe
pub const MAX_TAG_DATA_SIZE: usize = 0x00FF_FFFF;

/// FLV file header
#[derive(Debug, Clone)]
pub struct FlvHeader {
    pub signature: [u8; 3], // "FLV"
    pub version: u8,        // Always 1
    pub has_video: bool,
    pub has_audio: bool,
    pub data_offset: u32, // Offset to first tag (always 9)
}

impl FlvHeader {
    pub fn new(has_video: bool, has_audio: bool) -> Self {
        FlvHeader {
            signature: *b"FLV",
            version: 1,
            has_video,
            has_audio,
            data_offset: FLV_HEADER_SIZE,
        }
    }

    /// Type flags byte: bit 0 video, bit 2 audio
    pub fn flags(&self) -> u8 {
        let mut flags = 0u8;
        if self.has_video {
            flags |= 0x01;
        }
        if self.has_audio {
            flags |= 0x04;
        }
        flags
    }

    /// Write the 9-byte header
    pub fn write_to(&self, writer: &mut ByteWriter) {
        writer.write_bytes(&self.signature);
        writer.write_u8(self.version);
        writer.write_u8(self.flags());
        writer.write_u32(self.data_offset);
    }
}

/// FLV tag type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlvTagType {
    Audio = 8,
    Video = 9,
    ScriptData = 18,
}

impl FlvTagType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            8 => Some(FlvTagType::Audio),
            9 => Some(FlvTagType::Video),
            18 => Some(FlvTagType::ScriptData),
            _ => None,
        }
    }
}

/// FLV tag header
#[derive(Debug, Clone)]
pub struct FlvTagHeader {
    pub tag_type: FlvTagType,
    pub data_size: u32, // Size of tag data (24 bits)
    pub timestamp: u32, // Timestamp in milliseconds (24 bits + 8 bit extension)
    pub stream_id: u32, // Always 0 (24 bits)
}

impl FlvTagHeader {
    pub fn new(tag_type: FlvTagType, data_size: u32, timestamp: u32) -> Self {
        FlvTagHeader {
            tag_type,
            data_size,
            timestamp,
            stream_id: 0,
        }
    }

    /// Write the 11-byte tag header
    pub fn write_to(&self, writer: &mut ByteWriter) -> Result<()> {
        if self.data_size as usize > MAX_TAG_DATA_SIZE {
            return Err(Error::format(format!(
                "tag data size {} exceeds 24-bit limit",
                self.data_size
            )));
        }

        writer.write_u8(self.tag_type as u8);
        writer.write_u24(self.data_size);

        // Lower 24 bits, then the extension byte carrying bits 24..32
        writer.write_u24(self.timestamp & 0x00FF_FFFF);
        writer.write_u8((self.timestamp >> 24) as u8);

        writer.write_u24(self.stream_id);
        Ok(())
    }
}

/// Video codec IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlvVideoCodec {
    H263 = 2,
    ScreenVideo = 3,
    VP6 = 4,
    VP6Alpha = 5,
    ScreenVideo2 = 6,
    AVC = 7, // H.264
}

impl FlvVideoCodec {
    /// Map a codec string such as `avc1.640028` to its FLV id
    pub fn from_codec_string(codec: &str) -> Result<Self> {
        let lower = codec.to_ascii_lowercase();
        if lower.starts_with("avc1") || lower.starts_with("avc3") || lower == "h264" {
            Ok(FlvVideoCodec::AVC)
        } else {
            Err(Error::unsupported(format!("video codec for FLV: {}", codec)))
        }
    }
}

/// Audio codec IDs (SoundFormat)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum FlvAudioCodec {
    PCM = 0,
    ADPCM = 1,
    MP3 = 2,
    PCMLittleEndian = 3,
    Nellymoser16kHz = 4,
    Nellymoser8kHz = 5,
    Nellymoser = 6,
    G711ALaw = 7,
    G711MuLaw = 8,
    AAC = 10,
    Speex = 11,
    MP3_8kHz = 14,
}

impl FlvAudioCodec {
    /// Map a codec string such as `mp4a.40.2` to its FLV id
    pub fn from_codec_string(codec: &str) -> Result<Self> {
        let lower = codec.to_ascii_lowercase();
        if lower == "mp3" || lower == "mp4a.6b" || lower == "mp4a.69" {
            Ok(FlvAudioCodec::MP3)
        } else if lower.starts_with("mp4a") || lower == "aac" {
            Ok(FlvAudioCodec::AAC)
        } else {
            Err(Error::unsupported(format!("audio codec for FLV: {}", codec)))
        }
    }

    /// Formats whose tag header carries a packet type byte
    pub fn has_packet_type(self) -> bool {
        self == FlvAudioCodec::AAC
    }
}

/// Video frame type (upper nibble of the first video header byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    KeyFrame = 1,
    InterFrame = 2,
    DisposableInterFrame = 3,
    GeneratedKeyFrame = 4,
    VideoInfo = 5,
}

/// AVC packet type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvcPacketType {
    SequenceHeader = 0,
    Nalu = 1,
    EndOfSequence = 2,
}

/// AAC packet type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AacPacketType {
    SequenceHeader = 0,
    Raw = 1,
}

/// Sampling rate field of the audio header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundRate {
    KHz5_5 = 0,
    KHz11 = 1,
    KHz22 = 2,
    KHz44 = 3,
}

impl SoundRate {
    /// Nearest rate field for a sample rate in Hz
    pub fn from_sample_rate(sample_rate: u32) -> Self {
        match sample_rate {
            0..=8_000 => SoundRate::KHz5_5,
            8_001..=16_000 => SoundRate::KHz11,
            16_001..=32_000 => SoundRate::KHz22,
            _ => SoundRate::KHz44,
        }
    }
}

/// Sample size field of the audio header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundSize {
    Bits8 = 0,
    Bits16 = 1,
}

/// Channel layout field of the audio header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundType {
    Mono = 0,
    Stereo = 1,
}

/// Type-specific header of a video tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoTagHeader {
    pub frame_type: FrameType,
    pub codec: FlvVideoCodec,
    pub packet_type: AvcPacketType,
    /// Composition time offset in milliseconds (signed 24-bit)
    pub composition_offset: i32,
}

impl VideoTagHeader {
    /// Header for an AVC decoder configuration record
    pub fn sequence_header(codec: FlvVideoCodec) -> Self {
        VideoTagHeader {
            frame_type: FrameType::KeyFrame,
            codec,
            packet_type: AvcPacketType::SequenceHeader,
            composition_offset: 0,
        }
    }

    /// Header for a coded frame
    pub fn nalu(codec: FlvVideoCodec, keyframe: bool) -> Self {
        VideoTagHeader {
            frame_type: if keyframe {
                FrameType::KeyFrame
            } else {
                FrameType::InterFrame
            },
            codec,
            packet_type: AvcPacketType::Nalu,
            composition_offset: 0,
        }
    }

    pub fn write_to(&self, writer: &mut ByteWriter) {
        writer.write_u8(((self.frame_type as u8) << 4) | (self.codec as u8 & 0x0F));
        writer.write_u8(self.packet_type as u8);
        writer.write_i24(self.composition_offset);
    }
}

/// Type-specific header of an audio tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioTagHeader {
    pub format: FlvAudioCodec,
    pub rate: SoundRate,
    pub size: SoundSize,
    pub sound_type: SoundType,
    /// Present only for formats that need it (AAC)
    pub aac_packet_type: Option<AacPacketType>,
}

impl AudioTagHeader {
    /// Header for a track's codec and layout
    ///
    /// AAC streams always signal 44 kHz, 16-bit stereo; readers take the real
    /// layout from the AudioSpecificConfig.
    pub fn for_track(format: FlvAudioCodec, sample_rate: u32, channels: u16) -> Self {
        let (rate, sound_type) = if format == FlvAudioCodec::AAC {
            (SoundRate::KHz44, SoundType::Stereo)
        } else if channels > 1 {
            (SoundRate::from_sample_rate(sample_rate), SoundType::Stereo)
        } else {
            (SoundRate::from_sample_rate(sample_rate), SoundType::Mono)
        };
        AudioTagHeader {
            format,
            rate,
            size: SoundSize::Bits16,
            sound_type,
            aac_packet_type: None,
        }
    }

    /// Packed first byte: `format<<4 | rate<<2 | size<<1 | type`
    pub fn flags(&self) -> u8 {
        ((self.format as u8) << 4)
            | ((self.rate as u8) << 2)
            | ((self.size as u8) << 1)
            | self.sound_type as u8
    }

    /// Same header with a different AAC packet type
    pub fn with_packet_type(mut self, packet_type: AacPacketType) -> Self {
        if self.format.has_packet_type() {
            self.aac_packet_type = Some(packet_type);
        }
        self
    }

    pub fn write_to(&self, writer: &mut ByteWriter) {
        writer.write_u8(self.flags());
        if let Some(packet_type) = self.aac_packet_type {
            writer.write_u8(packet_type as u8);
        }
    }
}
