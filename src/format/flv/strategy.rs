//! Chunk kind to tag routine mapping
//!
//! Every published [`TrackChunk`] is turned into exactly one FLV tag by the
//! strategy registered for its [`ChunkKind`].

use super::encoder::FlvEncoder;
use super::{AacPacketType, AudioTagHeader, FlvAudioCodec, FlvVideoCodec, VideoTagHeader};
use crate::error::{Error, Result};
use crate::format::chunk::{ChunkKind, TrackChunk};
use bytes::Bytes;
use std::collections::HashMap;
use tracing::debug;

/// Builds the tag for one chunk kind
pub trait MuxStrategy: Send {
    /// Encode `chunk`; `None` when the codec carries no tag for it
    fn process(&self, chunk: &TrackChunk, encoder: &mut FlvEncoder) -> Result<Option<Bytes>>;
}

/// Video decoder configuration record at timestamp 0
pub struct VideoSequenceHeaderStrategy {
    codec: FlvVideoCodec,
}

impl MuxStrategy for VideoSequenceHeaderStrategy {
    fn process(&self, chunk: &TrackChunk, encoder: &mut FlvEncoder) -> Result<Option<Bytes>> {
        let header = VideoTagHeader::sequence_header(self.codec);
        encoder
            .video_tag(&header, 0, chunk.payload.as_slice())
            .map(Some)
    }
}

/// Coded video frame, key or inter
pub struct VideoDataStrategy {
    codec: FlvVideoCodec,
}

impl MuxStrategy for VideoDataStrategy {
    fn process(&self, chunk: &TrackChunk, encoder: &mut FlvEncoder) -> Result<Option<Bytes>> {
        let header = VideoTagHeader::nalu(self.codec, chunk.is_key_frame);
        encoder
            .video_tag(&header, chunk.tag_timestamp(), chunk.payload.as_slice())
            .map(Some)
    }
}

/// Audio specific config at timestamp 0
pub struct AudioSequenceHeaderStrategy {
    header: AudioTagHeader,
}

impl MuxStrategy for AudioSequenceHeaderStrategy {
    fn process(&self, chunk: &TrackChunk, encoder: &mut FlvEncoder) -> Result<Option<Bytes>> {
        if !self.header.format.has_packet_type() {
            debug!(
                "{:?} has no sequence header tag, skipping {} bytes",
                self.header.format,
                chunk.payload.len()
            );
            return Ok(None);
        }
        let header = self.header.with_packet_type(AacPacketType::SequenceHeader);
        encoder
            .audio_tag(&header, 0, chunk.payload.as_slice())
            .map(Some)
    }
}

/// Raw audio frame
pub struct AudioDataStrategy {
    header: AudioTagHeader,
}

impl MuxStrategy for AudioDataStrategy {
    fn process(&self, chunk: &TrackChunk, encoder: &mut FlvEncoder) -> Result<Option<Bytes>> {
        let header = self.header.with_packet_type(AacPacketType::Raw);
        encoder
            .audio_tag(&header, chunk.tag_timestamp(), chunk.payload.as_slice())
            .map(Some)
    }
}

/// Strategies keyed by chunk kind
#[derive(Default)]
pub struct StrategyTable {
    strategies: HashMap<ChunkKind, Box<dyn MuxStrategy>>,
}

impl StrategyTable {
    pub fn new() -> Self {
        StrategyTable {
            strategies: HashMap::new(),
        }
    }

    /// Register the video strategies for `codec`
    pub fn register_video(&mut self, codec: FlvVideoCodec) {
        self.register(
            ChunkKind::VideoSequenceHeader,
            Box::new(VideoSequenceHeaderStrategy { codec }),
        );
        self.register(ChunkKind::VideoData, Box::new(VideoDataStrategy { codec }));
    }

    /// Register the audio strategies for a track
    pub fn register_audio(&mut self, format: FlvAudioCodec, sample_rate: u32, channels: u16) {
        let header = AudioTagHeader::for_track(format, sample_rate, channels);
        self.register(
            ChunkKind::AudioSequenceHeader,
            Box::new(AudioSequenceHeaderStrategy { header }),
        );
        self.register(ChunkKind::AudioData, Box::new(AudioDataStrategy { header }));
    }

    /// Replace the strategy for a chunk kind
    pub fn register(&mut self, kind: ChunkKind, strategy: Box<dyn MuxStrategy>) {
        self.strategies.insert(kind, strategy);
    }

    pub fn contains(&self, kind: ChunkKind) -> bool {
        self.strategies.contains_key(&kind)
    }

    pub fn clear(&mut self) {
        self.strategies.clear();
    }

    /// Encode a chunk with the strategy registered for its kind
    pub fn process(&self, chunk: &TrackChunk, encoder: &mut FlvEncoder) -> Result<Option<Bytes>> {
        match self.strategies.get(&chunk.kind) {
            Some(strategy) => strategy.process(chunk, encoder),
            None => Err(Error::invalid_input(format!(
                "no tag strategy for {:?}",
                chunk.kind
            ))),
        }
    }
}
