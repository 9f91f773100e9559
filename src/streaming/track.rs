//! Encoder tracks
//!
//! An [`EncoderTrack`] wraps one platform encoder and turns its output into
//! [`TrackChunk`]s on the shared session clock. The audio and video flavours
//! differ only in their [`TrackKind`]: the config and frame types, codec
//! validation, and the keyframe policy (video only).

use super::clock::SessionClock;
use super::queue::{ChunkQueue, QueueConfig};
use crate::codec::encoder::{
    AudioEncoderConfig, EncodeOptions, EncodedChunk, PlatformEncoder, VideoEncoderConfig,
};
use crate::codec::frame::{AudioFrame, VideoFrame};
use crate::error::{Error, Result};
use crate::format::chunk::TrackChunk;
use crate::format::flv::{FlvAudioCodec, FlvVideoCodec};
use crate::util::MediaKind;
use std::fmt;
use tracing::{debug, trace};

/// Boxed platform encoder for a track kind
pub type BoxedEncoder<K> = Box<
    dyn PlatformEncoder<Config = <K as TrackKind>::Config, Frame = <K as TrackKind>::Frame>,
>;

/// Per-kind behaviour of an encoder track
pub trait TrackKind {
    type Config: Clone + fmt::Debug;
    type Frame;

    const MEDIA: MediaKind;

    /// Reject configurations FLV cannot carry
    fn validate(config: &Self::Config) -> Result<()>;

    /// Whether the codec announces itself with a sequence header
    fn has_sequence_header(config: &Self::Config) -> bool;

    /// Whether frame number `index` must be coded as a keyframe
    fn force_key_frame(_config: &Self::Config, _index: u64) -> bool {
        false
    }
}

/// Audio track kind
#[derive(Debug, Clone, Copy)]
pub struct Audio;

/// Video track kind
#[derive(Debug, Clone, Copy)]
pub struct Video;

impl TrackKind for Audio {
    type Config = AudioEncoderConfig;
    type Frame = AudioFrame;

    const MEDIA: MediaKind = MediaKind::Audio;

    fn validate(config: &AudioEncoderConfig) -> Result<()> {
        FlvAudioCodec::from_codec_string(&config.codec)?;
        config.validate()
    }

    fn has_sequence_header(config: &AudioEncoderConfig) -> bool {
        FlvAudioCodec::from_codec_string(&config.codec)
            .map(FlvAudioCodec::has_packet_type)
            .unwrap_or(false)
    }
}

impl TrackKind for Video {
    type Config = VideoEncoderConfig;
    type Frame = VideoFrame;

    const MEDIA: MediaKind = MediaKind::Video;

    fn validate(config: &VideoEncoderConfig) -> Result<()> {
        FlvVideoCodec::from_codec_string(&config.codec)?;
        config.validate()
    }

    fn has_sequence_header(_config: &VideoEncoderConfig) -> bool {
        true
    }

    fn force_key_frame(config: &VideoEncoderConfig, index: u64) -> bool {
        config.keyframe_interval > 0 && index % config.keyframe_interval as u64 == 0
    }
}

/// Chunks a track has produced but the merge has not released, plus the
/// track's high-water mark
#[derive(Debug)]
pub struct TrackBuffer {
    pub queue: ChunkQueue,
    /// Latest data timestamp that arrived from this track
    pub last_timestamp: f64,
}

impl TrackBuffer {
    pub fn new(kind: MediaKind, config: &QueueConfig) -> Self {
        TrackBuffer {
            queue: ChunkQueue::new(kind, config),
            last_timestamp: 0.0,
        }
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.last_timestamp = 0.0;
    }
}

/// Wrapper around one platform encoder
pub struct EncoderTrack<K: TrackKind> {
    encoder: BoxedEncoder<K>,
    config: K::Config,
    buffer: TrackBuffer,
    sequence_header_sent: bool,
    frame_count: u64,
    last_data_timestamp: Option<f64>,
    max_encode_queue: usize,
    wait_for_keyframe: bool,
    seen_key_frame: bool,
}

impl<K: TrackKind> EncoderTrack<K> {
    /// Validate and apply `config`, taking ownership of the encoder
    pub fn new(mut encoder: BoxedEncoder<K>, config: K::Config, queue: &QueueConfig) -> Result<Self> {
        K::validate(&config)?;
        encoder.configure(&config)?;
        debug!("Configured {} encoder: {:?}", K::MEDIA, config);

        Ok(EncoderTrack {
            encoder,
            config,
            buffer: TrackBuffer::new(K::MEDIA, queue),
            sequence_header_sent: false,
            frame_count: 0,
            last_data_timestamp: None,
            max_encode_queue: queue.max_encode_queue,
            wait_for_keyframe: false,
            seen_key_frame: false,
        })
    }

    /// Discard data chunks until the encoder produces a keyframe
    pub fn with_wait_for_keyframe(mut self, wait: bool) -> Self {
        self.wait_for_keyframe = wait;
        self
    }

    pub fn media(&self) -> MediaKind {
        K::MEDIA
    }

    pub fn config(&self) -> &K::Config {
        &self.config
    }

    pub fn sequence_header_sent(&self) -> bool {
        self.sequence_header_sent
    }

    /// Frames handed to the encoder since the last reset
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn buffer(&self) -> &TrackBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut TrackBuffer {
        &mut self.buffer
    }

    /// Send a raw frame to the encoder and collect whatever it emits
    pub fn encode(&mut self, frame: K::Frame, clock: &mut SessionClock) -> Result<Vec<TrackChunk>> {
        let mut out = Vec::new();

        if self.max_encode_queue > 0 && self.encoder.queue_size() >= self.max_encode_queue {
            debug!(
                "{} encoder saturated ({} pending), dropping frame",
                K::MEDIA,
                self.encoder.queue_size()
            );
            return Ok(out);
        }

        let options = EncodeOptions {
            key_frame: K::force_key_frame(&self.config, self.frame_count),
        };
        self.encoder.encode(frame, options)?;
        self.frame_count += 1;

        self.drain_encoder(clock, &mut out)?;
        Ok(out)
    }

    /// Drain the encoder's pipeline and collect the remaining output
    pub fn flush(&mut self, clock: &mut SessionClock) -> Result<Vec<TrackChunk>> {
        let mut out = Vec::new();
        self.encoder.flush()?;
        self.drain_encoder(clock, &mut out)?;
        debug!("Flushed {} encoder: {} chunks", K::MEDIA, out.len());
        Ok(out)
    }

    /// Clear the per-session latches; the session clock is reset by its owner
    pub fn reset(&mut self) {
        self.sequence_header_sent = false;
        self.frame_count = 0;
        self.last_data_timestamp = None;
        self.seen_key_frame = false;
        self.buffer.clear();
    }

    /// Release the encoder
    pub fn close(&mut self) -> Result<()> {
        self.buffer.clear();
        self.encoder.close()
    }

    fn drain_encoder(&mut self, clock: &mut SessionClock, out: &mut Vec<TrackChunk>) -> Result<()> {
        loop {
            match self.encoder.receive_chunk() {
                Ok(chunk) => self.handle_output(chunk, clock, out),
                Err(Error::TryAgain) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    fn handle_output(&mut self, chunk: EncodedChunk, clock: &mut SessionClock, out: &mut Vec<TrackChunk>) {
        if let Some(config) = chunk.decoder_config {
            if self.sequence_header_sent {
                trace!("Ignoring repeated {} decoder config", K::MEDIA);
            } else {
                debug!("Captured {} sequence header ({} bytes)", K::MEDIA, config.len());
                self.sequence_header_sent = true;
                out.push(TrackChunk::sequence_header(K::MEDIA, config));
            }
        }

        let mut timestamp = clock.relative_ms(chunk.timestamp);

        if K::MEDIA == MediaKind::Video && self.wait_for_keyframe && !self.seen_key_frame {
            if !chunk.is_key {
                debug!("Discarding video chunk at {}ms before first keyframe", timestamp);
                return;
            }
            self.seen_key_frame = true;
        }

        if let Some(previous) = self.last_data_timestamp {
            if timestamp < previous {
                debug!(
                    "{} timestamp went backwards ({} < {}), clamping",
                    K::MEDIA,
                    timestamp,
                    previous
                );
                timestamp = previous;
            }
        }
        self.last_data_timestamp = Some(timestamp);

        out.push(TrackChunk::data(K::MEDIA, chunk.data, timestamp, chunk.is_key));
    }
}

impl<K: TrackKind> fmt::Debug for EncoderTrack<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderTrack")
            .field("media", &K::MEDIA)
            .field("config", &self.config)
            .field("sequence_header_sent", &self.sequence_header_sent)
            .field("frame_count", &self.frame_count)
            .field("queued", &self.buffer.queue.len())
            .finish()
    }
}
