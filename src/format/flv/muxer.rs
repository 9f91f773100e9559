//! FLV muxer
//!
//! Top level of a muxing session. The muxer owns the stream processor and the
//! tag encoder, writes the file header and `onMetaData` once, then one tag per
//! chunk the processor publishes. Writes go straight to the sink, so a slow
//! sink holds back the caller pushing frames.

use super::encoder::FlvEncoder;
use super::metadata::build_metadata;
use super::strategy::StrategyTable;
use super::{FlvAudioCodec, FlvVideoCodec};
use crate::codec::encoder::{AudioEncoderConfig, VideoEncoderConfig};
use crate::codec::frame::{AudioFrame, VideoFrame};
use crate::error::{Error, Result};
use crate::format::chunk::TrackChunk;
use crate::streaming::processor::{ProcessorState, StreamProcessor};
use crate::streaming::queue::QueueConfig;
use crate::streaming::track::{Audio, BoxedEncoder, Video};
use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::{debug, error, info, warn};

/// Encoder name written to `onMetaData`
pub const DEFAULT_ENCODER_NAME: &str = "zvd-flv";

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxerOptions {
    pub video: Option<VideoEncoderConfig>,
    pub audio: Option<AudioEncoderConfig>,
    pub queue: QueueConfig,
    pub encoder_name: String,
    /// Drop video data until the first keyframe
    pub wait_for_keyframe: bool,
}

impl MuxerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_video(mut self, config: VideoEncoderConfig) -> Self {
        self.video = Some(config);
        self
    }

    pub fn with_audio(mut self, config: AudioEncoderConfig) -> Self {
        self.audio = Some(config);
        self
    }

    pub fn with_queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    pub fn with_encoder_name(mut self, name: &str) -> Self {
        self.encoder_name = name.to_string();
        self
    }

    pub fn with_wait_for_keyframe(mut self, wait: bool) -> Self {
        self.wait_for_keyframe = wait;
        self
    }

    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }
}

impl Default for MuxerOptions {
    fn default() -> Self {
        MuxerOptions {
            video: None,
            audio: None,
            queue: QueueConfig::default(),
            encoder_name: DEFAULT_ENCODER_NAME.to_string(),
            wait_for_keyframe: false,
        }
    }
}

/// FLV muxer writing to any byte sink
pub struct FlvMuxer<W: Write> {
    writer: W,
    options: MuxerOptions,
    encoder: FlvEncoder,
    processor: StreamProcessor,
    strategies: StrategyTable,
    started: bool,
    last_timestamp: Option<u32>,
    tags_written: u64,
    bytes_written: u64,
}

impl<W: Write> FlvMuxer<W> {
    /// Create a muxer; tracks are added with `configure_audio`/`configure_video`
    ///
    /// Encoder configs already present in `options` only describe the session
    /// until a track is configured with them.
    pub fn new(writer: W, options: MuxerOptions) -> Self {
        let processor = StreamProcessor::new(options.queue.clone())
            .with_wait_for_keyframe(options.wait_for_keyframe);
        FlvMuxer {
            writer,
            options,
            encoder: FlvEncoder::new(),
            processor,
            strategies: StrategyTable::new(),
            started: false,
            last_timestamp: None,
            tags_written: 0,
            bytes_written: 0,
        }
    }

    /// Add the audio track
    pub fn configure_audio(
        &mut self,
        encoder: BoxedEncoder<Audio>,
        config: AudioEncoderConfig,
    ) -> Result<()> {
        let format = FlvAudioCodec::from_codec_string(&config.codec)?;
        self.processor.add_audio_track(encoder, config.clone())?;
        self.strategies
            .register_audio(format, config.sample_rate, config.channel_count);
        self.options.audio = Some(config);
        Ok(())
    }

    /// Add the video track
    pub fn configure_video(
        &mut self,
        encoder: BoxedEncoder<Video>,
        config: VideoEncoderConfig,
    ) -> Result<()> {
        let codec = FlvVideoCodec::from_codec_string(&config.codec)?;
        self.processor.add_video_track(encoder, config.clone())?;
        self.strategies.register_video(codec);
        self.options.video = Some(config);
        Ok(())
    }

    /// Start recording; the header and metadata go out on the first start
    pub fn start(&mut self) -> Result<()> {
        if !self.processor.has_audio() && !self.processor.has_video() {
            return Err(Error::NotConfigured);
        }
        self.processor.start()?;

        if !self.started {
            self.write_header()?;
            self.started = true;
        }
        info!(
            "FLV session started (video: {}, audio: {})",
            self.processor.has_video(),
            self.processor.has_audio()
        );
        Ok(())
    }

    /// Feed a raw audio frame
    pub fn push_audio_frame(&mut self, frame: AudioFrame) -> Result<()> {
        let result = self.processor.push_audio_frame(frame);
        self.write_processed(result)
    }

    /// Feed a raw video frame
    pub fn push_video_frame(&mut self, frame: VideoFrame) -> Result<()> {
        let result = self.processor.push_video_frame(frame);
        self.write_processed(result)
    }

    /// Pause recording; encoder output produced so far is written out
    pub fn pause(&mut self) -> Result<()> {
        let result = self.processor.pause();
        let written = self.write_processed(result);
        let flushed = self.writer.flush();
        written?;
        flushed?;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        self.processor.resume()
    }

    /// End the session, writing everything still buffered
    ///
    /// An encoder that fails to close is reported after the remaining tags
    /// have been written.
    pub fn stop(&mut self) -> Result<()> {
        if self.processor.state() == ProcessorState::Inactive {
            return Ok(());
        }
        let result = self.processor.stop();
        let written = self.write_processed(result);
        let flushed = self.writer.flush();
        self.strategies.clear();
        info!(
            "FLV session stopped: {} tags, {} bytes",
            self.tags_written, self.bytes_written
        );
        written?;
        flushed?;
        Ok(())
    }

    pub fn state(&self) -> ProcessorState {
        self.processor.state()
    }

    pub fn options(&self) -> &MuxerOptions {
        &self.options
    }

    pub fn processor(&self) -> &StreamProcessor {
        &self.processor
    }

    /// Tags written, including the metadata tag
    pub fn tags_written(&self) -> u64 {
        self.tags_written
    }

    /// Bytes written, including the file header
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Stop the session if needed and hand back the sink
    pub fn finish(mut self) -> Result<W> {
        self.stop()?;
        self.writer.flush()?;
        Ok(self.writer)
    }

    fn write_header(&mut self) -> Result<()> {
        let header = self
            .encoder
            .header(self.processor.has_video(), self.processor.has_audio());
        self.write_bytes(&header)?;

        // Describe only the tracks that were actually configured
        let mut described = self.options.clone();
        if !self.processor.has_video() {
            described.video = None;
        }
        if !self.processor.has_audio() {
            described.audio = None;
        }
        let metadata = build_metadata(&described);
        let tag = self.encoder.metadata_tag(&metadata)?;
        self.write_bytes(&tag)?;
        self.tags_written += 1;
        debug!("Wrote FLV header and onMetaData ({} keys)", metadata.len());
        Ok(())
    }

    /// Write a processor batch; on failure, write what it released first
    fn write_processed(&mut self, result: Result<Vec<TrackChunk>>) -> Result<()> {
        match result {
            Ok(chunks) => self.write_chunks(chunks),
            Err(e) => {
                let released = self.processor.take_undelivered();
                if !released.is_empty() {
                    warn!("Writing {} chunks released before error: {}", released.len(), e);
                    self.write_chunks(released)?;
                }
                Err(e)
            }
        }
    }

    fn write_chunks(&mut self, chunks: Vec<TrackChunk>) -> Result<()> {
        for chunk in chunks {
            self.write_chunk(&chunk)?;
        }
        Ok(())
    }

    fn write_chunk(&mut self, chunk: &TrackChunk) -> Result<()> {
        let tag = match self.strategies.process(chunk, &mut self.encoder)? {
            Some(tag) => tag,
            None => return Ok(()),
        };

        if !chunk.kind.is_sequence_header() {
            let timestamp = chunk.tag_timestamp();
            if let Some(last) = self.last_timestamp {
                if timestamp < last {
                    warn!(
                        "{:?} tag timestamp went backwards: {} < {}",
                        chunk.kind, timestamp, last
                    );
                }
            }
            self.last_timestamp = Some(timestamp);
        }

        self.write_bytes(&tag)?;
        self.tags_written += 1;
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if let Err(e) = self.writer.write_all(bytes) {
            error!("FLV sink write failed: {}", e);
            return Err(Error::Io(e));
        }
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }
}
