//! Passthrough encoder
//!
//! Treats every incoming frame as an already-encoded access unit and hands it
//! back unchanged. Useful for remuxing pre-encoded elementary streams and for
//! driving a session without a platform encoder.

use super::encoder::{EncodeOptions, EncodedChunk, PlatformEncoder};
use super::frame::RawFrame;
use crate::error::{Error, Result};
use crate::util::Buffer;
use std::collections::VecDeque;
use std::marker::PhantomData;
use tracing::trace;

/// Encoder that forwards frame data as encoded chunks
pub struct PassthroughEncoder<C, F> {
    decoder_config: Option<Buffer>,
    config_sent: bool,
    /// Frames held back before output starts flowing
    latency: usize,
    pending: VecDeque<EncodedChunk>,
    ready: VecDeque<EncodedChunk>,
    configured: bool,
    closed: bool,
    _marker: PhantomData<fn(C, F)>,
}

impl<C, F: RawFrame> PassthroughEncoder<C, F> {
    /// `decoder_config` is attached to the first chunk emitted
    pub fn new(decoder_config: Option<Buffer>) -> Self {
        PassthroughEncoder {
            decoder_config,
            config_sent: false,
            latency: 0,
            pending: VecDeque::new(),
            ready: VecDeque::new(),
            configured: false,
            closed: false,
            _marker: PhantomData,
        }
    }

    /// Hold back `frames` frames, emulating encoder pipeline delay
    pub fn with_latency(mut self, frames: usize) -> Self {
        self.latency = frames;
        self
    }

    fn attach_config(&mut self, mut chunk: EncodedChunk) -> EncodedChunk {
        if !self.config_sent {
            if let Some(config) = self.decoder_config.clone() {
                chunk.decoder_config = Some(config);
            }
            self.config_sent = true;
        }
        chunk
    }
}

impl<C, F: RawFrame> PlatformEncoder for PassthroughEncoder<C, F> {
    type Config = C;
    type Frame = F;

    fn configure(&mut self, _config: &C) -> Result<()> {
        if self.closed {
            return Err(Error::invalid_state("encoder is closed"));
        }
        self.configured = true;
        Ok(())
    }

    fn encode(&mut self, frame: F, options: EncodeOptions) -> Result<()> {
        if !self.configured || self.closed {
            return Err(Error::encoder("passthrough encoder is not configured"));
        }
        let chunk = EncodedChunk::new(
            frame.data().clone(),
            frame.timestamp(),
            frame.is_key() || options.key_frame,
        );
        self.pending.push_back(chunk);

        while self.pending.len() > self.latency {
            if let Some(chunk) = self.pending.pop_front() {
                let chunk = self.attach_config(chunk);
                self.ready.push_back(chunk);
            }
        }
        Ok(())
    }

    fn receive_chunk(&mut self) -> Result<EncodedChunk> {
        self.ready.pop_front().ok_or(Error::TryAgain)
    }

    fn flush(&mut self) -> Result<()> {
        trace!("Flushing {} held frames", self.pending.len());
        while let Some(chunk) = self.pending.pop_front() {
            let chunk = self.attach_config(chunk);
            self.ready.push_back(chunk);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.pending.clear();
        self.ready.clear();
        self.closed = true;
        Ok(())
    }

    fn queue_size(&self) -> usize {
        self.pending.len()
    }
}
