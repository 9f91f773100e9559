//! Stream processor
//!
//! Owns the encoder tracks of one muxing session, runs the record / pause /
//! resume / stop state machine, and merges the two tracks' chunk sequences
//! into a single sequence that never goes backwards in time.
//!
//! ## Merge
//!
//! Sequence headers are published as soon as they arrive and latch their
//! track as configured. Data chunks are held in their track's queue until
//! both tracks are configured. After that, each arriving data chunk raises
//! its track's high-water mark, joins its queue, and the queues are released:
//!
//! - while both queues hold chunks, the earlier front goes out (on a tie the
//!   chunk that was already waiting goes first);
//! - once one queue is empty, the other releases its front only while it is
//!   at or below the empty track's high-water mark.
//!
//! A track's future chunks are never earlier than its high-water mark, so
//! nothing released can be overtaken later. Sessions with a single track
//! skip all of this and publish in arrival order.
//!
//! When a call fails after the merge has already released chunks, those
//! chunks are kept and handed out by `take_undelivered`, or ahead of the next
//! successful batch.

use super::clock::SessionClock;
use super::queue::QueueConfig;
use super::track::{Audio, BoxedEncoder, EncoderTrack, TrackBuffer, TrackKind, Video};
use crate::codec::encoder::{AudioEncoderConfig, VideoEncoderConfig};
use crate::codec::frame::{AudioFrame, VideoFrame};
use crate::error::{Error, Result};
use crate::format::chunk::TrackChunk;
use crate::util::MediaKind;
use std::fmt;
use tracing::{debug, error, info, trace, warn};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessorState {
    #[default]
    Inactive,
    Recording,
    Paused,
}

impl fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorState::Inactive => write!(f, "inactive"),
            ProcessorState::Recording => write!(f, "recording"),
            ProcessorState::Paused => write!(f, "paused"),
        }
    }
}

/// Synchronisation core of a muxing session
#[derive(Debug)]
pub struct StreamProcessor {
    state: ProcessorState,
    clock: SessionClock,
    audio: Option<EncoderTrack<Audio>>,
    video: Option<EncoderTrack<Video>>,
    audio_config_ready: bool,
    video_config_ready: bool,
    queue_config: QueueConfig,
    wait_for_keyframe: bool,
    undelivered: Vec<TrackChunk>,
}

impl StreamProcessor {
    pub fn new(queue_config: QueueConfig) -> Self {
        StreamProcessor {
            state: ProcessorState::Inactive,
            clock: SessionClock::new(),
            audio: None,
            video: None,
            audio_config_ready: false,
            video_config_ready: false,
            queue_config,
            wait_for_keyframe: false,
            undelivered: Vec::new(),
        }
    }

    /// Drop video data until the first keyframe of the session
    pub fn with_wait_for_keyframe(mut self, wait: bool) -> Self {
        self.wait_for_keyframe = wait;
        self
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }

    pub fn audio_track(&self) -> Option<&EncoderTrack<Audio>> {
        self.audio.as_ref()
    }

    pub fn video_track(&self) -> Option<&EncoderTrack<Video>> {
        self.video.as_ref()
    }

    /// Whether the track has announced its configuration
    pub fn is_config_ready(&self, media: MediaKind) -> bool {
        match media {
            MediaKind::Audio => self.audio_config_ready,
            MediaKind::Video => self.video_config_ready,
        }
    }

    /// Chunks held back by the merge for a track
    pub fn queued(&self, media: MediaKind) -> usize {
        match media {
            MediaKind::Audio => self.audio.as_ref().map_or(0, |t| t.buffer().queue.len()),
            MediaKind::Video => self.video.as_ref().map_or(0, |t| t.buffer().queue.len()),
        }
    }

    /// Chunks released by a call that then failed, in publish order
    pub fn take_undelivered(&mut self) -> Vec<TrackChunk> {
        std::mem::take(&mut self.undelivered)
    }

    /// Create the audio track around `encoder`
    pub fn add_audio_track(
        &mut self,
        encoder: BoxedEncoder<Audio>,
        config: AudioEncoderConfig,
    ) -> Result<()> {
        self.ensure_inactive("configure audio")?;
        let ready = !Audio::has_sequence_header(&config);
        let track = EncoderTrack::new(encoder, config, &self.queue_config)?;
        if let Some(mut old) = self.audio.replace(track) {
            old.close()?;
        }
        self.audio_config_ready = ready;
        Ok(())
    }

    /// Create the video track around `encoder`
    pub fn add_video_track(
        &mut self,
        encoder: BoxedEncoder<Video>,
        config: VideoEncoderConfig,
    ) -> Result<()> {
        self.ensure_inactive("configure video")?;
        let track = EncoderTrack::new(encoder, config, &self.queue_config)?
            .with_wait_for_keyframe(self.wait_for_keyframe);
        if let Some(mut old) = self.video.replace(track) {
            old.close()?;
        }
        self.video_config_ready = false;
        Ok(())
    }

    /// Inactive -> Recording
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            ProcessorState::Recording => Ok(()),
            ProcessorState::Paused => Err(Error::invalid_state("session is paused, resume it")),
            ProcessorState::Inactive => {
                if self.audio.is_none() && self.video.is_none() {
                    return Err(Error::NotConfigured);
                }
                self.set_state(ProcessorState::Recording);
                Ok(())
            }
        }
    }

    /// Encode an audio frame; returns the chunks ready for the muxer
    ///
    /// Frames arriving while not recording are dropped.
    pub fn push_audio_frame(&mut self, frame: AudioFrame) -> Result<Vec<TrackChunk>> {
        if self.state != ProcessorState::Recording {
            trace!("Dropping audio frame while {}", self.state);
            return Ok(Vec::new());
        }
        let produced = match self.audio.as_mut() {
            Some(track) => track.encode(frame, &mut self.clock),
            None => return Err(Error::invalid_state("no audio track configured")),
        };
        let mut out = Vec::new();
        let result = self.publish(produced, &mut out);
        self.deliver(out, result)
    }

    /// Encode a video frame; returns the chunks ready for the muxer
    ///
    /// Frames arriving while not recording are dropped.
    pub fn push_video_frame(&mut self, frame: VideoFrame) -> Result<Vec<TrackChunk>> {
        if self.state != ProcessorState::Recording {
            trace!("Dropping video frame while {}", self.state);
            return Ok(Vec::new());
        }
        let produced = match self.video.as_mut() {
            Some(track) => track.encode(frame, &mut self.clock),
            None => return Err(Error::invalid_state("no video track configured")),
        };
        let mut out = Vec::new();
        let result = self.publish(produced, &mut out);
        self.deliver(out, result)
    }

    /// Recording -> Paused, flushing both encoders
    pub fn pause(&mut self) -> Result<Vec<TrackChunk>> {
        if self.state != ProcessorState::Recording {
            return Err(Error::invalid_state(format!("cannot pause while {}", self.state)));
        }
        let mut out = Vec::new();
        let flushed = self.flush_tracks(&mut out);
        if flushed.is_ok() {
            self.set_state(ProcessorState::Paused);
        }
        self.deliver(out, flushed)
    }

    /// Paused -> Recording; sequence headers and the clock base are kept
    pub fn resume(&mut self) -> Result<()> {
        match self.state {
            ProcessorState::Recording => Ok(()),
            ProcessorState::Paused => {
                self.set_state(ProcessorState::Recording);
                Ok(())
            }
            ProcessorState::Inactive => Err(Error::invalid_state("cannot resume while inactive")),
        }
    }

    /// End the session
    ///
    /// Flushes both encoders, releases everything still queued in timestamp
    /// order, closes the encoders and clears all session state. The tracks
    /// are destroyed; a new session needs them configured again.
    ///
    /// A flush or close failure is returned after the session has been torn
    /// down; the drained chunks are then available from `take_undelivered`.
    pub fn stop(&mut self) -> Result<Vec<TrackChunk>> {
        if self.state == ProcessorState::Inactive {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        let flushed = self.flush_tracks(&mut out);
        self.drain_queues(&mut out);

        let mut closed = Ok(());
        if let Some(track) = self.audio.as_mut() {
            track.reset();
            closed = closed.and(close_track(track.media(), track.close()));
        }
        if let Some(track) = self.video.as_mut() {
            track.reset();
            closed = closed.and(close_track(track.media(), track.close()));
        }
        self.reset_session();

        self.deliver(out, flushed.and(closed))
    }

    fn flush_tracks(&mut self, out: &mut Vec<TrackChunk>) -> Result<()> {
        let mut result = Ok(());
        if let Some(track) = self.audio.as_mut() {
            let produced = track.flush(&mut self.clock);
            result = self.publish(produced, out);
        }
        if let Some(track) = self.video.as_mut() {
            let produced = track.flush(&mut self.clock);
            result = result.and(self.publish(produced, out));
        }
        result
    }

    /// Hand out a batch, or keep it for the caller when the call failed
    fn deliver(&mut self, out: Vec<TrackChunk>, result: Result<()>) -> Result<Vec<TrackChunk>> {
        match result {
            Ok(()) if self.undelivered.is_empty() => Ok(out),
            Ok(()) => {
                let mut batch = self.take_undelivered();
                batch.extend(out);
                Ok(batch)
            }
            Err(e) => {
                if !out.is_empty() {
                    warn!("Keeping {} released chunks after error: {}", out.len(), e);
                }
                self.undelivered.extend(out);
                Err(e)
            }
        }
    }

    /// Run a track's output through the merge
    ///
    /// Every chunk of the batch is offered to the merge; the first rejection
    /// is returned once the batch is done.
    fn publish(&mut self, produced: Result<Vec<TrackChunk>>, out: &mut Vec<TrackChunk>) -> Result<()> {
        let chunks = match produced {
            Ok(chunks) => chunks,
            Err(e) => return Err(self.fail(e, out)),
        };
        let mut result = Ok(());
        for chunk in chunks {
            let (media, timestamp) = (chunk.media(), chunk.timestamp);
            if let Err(e) = self.ingest(chunk, out) {
                error!("Rejected {} chunk at {}ms: {}", media, timestamp, e);
                result = result.and(Err(e));
            }
        }
        result
    }

    fn ingest(&mut self, chunk: TrackChunk, out: &mut Vec<TrackChunk>) -> Result<()> {
        let media = chunk.media();

        if chunk.kind.is_sequence_header() {
            match media {
                MediaKind::Audio => self.audio_config_ready = true,
                MediaKind::Video => self.video_config_ready = true,
            }
            out.push(chunk);
            return Ok(());
        }

        let both_ready = self.audio_config_ready && self.video_config_ready;
        let (audio, video) = match (self.audio.as_mut(), self.video.as_mut()) {
            (Some(audio), Some(video)) => (audio.buffer_mut(), video.buffer_mut()),
            _ => {
                out.push(chunk);
                return Ok(());
            }
        };
        let (arriving, other) = match media {
            MediaKind::Audio => (audio, video),
            MediaKind::Video => (video, audio),
        };

        let timestamp = chunk.timestamp;
        arriving.queue.push(chunk)?;
        arriving.last_timestamp = arriving.last_timestamp.max(timestamp);
        if both_ready {
            release(arriving, other, out);
        } else {
            trace!("{} chunk at {}ms waits for {} config", media, timestamp, media.opposite());
        }
        Ok(())
    }

    /// Release every queued chunk in timestamp order, ignoring high-water marks
    fn drain_queues(&mut self, out: &mut Vec<TrackChunk>) {
        if let (Some(audio), Some(video)) = (self.audio.as_mut(), self.video.as_mut()) {
            let (audio, video) = (audio.buffer_mut(), video.buffer_mut());
            let before = out.len();
            loop {
                let from_audio = match (audio.queue.front_timestamp(), video.queue.front_timestamp()) {
                    (Some(a), Some(v)) => a <= v,
                    (Some(_), None) => true,
                    (None, Some(_)) => false,
                    (None, None) => break,
                };
                let source = if from_audio { &mut *audio } else { &mut *video };
                if let Some(chunk) = source.queue.pop_front() {
                    trace!("Draining {} chunk at {}ms", source.queue.kind(), chunk.timestamp);
                    out.push(chunk);
                }
            }
            debug!("Drained {} queued chunks", out.len() - before);
        }
    }

    /// Tear the session down after an encoder failure
    ///
    /// Chunks still queued are drained into `out` first.
    fn fail(&mut self, err: Error, out: &mut Vec<TrackChunk>) -> Error {
        if !err.is_session_fatal() {
            return err;
        }
        error!("Encoder failure, ending session: {}", err);
        self.drain_queues(out);
        if let Some(track) = self.audio.as_mut() {
            if let Err(e) = track.close() {
                warn!("Failed to close audio encoder during teardown: {}", e);
            }
        }
        if let Some(track) = self.video.as_mut() {
            if let Err(e) = track.close() {
                warn!("Failed to close video encoder during teardown: {}", e);
            }
        }
        self.reset_session();
        err
    }

    fn reset_session(&mut self) {
        self.clock.reset();
        self.audio = None;
        self.video = None;
        self.audio_config_ready = false;
        self.video_config_ready = false;
        self.set_state(ProcessorState::Inactive);
    }

    fn ensure_inactive(&self, action: &str) -> Result<()> {
        if self.state != ProcessorState::Inactive {
            return Err(Error::invalid_state(format!(
                "cannot {} while {}",
                action, self.state
            )));
        }
        Ok(())
    }

    fn set_state(&mut self, state: ProcessorState) {
        if self.state != state {
            info!("Stream processor {} -> {}", self.state, state);
            self.state = state;
        }
    }
}

impl Default for StreamProcessor {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

fn close_track(media: MediaKind, result: Result<()>) -> Result<()> {
    if let Err(e) = &result {
        error!("Failed to close {} encoder: {}", media, e);
    }
    result
}

/// Publish queued chunks that can no longer be overtaken
fn release(arriving: &mut TrackBuffer, other: &mut TrackBuffer, out: &mut Vec<TrackChunk>) {
    loop {
        let from_arriving = match (arriving.queue.front_timestamp(), other.queue.front_timestamp()) {
            (Some(a), Some(b)) => a < b,
            (Some(a), None) if a <= other.last_timestamp => true,
            (None, Some(b)) if b <= arriving.last_timestamp => false,
            _ => break,
        };
        let source = if from_arriving { &mut *arriving } else { &mut *other };
        if let Some(chunk) = source.queue.pop_front() {
            out.push(chunk);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::passthrough::PassthroughEncoder;
    use crate::format::chunk::ChunkKind;
    use crate::util::Buffer;

    fn audio_chunk(ts: f64) -> TrackChunk {
        TrackChunk::data(MediaKind::Audio, Buffer::empty(), ts, false)
    }

    fn video_chunk(ts: f64) -> TrackChunk {
        TrackChunk::data(MediaKind::Video, Buffer::empty(), ts, false)
    }

    fn processor(audio: bool, video: bool) -> StreamProcessor {
        let mut p = StreamProcessor::new(QueueConfig::default());
        if audio {
            let enc = PassthroughEncoder::<AudioEncoderConfig, AudioFrame>::new(None);
            p.add_audio_track(Box::new(enc), AudioEncoderConfig::default())
                .unwrap();
        }
        if video {
            let enc = PassthroughEncoder::<VideoEncoderConfig, VideoFrame>::new(None);
            p.add_video_track(Box::new(enc), VideoEncoderConfig::default())
                .unwrap();
        }
        p.start().unwrap();
        p
    }

    fn feed(p: &mut StreamProcessor, chunks: Vec<TrackChunk>) -> Vec<TrackChunk> {
        let mut out = Vec::new();
        for chunk in chunks {
            p.ingest(chunk, &mut out).unwrap();
        }
        out
    }

    fn timestamps(chunks: &[TrackChunk]) -> Vec<f64> {
        chunks.iter().map(|c| c.timestamp).collect()
    }

    #[test]
    fn test_merge_withholds_until_ordering_is_proven() {
        let mut p = processor(true, true);
        let out = feed(
            &mut p,
            vec![
                TrackChunk::sequence_header(MediaKind::Audio, Buffer::empty()),
                audio_chunk(0.0),
                audio_chunk(21.333),
                TrackChunk::sequence_header(MediaKind::Video, Buffer::empty()),
                video_chunk(20.683),
                video_chunk(57.579),
                audio_chunk(42.666),
            ],
        );
        assert_eq!(
            timestamps(&out),
            vec![0.0, 0.0, 0.0, 20.683, 21.333, 42.666]
        );
        assert_eq!(p.queued(MediaKind::Video), 1);

        let rest = p.stop().unwrap();
        assert_eq!(timestamps(&rest), vec![57.579]);
    }

    #[test]
    fn test_merge_long_interleave() {
        let mut p = processor(true, true);
        let out = feed(
            &mut p,
            vec![
                TrackChunk::sequence_header(MediaKind::Video, Buffer::empty()),
                video_chunk(0.0),
                TrackChunk::sequence_header(MediaKind::Audio, Buffer::empty()),
                audio_chunk(21.333),
                video_chunk(23.001),
                audio_chunk(42.666),
                video_chunk(56.07),
                audio_chunk(64.0),
                video_chunk(87.304),
                audio_chunk(85.333),
            ],
        );
        assert_eq!(
            timestamps(&out),
            vec![0.0, 0.0, 0.0, 21.333, 23.001, 42.666, 56.07, 64.0, 85.333]
        );
        assert_eq!(p.queued(MediaKind::Video), 1);
    }

    #[test]
    fn test_data_buffered_until_both_configured() {
        let mut p = processor(true, true);
        let out = feed(
            &mut p,
            vec![
                TrackChunk::sequence_header(MediaKind::Audio, Buffer::empty()),
                audio_chunk(0.0),
                audio_chunk(10.0),
            ],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, ChunkKind::AudioSequenceHeader);
        assert_eq!(p.queued(MediaKind::Audio), 2);
    }

    #[test]
    fn test_output_never_goes_backwards() {
        let mut p = processor(true, true);
        let mut input = vec![
            TrackChunk::sequence_header(MediaKind::Audio, Buffer::empty()),
            TrackChunk::sequence_header(MediaKind::Video, Buffer::empty()),
        ];
        // Bursty arrival: three audio, then two video, repeated
        for round in 0..20 {
            let base = round as f64 * 100.0;
            input.push(audio_chunk(base));
            input.push(audio_chunk(base + 23.0));
            input.push(audio_chunk(base + 46.0));
            input.push(video_chunk(base + 10.0));
            input.push(video_chunk(base + 60.0));
        }
        let mut out = feed(&mut p, input);
        out.extend(p.stop().unwrap());

        let data: Vec<f64> = out
            .iter()
            .filter(|c| !c.kind.is_sequence_header())
            .map(|c| c.timestamp)
            .collect();
        assert_eq!(data.len(), 100);
        assert!(data.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_overflow_mid_batch_keeps_released_chunks() {
        let mut p = StreamProcessor::new(QueueConfig::default().with_capacity(1));
        let enc = PassthroughEncoder::<AudioEncoderConfig, AudioFrame>::new(None);
        p.add_audio_track(Box::new(enc), AudioEncoderConfig::default())
            .unwrap();
        let enc = PassthroughEncoder::<VideoEncoderConfig, VideoFrame>::new(None);
        p.add_video_track(Box::new(enc), VideoEncoderConfig::default())
            .unwrap();
        p.start().unwrap();

        let out = feed(
            &mut p,
            vec![
                TrackChunk::sequence_header(MediaKind::Audio, Buffer::empty()),
                TrackChunk::sequence_header(MediaKind::Video, Buffer::empty()),
                video_chunk(10.0),
            ],
        );
        assert_eq!(out.len(), 2);
        assert_eq!(p.queued(MediaKind::Video), 1);

        let mut out = Vec::new();
        let batch = vec![audio_chunk(5.0), audio_chunk(20.0), audio_chunk(30.0)];
        let result = p.publish(Ok(batch), &mut out);
        let err = p.deliver(out, result).unwrap_err();
        assert!(matches!(
            err,
            Error::QueueOverflow {
                kind: MediaKind::Audio,
                capacity: 1
            }
        ));

        assert_eq!(timestamps(&p.take_undelivered()), vec![5.0, 10.0]);
        assert!(p.take_undelivered().is_empty());
        assert_eq!(p.queued(MediaKind::Audio), 1);
        assert_eq!(timestamps(&p.stop().unwrap()), vec![20.0]);
    }

    #[test]
    fn test_undelivered_chunks_lead_next_batch() {
        let mut p = processor(true, true);
        feed(
            &mut p,
            vec![
                TrackChunk::sequence_header(MediaKind::Audio, Buffer::empty()),
                TrackChunk::sequence_header(MediaKind::Video, Buffer::empty()),
            ],
        );
        let result = Err(Error::invalid_state("rejected"));
        assert!(p.deliver(vec![audio_chunk(1.0)], result).is_err());

        let out = p.deliver(vec![video_chunk(2.0)], Ok(())).unwrap();
        assert_eq!(timestamps(&out), vec![1.0, 2.0]);
        assert!(p.take_undelivered().is_empty());
    }

    #[test]
    fn test_single_track_passthrough() {
        let mut p = processor(false, true);
        let out = feed(
            &mut p,
            vec![
                TrackChunk::sequence_header(MediaKind::Video, Buffer::empty()),
                video_chunk(0.0),
                video_chunk(33.0),
                video_chunk(66.0),
            ],
        );
        assert_eq!(timestamps(&out), vec![0.0, 0.0, 33.0, 66.0]);
        assert_eq!(p.queued(MediaKind::Video), 0);
    }

    #[test]
    fn test_state_machine() {
        let mut p = StreamProcessor::default();
        assert!(p.stop().unwrap().is_empty());
        assert!(matches!(p.start(), Err(Error::NotConfigured)));
        assert!(p.pause().is_err());
        assert!(p.resume().is_err());

        let mut p = processor(true, false);
        assert_eq!(p.state(), ProcessorState::Recording);
        p.pause().unwrap();
        assert_eq!(p.state(), ProcessorState::Paused);
        assert!(p.pause().is_err());
        assert!(p.start().is_err());
        p.resume().unwrap();
        p.resume().unwrap();
        assert_eq!(p.state(), ProcessorState::Recording);
        p.stop().unwrap();
        assert_eq!(p.state(), ProcessorState::Inactive);
        assert!(!p.has_audio());
    }

    #[test]
    fn test_tracks_locked_while_recording() {
        let mut p = processor(true, false);
        let enc = PassthroughEncoder::<VideoEncoderConfig, VideoFrame>::new(None);
        let result = p.add_video_track(Box::new(enc), VideoEncoderConfig::default());
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_mp3_track_needs_no_sequence_header() {
        let mut p = StreamProcessor::default();
        let enc = PassthroughEncoder::<AudioEncoderConfig, AudioFrame>::new(None);
        p.add_audio_track(Box::new(enc), AudioEncoderConfig::new("mp3", 44_100, 2))
            .unwrap();
        assert!(p.is_config_ready(MediaKind::Audio));
        assert!(!p.is_config_ready(MediaKind::Video));
    }
}
