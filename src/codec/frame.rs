//! Raw media frames handed to the platform encoders

use crate::util::Buffer;

/// A captured video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Frame data
    pub data: Buffer,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Capture timestamp in microseconds
    pub timestamp: i64,

    /// Duration in microseconds
    pub duration: i64,

    /// Frame is already an access unit that starts a GOP
    pub keyframe: bool,
}

impl VideoFrame {
    /// Create a new video frame
    pub fn new(data: Buffer, width: u32, height: u32, timestamp: i64) -> Self {
        VideoFrame {
            data,
            width,
            height,
            timestamp,
            duration: 0,
            keyframe: false,
        }
    }

    pub fn with_keyframe(mut self, keyframe: bool) -> Self {
        self.keyframe = keyframe;
        self
    }
}

/// A captured block of audio samples
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Sample data
    pub data: Buffer,

    /// Number of samples per channel
    pub nb_samples: usize,

    /// Sample rate
    pub sample_rate: u32,

    /// Number of channels
    pub channels: u16,

    /// Capture timestamp in microseconds
    pub timestamp: i64,
}

impl AudioFrame {
    /// Create a new audio frame
    pub fn new(data: Buffer, nb_samples: usize, sample_rate: u32, channels: u16) -> Self {
        AudioFrame {
            data,
            nb_samples,
            sample_rate,
            channels,
            timestamp: 0,
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Duration of the block in microseconds
    pub fn duration(&self) -> i64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.nb_samples as i64 * 1_000_000 / self.sample_rate as i64
    }
}

/// Common accessors shared by audio and video frames
pub trait RawFrame {
    fn data(&self) -> &Buffer;
    fn timestamp(&self) -> i64;
    /// The frame starts a GOP on its own
    fn is_key(&self) -> bool;
}

impl RawFrame for VideoFrame {
    fn data(&self) -> &Buffer {
        &self.data
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn is_key(&self) -> bool {
        self.keyframe
    }
}

impl RawFrame for AudioFrame {
    fn data(&self) -> &Buffer {
        &self.data
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn is_key(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_frame_duration() {
        let frame = AudioFrame::new(Buffer::empty(), 1024, 48_000, 2);
        assert_eq!(frame.duration(), 21_333);

        let silent = AudioFrame::new(Buffer::empty(), 1024, 0, 2);
        assert_eq!(silent.duration(), 0);
    }

    #[test]
    fn test_raw_frame_key_flags() {
        let video = VideoFrame::new(Buffer::from_vec(vec![1]), 2, 2, 40_000);
        assert!(!video.is_key());
        assert!(video.clone().with_keyframe(true).is_key());

        let audio = AudioFrame::new(Buffer::from_vec(vec![1]), 1, 8_000, 1);
        assert!(audio.is_key());
        assert_eq!(RawFrame::timestamp(&video), 40_000);
    }
}
