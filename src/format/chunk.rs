//! Track chunks exchanged between encoder tracks, the stream processor and
//! the muxer

use crate::util::{Buffer, MediaKind};
use std::fmt;

/// Kind of a [`TrackChunk`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    AudioData,
    AudioSequenceHeader,
    VideoData,
    VideoSequenceHeader,
}

impl ChunkKind {
    /// Data chunk kind for a track
    pub fn data(media: MediaKind) -> Self {
        match media {
            MediaKind::Audio => ChunkKind::AudioData,
            MediaKind::Video => ChunkKind::VideoData,
        }
    }

    /// Sequence header chunk kind for a track
    pub fn sequence_header(media: MediaKind) -> Self {
        match media {
            MediaKind::Audio => ChunkKind::AudioSequenceHeader,
            MediaKind::Video => ChunkKind::VideoSequenceHeader,
        }
    }

    /// Track this kind belongs to
    pub fn media(self) -> MediaKind {
        match self {
            ChunkKind::AudioData | ChunkKind::AudioSequenceHeader => MediaKind::Audio,
            ChunkKind::VideoData | ChunkKind::VideoSequenceHeader => MediaKind::Video,
        }
    }

    pub fn is_sequence_header(self) -> bool {
        matches!(
            self,
            ChunkKind::AudioSequenceHeader | ChunkKind::VideoSequenceHeader
        )
    }
}

/// One encoded unit of a track, timestamped on the session clock
#[derive(Debug, Clone, PartialEq)]
pub struct TrackChunk {
    pub kind: ChunkKind,
    /// Codec-specific encoded bytes
    pub payload: Buffer,
    /// Session-relative milliseconds; always 0 for sequence headers
    pub timestamp: f64,
    /// Only meaningful for video data
    pub is_key_frame: bool,
}

impl TrackChunk {
    /// Data chunk at a session-relative timestamp
    pub fn data(media: MediaKind, payload: Buffer, timestamp: f64, is_key_frame: bool) -> Self {
        TrackChunk {
            kind: ChunkKind::data(media),
            payload,
            timestamp,
            is_key_frame: media == MediaKind::Video && is_key_frame,
        }
    }

    /// Sequence header chunk, pinned at timestamp 0
    pub fn sequence_header(media: MediaKind, payload: Buffer) -> Self {
        TrackChunk {
            kind: ChunkKind::sequence_header(media),
            payload,
            timestamp: 0.0,
            is_key_frame: media == MediaKind::Video,
        }
    }

    pub fn media(&self) -> MediaKind {
        self.kind.media()
    }

    /// FLV tag timestamp: whole milliseconds, fraction truncated
    pub fn tag_timestamp(&self) -> u32 {
        self.timestamp.max(0.0) as u32
    }
}

impl fmt::Display for TrackChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TrackChunk({:?}, size={}, ts={}, key={})",
            self.kind,
            self.payload.len(),
            self.timestamp,
            self.is_key_frame
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_kind_mapping() {
        assert_eq!(ChunkKind::data(MediaKind::Audio), ChunkKind::AudioData);
        assert_eq!(
            ChunkKind::sequence_header(MediaKind::Video),
            ChunkKind::VideoSequenceHeader
        );
        assert_eq!(ChunkKind::VideoData.media(), MediaKind::Video);
        assert!(ChunkKind::AudioSequenceHeader.is_sequence_header());
        assert!(!ChunkKind::AudioData.is_sequence_header());
    }

    #[test]
    fn test_sequence_header_timestamp_is_zero() {
        let chunk = TrackChunk::sequence_header(MediaKind::Audio, Buffer::from_vec(vec![0x12, 0x10]));
        assert_eq!(chunk.timestamp, 0.0);
        assert_eq!(chunk.kind, ChunkKind::AudioSequenceHeader);
    }

    #[test]
    fn test_keyframe_flag_only_for_video() {
        let audio = TrackChunk::data(MediaKind::Audio, Buffer::empty(), 1.0, true);
        assert!(!audio.is_key_frame);
        let video = TrackChunk::data(MediaKind::Video, Buffer::empty(), 1.0, true);
        assert!(video.is_key_frame);
    }

    #[test]
    fn test_tag_timestamp_truncates() {
        let chunk = TrackChunk::data(MediaKind::Video, Buffer::empty(), 20.683, false);
        assert_eq!(chunk.tag_timestamp(), 20);
    }
}
