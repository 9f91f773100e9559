//! Common utilities and data structures

pub mod buffer;
pub mod writer;

pub use buffer::Buffer;
pub use writer::ByteWriter;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Media track kinds carried by an FLV session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio track
    Audio,
    /// Video track
    Video,
}

impl MediaKind {
    /// The track on the other side of the merge
    pub fn opposite(self) -> Self {
        match self {
            MediaKind::Audio => MediaKind::Video,
            MediaKind::Video => MediaKind::Audio,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_opposite() {
        assert_eq!(MediaKind::Audio.opposite(), MediaKind::Video);
        assert_eq!(MediaKind::Video.opposite(), MediaKind::Audio);
        assert_eq!(MediaKind::Video.to_string(), "video");
    }
}
