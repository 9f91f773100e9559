//! Per-track chunk queue
//!
//! Holds data chunks a track has produced but the merge has not yet released.
//! Depth is bounded by the temporal skew between the two tracks; the capacity
//! and overflow policy cap it when one track stalls.

use crate::error::{Error, Result};
use crate::format::chunk::TrackChunk;
use crate::util::MediaKind;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::warn;

/// What to do when a queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Reject the new chunk with `Error::QueueOverflow`
    #[default]
    Error,
    /// Evict the oldest queued chunk to make room
    DropOldest,
}

/// Queue and encoder back-pressure limits for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum chunks held per track; `None` grows without bound
    pub capacity: Option<usize>,
    pub overflow: OverflowPolicy,
    /// Drop raw frames while the encoder holds this many; 0 disables
    pub max_encode_queue: usize,
}

impl QueueConfig {
    pub fn unbounded() -> Self {
        QueueConfig {
            capacity: None,
            ..Default::default()
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn with_max_encode_queue(mut self, max: usize) -> Self {
        self.max_encode_queue = max;
        self
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            capacity: Some(1024),
            overflow: OverflowPolicy::Error,
            max_encode_queue: 2,
        }
    }
}

/// FIFO of chunks awaiting release
#[derive(Debug)]
pub struct ChunkQueue {
    kind: MediaKind,
    chunks: VecDeque<TrackChunk>,
    capacity: Option<usize>,
    overflow: OverflowPolicy,
    dropped: u64,
}

impl ChunkQueue {
    pub fn new(kind: MediaKind, config: &QueueConfig) -> Self {
        ChunkQueue {
            kind,
            chunks: VecDeque::new(),
            capacity: config.capacity,
            overflow: config.overflow,
            dropped: 0,
        }
    }

    /// Append a chunk, applying the overflow policy when full
    pub fn push(&mut self, chunk: TrackChunk) -> Result<()> {
        if let Some(capacity) = self.capacity {
            if self.chunks.len() >= capacity {
                match self.overflow {
                    OverflowPolicy::Error => {
                        return Err(Error::QueueOverflow {
                            kind: self.kind,
                            capacity,
                        });
                    }
                    OverflowPolicy::DropOldest => {
                        if let Some(evicted) = self.chunks.pop_front() {
                            self.dropped += 1;
                            warn!(
                                "{} queue full ({}), dropping chunk at {}ms",
                                self.kind, capacity, evicted.timestamp
                            );
                        }
                        if capacity == 0 {
                            self.dropped += 1;
                            return Ok(());
                        }
                    }
                }
            }
        }
        self.chunks.push_back(chunk);
        Ok(())
    }

    pub fn pop_front(&mut self) -> Option<TrackChunk> {
        self.chunks.pop_front()
    }

    pub fn front(&self) -> Option<&TrackChunk> {
        self.chunks.front()
    }

    /// Timestamp of the oldest queued chunk
    pub fn front_timestamp(&self) -> Option<f64> {
        self.chunks.front().map(|chunk| chunk.timestamp)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    /// Chunks evicted under `DropOldest`
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Buffer;

    fn chunk(ts: f64) -> TrackChunk {
        TrackChunk::data(MediaKind::Audio, Buffer::empty(), ts, false)
    }

    #[test]
    fn test_fifo_order() {
        let mut q = ChunkQueue::new(MediaKind::Audio, &QueueConfig::default());
        q.push(chunk(1.0)).unwrap();
        q.push(chunk(2.0)).unwrap();
        assert_eq!(q.front_timestamp(), Some(1.0));
        assert_eq!(q.pop_front().unwrap().timestamp, 1.0);
        assert_eq!(q.pop_front().unwrap().timestamp, 2.0);
        assert!(q.pop_front().is_none());
    }

    #[test]
    fn test_overflow_error_policy() {
        let config = QueueConfig::default().with_capacity(2);
        let mut q = ChunkQueue::new(MediaKind::Video, &config);
        q.push(chunk(1.0)).unwrap();
        q.push(chunk(2.0)).unwrap();
        let err = q.push(chunk(3.0)).unwrap_err();
        assert!(matches!(
            err,
            Error::QueueOverflow {
                kind: MediaKind::Video,
                capacity: 2
            }
        ));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_overflow_drop_oldest_policy() {
        let config = QueueConfig::default()
            .with_capacity(2)
            .with_overflow(OverflowPolicy::DropOldest);
        let mut q = ChunkQueue::new(MediaKind::Audio, &config);
        for ts in [1.0, 2.0, 3.0] {
            q.push(chunk(ts)).unwrap();
        }
        assert_eq!(q.len(), 2);
        assert_eq!(q.dropped(), 1);
        assert_eq!(q.front_timestamp(), Some(2.0));
    }

    #[test]
    fn test_unbounded_queue() {
        let mut q = ChunkQueue::new(MediaKind::Audio, &QueueConfig::unbounded());
        for i in 0..5000 {
            q.push(chunk(i as f64)).unwrap();
        }
        assert_eq!(q.len(), 5000);
    }

    #[test]
    fn test_queue_config_json() {
        let config: QueueConfig =
            serde_json::from_str(r#"{"capacity": null, "overflow": "drop_oldest"}"#).unwrap();
        assert_eq!(config.capacity, None);
        assert_eq!(config.overflow, OverflowPolicy::DropOldest);
        assert_eq!(config.max_encode_queue, 2);
    }
}
