//! Track synchronisation
//!
//! - `clock`: session base timestamp shared by both tracks
//! - `queue`: per-track queue of chunks awaiting release
//! - `track`: encoder tracks wrapping the platform encoders
//! - `processor`: state machine and two-track merge

pub mod clock;
pub mod processor;
pub mod queue;
pub mod track;

pub use clock::SessionClock;
pub use processor::{ProcessorState, StreamProcessor};
pub use queue::{ChunkQueue, OverflowPolicy, QueueConfig};
pub use track::{Audio, BoxedEncoder, EncoderTrack, TrackBuffer, TrackKind, Video};
