//! Container format handling
//!
//! This module holds the AMF0 typed value encoder, the FLV tag encoder and
//! muxer, and the chunk type that flows from encoder tracks into the muxer.

pub mod amf0;
pub mod chunk;
pub mod flv;

pub use amf0::{Amf0Encoder, Amf0Properties, Amf0Value};
pub use chunk::{ChunkKind, TrackChunk};
pub use flv::{FlvEncoder, FlvMuxer};

pub use crate::util::MediaKind;
