//! Encoder boundary and raw frame types

pub mod encoder;
pub mod frame;
pub mod passthrough;

pub use encoder::{
    AudioEncoderConfig, EncodeOptions, EncodedChunk, PlatformEncoder, VideoEncoderConfig,
};
pub use frame::{AudioFrame, RawFrame, VideoFrame};
pub use passthrough::PassthroughEncoder;
