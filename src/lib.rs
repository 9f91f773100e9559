//! ZVD-FLV - live FLV muxing in Rust
//!
//! Packages independently encoded, timestamped audio and video into a single
//! FLV byte stream that can be written incrementally to a file, socket or
//! in-memory buffer.
//!
//! # Architecture
//!
//! - `util`: byte writer and payload buffers
//! - `format`: AMF0 values, FLV tag encoding, the strategy table and the muxer
//! - `codec`: the platform encoder boundary, raw frames and a passthrough encoder
//! - `streaming`: encoder tracks, the session clock and the stream processor
//!   that merges both tracks into one time-ordered sequence
//!
//! # Example
//!
//! ```no_run
//! use zvd_flv::codec::{PassthroughEncoder, VideoEncoderConfig, VideoFrame};
//! use zvd_flv::format::flv::muxer::{FlvMuxer, MuxerOptions};
//! use zvd_flv::util::Buffer;
//!
//! # fn main() -> zvd_flv::Result<()> {
//! let file = std::fs::File::create("out.flv")?;
//! let mut muxer = FlvMuxer::new(file, MuxerOptions::new());
//! let encoder = PassthroughEncoder::<VideoEncoderConfig, VideoFrame>::new(None);
//! muxer.configure_video(Box::new(encoder), VideoEncoderConfig::default())?;
//! muxer.start()?;
//! muxer.push_video_frame(VideoFrame::new(Buffer::from_vec(vec![0x65]), 1280, 720, 0))?;
//! muxer.finish()?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod error;
pub mod format;
pub mod streaming;
pub mod util;

pub use error::{Error, Result};
pub use format::flv::muxer::{FlvMuxer, MuxerOptions};
pub use streaming::{ProcessorState, StreamProcessor};

/// ZVD-FLV version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 1;
pub const VERSION_PATCH: u32 = 0;

/// Logging configuration for the library
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Enable verbose logging
    pub verbose: bool,
    /// Enable debug output
    pub debug: bool,
}

/// Initialize logging with the given configuration
///
/// `RUST_LOG` takes precedence over the flags. Calling this more than once is
/// harmless; only the first subscriber is installed.
pub fn init(config: Config) -> Result<()> {
    if config.verbose || config.debug {
        let level = if config.debug { "debug" } else { "info" };
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
        // Already installed is fine
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }

    Ok(())
}
