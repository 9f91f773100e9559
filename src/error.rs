//! Error types for ZVD-FLV

use crate::util::MediaKind;
use thiserror::Error;

/// Result type alias for ZVD-FLV operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ZVD-FLV
#[derive(Error, Debug)]
pub enum Error {
    /// IO error from the output sink
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Format error
    #[error("Format error: {0}")]
    Format(String),

    /// The external encoder reported a failure
    #[error("Encoder error: {0}")]
    Encoder(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unsupported feature
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// No audio or video track has been configured
    #[error("No track configured")]
    NotConfigured,

    /// A per-track chunk queue hit its capacity
    #[error("{kind} queue overflow: capacity {capacity} reached")]
    QueueOverflow { kind: MediaKind, capacity: usize },

    /// Try again later
    #[error("Try again")]
    TryAgain,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a format error
    pub fn format<S: Into<String>>(msg: S) -> Self {
        Error::Format(msg.into())
    }

    /// Create an encoder error
    pub fn encoder<S: Into<String>>(msg: S) -> Self {
        Error::Encoder(msg.into())
    }

    /// Create an unsupported error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Error::Unsupported(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Whether this error leaves the session unusable
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Error::Encoder(_) | Error::Io(_))
    }
}
