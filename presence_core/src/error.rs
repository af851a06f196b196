//! Error types for the presence_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for presence_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serial-like channel failure (write/read/open)
    #[error("Channel error: {0}")]
    Channel(String),

    /// Durable store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Input that is not a 22-character token
    #[error("Malformed token: {0:?}")]
    MalformedToken(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the processing loop must stop on this error.
    ///
    /// Only configuration problems are fatal; everything else is
    /// recovered from on the next cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Toml(_))
    }
}

impl From<serialport::Error> for Error {
    fn from(e: serialport::Error) -> Self {
        Error::Channel(e.to_string())
    }
}
