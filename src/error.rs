//! Error types for the gaze relay

use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the gaze relay
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Inbound audio payload could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// Compressed audio could not be converted to WAV
    #[error("transcode error: {0}")]
    Transcode(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Language model error
    #[error("LLM error: {0}")]
    Llm(String),

    /// External call exceeded its deadline
    #[error("timed out: {0}")]
    Timeout(String),

    /// Request tag is not one of the known request types
    #[error("unknown request type: {0}")]
    UnknownRequestType(String),

    /// Request payload does not match its type's schema
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl Error {
    /// Whether this error came from an external service round-trip
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Stt(_) | Self::Tts(_) | Self::Llm(_) | Self::Timeout(_) | Self::Http(_)
        )
    }
}
