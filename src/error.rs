//! Error types for the interview agent

use thiserror::Error;

/// Result type alias for interview agent operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running an interview
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Media transport error (join, publish, unpublish, disconnect)
    #[error("transport error: {0}")]
    Transport(String),

    /// Audio error (device, decode, encode)
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Question/scoring oracle call failed
    #[error("oracle error: {0}")]
    Oracle(String),

    /// Oracle answered, but not in the expected structure
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Session was cancelled by the shutdown signal
    #[error("session cancelled")]
    Cancelled,

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
}

/// Recovery category of an [`Error`]
///
/// Service and malformed-response failures are absorbed inside a turn with a
/// fallback value. Transport failures and cancellation end the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An external speech/oracle call failed or timed out
    TransientService,
    /// The oracle answered with text that does not parse
    MalformedResponse,
    /// Media could not be joined, published, or unpublished
    Transport,
    /// Shutdown was requested
    Cancelled,
    /// Configuration, IO, or local encoding problem
    Other,
}

impl Error {
    /// Classify this error for turn-level recovery
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Stt(_) | Self::Tts(_) | Self::Oracle(_) | Self::Audio(_) | Self::Http(_) => {
                ErrorKind::TransientService
            }
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Config(_) | Self::Io(_) | Self::Serialization(_) | Self::Toml(_) => {
                ErrorKind::Other
            }
        }
    }

    /// Whether this error must abort the whole session
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::TransientService | ErrorKind::MalformedResponse
        )
    }
}
