//! Error types for piperline

use thiserror::Error;

/// Main error type for piperline
#[derive(Error, Debug)]
pub enum Error {
    /// Nothing left to speak after sanitizing, moderating and stripping directives
    #[error("Text is empty after processing")]
    EmptyText,

    #[error("No voices available")]
    NoVoicesAvailable,

    #[error("Speech engine not found: {0}")]
    EngineUnavailable(String),

    #[error("Speech engine failed: {0}")]
    EngineFailed(String),

    #[error("Synthesized audio is empty")]
    EmptyAudio,

    #[error("No segment could be rendered")]
    EmptySegments,

    #[error("Unsupported output format: {0}")]
    BadFormat(String),

    #[error("Audio processing error: {0}")]
    Audio(String),

    #[error("Moderation error: {0}")]
    Moderation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

/// Result type for piperline operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether a failure inside one assembled segment may be absorbed.
    ///
    /// A missing engine binary affects every segment alike, so it is
    /// reported instead of being dropped segment by segment.
    pub fn is_segment_local(&self) -> bool {
        !matches!(self, Error::EngineUnavailable(_))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<hound::Error> for Error {
    fn from(err: hound::Error) -> Self {
        Error::Audio(err.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Moderation(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Audio(format!("Background task failed: {}", err))
    }
}
