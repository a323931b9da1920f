//! Error types for the Crab voice core

use thiserror::Error;

/// Result type alias for Crab operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice core
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Voice processing error
    #[error("voice error: {0}")]
    Voice(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Microphone access was refused by the platform
    #[error("speech recognition permission denied")]
    PermissionDenied,

    /// Language model error
    #[error("llm error: {0}")]
    Llm(String),

    /// A collaborator action (reminder, launch, lookup) failed
    #[error("action error: {0}")]
    Action(String),

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
