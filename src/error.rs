//! Error types for the recipe assistant

use thiserror::Error;

/// Result type alias for recipe assistant operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// No API key configured for a remote endpoint
    #[error("OpenAI API key is not set")]
    MissingApiKey,

    /// Microphone or speech recognition permission was not granted
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Capture or playback is not implemented on this platform
    #[error("platform not supported: {0}")]
    PlatformUnsupported(String),

    /// Audio session or audio engine failure
    #[error("audio engine error: {0}")]
    AudioEngine(String),

    /// Capture ended without any recognized speech
    #[error("no speech detected")]
    NoSpeechDetected,

    /// Speech recognizer reported an error
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Capture session was stopped before it produced a result
    #[error("capture cancelled")]
    Cancelled,

    /// HTTP transport error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote endpoint answered with a non-success status
    #[error("http status {status}: {body}")]
    HttpStatus {
        /// Response status code
        status: u16,
        /// Response body, if readable
        body: String,
    },

    /// Response did not have the expected shape
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Text-to-speech request failed
    #[error("synthesis request failed: {0}")]
    SynthesisRequestFailed(String),

    /// Audio playback failed
    #[error("playback failed: {0}")]
    PlaybackFailed(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether the orchestrator may retry listening after this error
    #[must_use]
    pub const fn is_no_speech(&self) -> bool {
        matches!(self, Self::NoSpeechDetected)
    }
}
