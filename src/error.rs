//! Error taxonomy for LYRA_OS
//!
//! - PersistenceError: local store faults (logged, never fatal)
//! - ConnectionError: cloud read/write/auth faults (logged, sync skipped)
//! - BackendError: generative API faults (surfaced as a fallback message)
//! - LyraError: bootstrap faults raised while building the app

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Session document is malformed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Local store is unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Cloud drive is not authorized")]
    NotAuthenticated,

    #[error("Cloud request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Drive API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Remote session document is malformed: {0}")]
    InvalidDocument(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Gemini API key not set")]
    MissingApiKey,

    #[error("Generative request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Gemini API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("No text response from Gemini")]
    EmptyResponse,

    #[error("Artifact response could not be parsed: {0}")]
    InvalidArtifact(String),
}

#[derive(Debug, Error)]
pub enum LyraError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl From<rusqlite::Error> for LyraError {
    fn from(err: rusqlite::Error) -> Self {
        LyraError::Persistence(PersistenceError::Database(err))
    }
}
