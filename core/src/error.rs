//! Structured error types for Ani
//!
//! Every dependency failure is returned to the caller as a tagged variant.
//! Nothing in here is allowed to terminate the host process.

use std::time::Duration;
use thiserror::Error;

/// Primary error type for Ani operations
#[derive(Error, Debug)]
pub enum AniError {
    // =========================================================================
    // Session Errors
    // =========================================================================
    /// The subordinate process could not be started
    #[error("session failed to start: {message}")]
    Spawn { message: String },

    /// A write was attempted while no live session exists
    #[error("session unavailable")]
    SessionUnavailable,

    /// Another request is already dispatched against the session
    #[error("a request is already in flight")]
    Busy,

    // =========================================================================
    // Secondary Model Errors
    // =========================================================================
    /// Transport, timeout or decoding failure talking to the model
    #[error("secondary model error: {message}")]
    SecondaryModel { message: String },

    /// The model endpoint answered with a non-success status
    #[error("secondary model returned {status}: {message}")]
    SecondaryModelStatus { status: u16, message: String },

    /// The model endpoint did not answer in time
    #[error("secondary model timed out after {duration:?}")]
    SecondaryModelTimeout { duration: Duration },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    // =========================================================================
    // External Error Wrappers
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl AniError {
    /// Whether the failure should send the request down the direct path
    /// instead of surfacing it.
    pub fn is_degrading(&self) -> bool {
        matches!(self, Self::Spawn { .. } | Self::SessionUnavailable)
    }

    /// Whether the failure came from the secondary model.
    pub fn is_secondary_model(&self) -> bool {
        matches!(
            self,
            Self::SecondaryModel { .. }
                | Self::SecondaryModelStatus { .. }
                | Self::SecondaryModelTimeout { .. }
        )
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Spawn { .. } => {
                "The assistant session could not be started; answering directly.".to_string()
            }
            Self::SessionUnavailable => {
                "The assistant session is not running; answering directly.".to_string()
            }
            Self::Busy => "Still working on the previous request. Please wait.".to_string(),
            Self::SecondaryModelStatus { status, .. } => {
                format!("The language model rejected the request (HTTP {}).", status)
            }
            Self::SecondaryModelTimeout { .. } => {
                "The language model took too long to answer.".to_string()
            }
            Self::SecondaryModel { message } => {
                format!("Could not reach the language model: {}", message)
            }
            _ => self.to_string(),
        }
    }
}

impl From<anyhow::Error> for AniError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            return Self::Io(std::io::Error::new(io_err.kind(), io_err.to_string()));
        }

        Self::Internal {
            message: format!("{:#}", err),
        }
    }
}

impl From<serde_json::Error> for AniError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<reqwest::Error> for AniError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::SecondaryModelStatus {
                status: status.as_u16(),
                message: err.to_string(),
            };
        }
        Self::SecondaryModel {
            message: err.to_string(),
        }
    }
}

/// Result type alias using AniError
pub type Result<T> = std::result::Result<T, AniError>;
