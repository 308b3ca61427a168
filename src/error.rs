//! Error types for the library client

use thiserror::Error;

use crate::validation::FieldErrors;

/// Message shown when the backend gives no usable reason for a failure
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// Main client error type.
///
/// Cloneable so that one failed in-flight request can be handed to every
/// caller waiting on it.
#[derive(Error, Debug, Clone)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(FieldErrors),

    #[error("Not borrowable: {0}")]
    NotBorrowable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request failed ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Single message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(errors) => errors.to_string(),
            AppError::NotBorrowable(msg) | AppError::NotFound(msg) => msg.clone(),
            AppError::Api { message, .. } if !message.trim().is_empty() => message.clone(),
            AppError::Api { .. } | AppError::Transport(_) | AppError::Decode(_) => {
                GENERIC_ERROR_MESSAGE.to_string()
            }
            AppError::Config(msg) => format!("Configuration error: {}", msg),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// True for errors raised before any request was sent
    pub fn is_local(&self) -> bool {
        matches!(self, AppError::Validation(_) | AppError::NotBorrowable(_))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AppError::Transport(format!("Request timed out: {}", e))
        } else if e.is_decode() {
            AppError::Decode(e.to_string())
        } else {
            AppError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Decode(e.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

/// Result type alias for client operations
pub type AppResult<T> = Result<T, AppError>;
