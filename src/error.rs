//! Application error types

use serde::Serialize;
use thiserror::Error;

/// Postgres error code reported by the backend for a unique-key violation
pub const UNIQUE_VIOLATION: &str = "23505";

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Auth failures carry the backend's message verbatim
    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    Validation(String),

    #[error("Backend error: {message}")]
    Backend {
        code: Option<String>,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn backend(code: Option<&str>, message: impl Into<String>) -> Self {
        AppError::Backend {
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    /// True when the backend rejected an insert on a unique key
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, AppError::Backend { code: Some(code), .. } if code == UNIQUE_VIOLATION)
    }

    /// Message suitable for showing to the user as-is
    pub fn user_message(&self) -> String {
        match self {
            AppError::Auth(msg) | AppError::Validation(msg) => msg.clone(),
            AppError::Backend { message, .. } if !message.is_empty() => message.clone(),
            _ => "An error occurred".to_string(),
        }
    }
}

/// Serializable error response for the UI layer
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(err: AppError) -> Self {
        let code = match &err {
            AppError::Serialization(_) => "SERIALIZATION_ERROR".to_string(),
            AppError::Http(_) => "HTTP_ERROR".to_string(),
            AppError::Auth(_) => "AUTH_ERROR".to_string(),
            AppError::Validation(_) => "VALIDATION_ERROR".to_string(),
            AppError::Backend { code: Some(code), .. } => code.clone(),
            AppError::Backend { code: None, .. } => "BACKEND_ERROR".to_string(),
            AppError::Config(_) => "CONFIG_ERROR".to_string(),
            AppError::Internal(_) => "INTERNAL_ERROR".to_string(),
        };

        ErrorResponse {
            code,
            message: err.to_string(),
        }
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        let response = ErrorResponse {
            code: "ERROR".to_string(),
            message: self.to_string(),
        };
        response.serialize(serializer)
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
