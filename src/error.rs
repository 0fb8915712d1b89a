// src/error.rs

//! Unified error handling for the archive crawler.

use std::fmt;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Upstream responded but the pipeline cannot use the response
    #[error("Archive source error for {context}: {message}")]
    Source { context: String, message: String },

    /// Session token could not be acquired; fatal for the day
    #[error("Session token error: {0}")]
    Token(String),

    /// Content-store upload failed
    #[error("Upload error for {identifier}: {message}")]
    Upload { identifier: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an archive-source error with context.
    pub fn source(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Source {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a session token error.
    pub fn token(message: impl Into<String>) -> Self {
        Self::Token(message.into())
    }

    /// Create an upload error for a remote identifier.
    pub fn upload(identifier: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Upload {
            identifier: identifier.into(),
            message: message.to_string(),
        }
    }
}
