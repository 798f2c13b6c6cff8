//! Custom error types for TreePass.
//!
//! This module provides a centralized error handling system with specific error types
//! for the storage layer, the OneBot client and the audit workflow.

use std::fmt;

/// Main error type for TreePass operations.
#[derive(Debug)]
pub enum TreePassError {
    /// Configuration errors (missing env vars, invalid values)
    Config(String),
    /// Data store load/save errors
    Storage(String),
    /// OneBot action failures (non-ok status or retcode)
    OneBotApi(String),
    /// Network/HTTP/WebSocket errors
    Network(String),
    /// JSON (de)serialization errors
    Serialization(String),
    /// The QQ id is not in the audit list
    UserNotFound(u64),
    /// Generic I/O errors
    Io(std::io::Error),
    /// Invalid input errors (bad QQ ids, malformed arguments)
    InvalidInput(String),
}

impl fmt::Display for TreePassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Storage(msg) => write!(f, "Storage error: {}", msg),
            Self::OneBotApi(msg) => write!(f, "OneBot API error: {}", msg),
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Self::UserNotFound(qq) => write!(f, "User with QQ ID {} not found", qq),
            Self::Io(err) => write!(f, "I/O error: {}", err),
            Self::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for TreePassError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TreePassError::Io(err) => Some(err),
            _ => None,
        }
    }
}

// Implement From traits for automatic error conversion
impl From<std::io::Error> for TreePassError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<reqwest::Error> for TreePassError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TreePassError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Network(format!("WebSocket error: {}", err))
    }
}

impl From<serde_json::Error> for TreePassError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<regex::Error> for TreePassError {
    fn from(err: regex::Error) -> Self {
        Self::Config(format!("Invalid pattern: {}", err))
    }
}

impl From<tokio::task::JoinError> for TreePassError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Storage(format!("Task join error: {}", err))
    }
}

/// Result type alias for TreePass operations.
pub type Result<T> = std::result::Result<T, TreePassError>;
