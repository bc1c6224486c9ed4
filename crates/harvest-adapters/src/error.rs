//! Error types for adapter operations.

use thiserror::Error;

/// Errors that can occur during adapter operations.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Adapter could not be constructed from its configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The source could not be reached before any item was collected.
    #[error("Source unavailable: {source_id}: {message}")]
    Unavailable { source_id: String, message: String },

    /// A single HTTP exchange failed.
    #[error("HTTP error (status {status:?}): {message}")]
    Http { status: Option<u16>, message: String },

    /// Response body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A raw item lacks a required field.
    #[error("Malformed item: {0}")]
    Malformed(String),
}

impl AdapterError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a source-unavailable error.
    pub fn unavailable(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP error.
    pub fn http(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Create a malformed-item error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Whether retrying the same request could succeed.
    ///
    /// Client errors other than 408 and 429 are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http {
                status: Some(code), ..
            } => !(400..500).contains(code) || *code == 408 || *code == 429,
            Self::Http { status: None, .. } => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        // URLs may carry credentials in the path
        let err = err.without_url();
        if err.is_decode() {
            return Self::Parse(err.to_string());
        }
        Self::Http {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
