//! Error types for the AzureRM provider

use thiserror::Error;

/// Result type alias using the provider Error
pub type Result<T> = std::result::Result<T, Error>;

/// Provider error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Cannot parse Azure ID {input:?}: {reason}")]
    InvalidResourceId { input: String, reason: String },

    #[error("Unable to parse {kind} ID {input:?}: {source}")]
    ParseId {
        kind: &'static str,
        input: String,
        #[source]
        source: Box<Error>,
    },

    #[error("ID was missing the `{0}` element")]
    MissingSegment(String),

    #[error("ID contained empty segments: {0:?}")]
    EmptySegment(String),

    #[error("ID contained more segments than required: {id:?}, {remaining:?}")]
    UnexpectedSegments { id: String, remaining: Vec<String> },

    #[error("Invalid attribute {key:?}: {reason}")]
    InvalidAttribute { key: String, reason: String },

    #[error("Resource not found: {kind} with id {id}")]
    NotFound { kind: String, id: String },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Timed out after {seconds}s waiting for the operation to complete")]
    Timeout { seconds: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for an attribute error on `key`
    pub fn attribute(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidAttribute {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error represents a missing remote resource
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. } | Error::Api { status: 404, .. })
    }
}
