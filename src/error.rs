use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// StatementError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum StatementError {
    #[error("Failed to parse where clause \"{text}\": {message}")]
    Parse { text: String, message: String },

    #[error("Unsupported expression in where clause: {0}")]
    Unsupported(String),

    #[error("Missing value for parameter #{index} ({provided} provided)")]
    MissingParameter { index: usize, provided: usize },

    #[error("Invalid order by clause \"{0}\"")]
    InvalidOrderBy(String),

    #[error("{name} must be a non-negative integer, received {value}")]
    InvalidWindow { name: &'static str, value: Value },

    #[error("Invalid LIKE pattern \"{pattern}\": {message}")]
    InvalidPattern { pattern: String, message: String },
}

// ---------------------------------------------------------------------------
// RepositoryError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    #[error("Value is not a valid {model}: {reason}")]
    TypeMismatch { model: String, reason: String },

    #[error("No {model} with uuid \"{uuid}\" in this repository")]
    NotFound { model: String, uuid: String },

    #[error("Repository \"{0}\" has been destroyed")]
    Destroyed(String),
}

// ---------------------------------------------------------------------------
// ConnectorError
// ---------------------------------------------------------------------------

/// Failure reported by a backing-store connector. Never fatal to the repository.
#[derive(Debug, Clone, Error)]
#[error("Connector \"{connector}\" failed: {message}")]
pub struct ConnectorError {
    pub connector: String,
    pub message: String,
}

impl ConnectorError {
    pub fn new(connector: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            connector: connector.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// LiveSetError: top-level rollup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum LiveSetError {
    #[error(transparent)]
    Statement(#[from] StatementError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error("Query was unsubscribed before it produced a result")]
    Closed,
}

pub type Result<T, E = LiveSetError> = std::result::Result<T, E>;
