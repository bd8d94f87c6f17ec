//! Error types for mneme operations

/// Result type for mneme operations
pub type Result<T> = std::result::Result<T, MnemeError>;

/// Error types for the mneme buffer and its collaborators
#[derive(Debug, thiserror::Error)]
pub enum MnemeError {
    /// Malformed input to a constructor or setter (negative capacity, unknown role)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation invoked on a buffer or session that is not usable
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The model-invocation collaborator failed or returned an unusable value
    #[error("External failure: {0}")]
    ExternalFailure(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Snapshot could not be written or read
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for MnemeError {
    fn from(s: String) -> Self {
        MnemeError::Other(s)
    }
}

impl From<&str> for MnemeError {
    fn from(s: &str) -> Self {
        MnemeError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for MnemeError {
    fn from(err: anyhow::Error) -> Self {
        MnemeError::Other(err.to_string())
    }
}
