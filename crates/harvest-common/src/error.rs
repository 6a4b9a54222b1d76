//! Error types for Harvest

use thiserror::Error;

/// Result type alias for Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Main error type for Harvest
///
/// The extraction-facing variants map to distinct recovery policies:
/// [`HarvestError::RetriableAuth`] is retried with backoff by the session,
/// [`HarvestError::Substitution`] is recovered locally by falling back to the
/// unresolved template, and [`HarvestError::UnsupportedShape`] aborts the
/// record or schema that produced it.
#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Template substitution failed: {0}")]
    Substitution(String),

    #[error("Unsupported record shape: {0}")]
    UnsupportedShape(String),

    #[error("Retriable authentication failure: {0}")]
    RetriableAuth(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl HarvestError {
    /// Whether this error is recoverable by re-authenticating and retrying.
    pub fn is_retriable(&self) -> bool {
        matches!(self, HarvestError::RetriableAuth(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_classification() {
        assert!(HarvestError::RetriableAuth("token expired".into()).is_retriable());
        assert!(!HarvestError::Transport("connection reset".into()).is_retriable());
        assert!(!HarvestError::UnsupportedShape("union".into()).is_retriable());
    }

    #[test]
    fn test_display_messages() {
        let err = HarvestError::Substitution("unresolved placeholder".into());
        assert_eq!(
            err.to_string(),
            "Template substitution failed: unresolved placeholder"
        );
    }
}
