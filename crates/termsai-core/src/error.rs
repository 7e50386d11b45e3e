use thiserror::Error;

/// Top-level error type for the TermsAI client.
#[derive(Debug, Error)]
pub enum TermsError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request aborted")]
    Aborted,

    #[error("Content filtered")]
    ContentFiltered,

    #[error("Server error: {0}")]
    ServerReported(String),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TermsError {
    /// Whether this error ends the session as a user cancellation.
    pub fn is_abort(&self) -> bool {
        matches!(self, TermsError::Aborted)
    }

    /// Whether this error is the moderation signal.
    pub fn is_filtered(&self) -> bool {
        matches!(self, TermsError::ContentFiltered)
    }
}

pub type Result<T> = std::result::Result<T, TermsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_error_display() {
        let err = TermsError::Network("connection refused".into());
        assert_eq!(err.to_string(), "Network error: connection refused");
    }

    #[test]
    fn server_reported_display() {
        let err = TermsError::ServerReported("图谱ID 9 不存在".into());
        assert_eq!(err.to_string(), "Server error: 图谱ID 9 不存在");
    }

    #[test]
    fn abort_and_filter_predicates() {
        assert!(TermsError::Aborted.is_abort());
        assert!(!TermsError::Aborted.is_filtered());
        assert!(TermsError::ContentFiltered.is_filtered());
        assert!(!TermsError::Network("x".into()).is_abort());
    }

    #[test]
    fn from_serde_error() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: TermsError = serde_err.into();
        assert!(matches!(err, TermsError::Serialization(_)));
    }
}
