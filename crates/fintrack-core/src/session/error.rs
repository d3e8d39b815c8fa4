use thiserror::Error;

/// Failures surfaced by [`SessionManager`](super::SessionManager).
///
/// Messages are captured as strings so the error can be stored as the
/// last refresh error and broadcast to every subscriber.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// `login` was called without a bearer token.
    #[error("Invalid session data: {0}")]
    InvalidSessionInput(String),

    /// The backend rejected the credentials or could not be reached.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// One of the three dashboard fetches failed; nothing was applied.
    #[error("Failed to refresh {collection}: {message}")]
    RefreshFailed {
        collection: &'static str,
        message: String,
    },

    /// A persisted entry could not be parsed and was discarded.
    #[error("Discarded corrupt storage entry '{key}': {message}")]
    StorageCorrupt { key: &'static str, message: String },
}

impl SessionError {
    pub(crate) fn refresh_failed(collection: &'static str, error: &anyhow::Error) -> Self {
        SessionError::RefreshFailed {
            collection,
            // {:#} keeps the whole context chain on one line
            message: format!("{:#}", error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_failed_keeps_context_chain() {
        let err = anyhow::anyhow!("connection refused").context("Failed to send GET request");
        let session_err = SessionError::refresh_failed("budgets", &err);
        assert_eq!(
            session_err.to_string(),
            "Failed to refresh budgets: Failed to send GET request: connection refused"
        );
    }
}
