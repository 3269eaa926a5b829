//! Error types surfaced by the fetch and pagination engines.

/// Result type alias for network-boundary operations.
pub type Result<T> = std::result::Result<T, FetchError>;

/// Failures a transport or paged source can report.
///
/// `Cancelled` is never shown to the user: controllers swallow it and leave
/// their state untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    /// Server answered with a non-2xx status
    #[error("HTTP {status}")]
    Http { status: u16 },

    /// Request never produced a response
    #[error("{0}")]
    Network(String),

    /// Body could not be read as the expected structure
    #[error("Could not decode response: {0}")]
    Decode(String),

    /// Operation was aborted before it settled
    #[error("Request cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}
