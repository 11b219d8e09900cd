use thiserror::Error;

/// Result type for stream processing operations
pub type Result<T> = std::result::Result<T, StreamError>;

/// Errors that can occur while decoding a report stream
#[derive(Error, Debug)]
pub enum StreamError {
    /// The embedded XML document failed to parse; fatal to its own stream
    #[error("Malformed coverage document: {0}")]
    MalformedDocument(String),
}

impl StreamError {
    /// Create a malformed-document error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedDocument(msg.into())
    }
}
