use covscan_stream::StreamError;
use std::time::Duration;
use thiserror::Error;

/// Result type for scan operations
pub type Result<T> = std::result::Result<T, ScanError>;

/// Errors that can occur while scanning candidate reports.
///
/// The scan is all-or-nothing: any of these aborts the whole scan, not
/// just the stream it came from.
#[derive(Error, Debug)]
pub enum ScanError {
    /// A download returned a non-success status
    #[error("Report download failed: {url} returned status {status}")]
    Status { url: String, status: u16 },

    /// The connection failed or the body stream broke mid-transfer
    #[error("Report transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// A download exceeded the configured per-download timeout
    #[error("Report download timed out after {timeout:?}: {url}")]
    Timeout { url: String, timeout: Duration },

    /// The embedded coverage document failed to parse
    #[error("Report stream {url}: {source}")]
    Stream {
        url: String,
        #[source]
        source: StreamError,
    },
}

impl ScanError {
    /// Create a non-success status error
    pub fn status(url: impl Into<String>, status: u16) -> Self {
        Self::Status {
            url: url.into(),
            status,
        }
    }

    /// Wrap a stream error with the link it came from
    pub fn stream(url: impl Into<String>, source: StreamError) -> Self {
        Self::Stream {
            url: url.into(),
            source,
        }
    }
}
