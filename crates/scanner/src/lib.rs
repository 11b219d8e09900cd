//! # Covscan Scanner
//!
//! Concurrent fan-out of hit detection over many candidate coverage
//! reports. Given an ordered list of report download links and a
//! target file/line, every link is streamed through its own
//! [`covscan_stream::HitDetector`] and the verdicts come back aligned
//! with the input order.
//!
//! Failure policy is all-or-nothing: the first non-success status,
//! transport error, timeout or malformed document cancels the sibling
//! downloads and fails the scan. Callers that want partial results
//! must scan links individually.

mod error;
mod fetch;
mod scanner;

pub use error::{Result, ScanError};
pub use fetch::{ByteStream, HttpFetcher, ReportFetcher, USER_AGENT};
pub use scanner::{ReportScanner, ScanConfig};
