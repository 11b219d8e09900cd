//! The link-download capability.
//!
//! The scanner only needs "give me a byte stream for this URL after a
//! status check"; everything HTTP-specific lives behind `ReportFetcher`
//! so tests can substitute in-memory streams.

use crate::error::{Result, ScanError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};

/// User agent sent on every outbound request
pub const USER_AGENT: &str = "covscan-forensics";

/// A streamed download body
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Capability to download one report link as a byte stream.
///
/// Implementations must surface a non-success status as an error before
/// yielding any body bytes.
#[async_trait]
pub trait ReportFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ByteStream>;
}

/// reqwest-backed fetcher used in production
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// Reuse an existing client (shared connection pool, custom TLS)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReportFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<ByteStream> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::status(url, status.as_u16()));
        }
        log::debug!("downloading report {url}");
        Ok(response.bytes_stream().map_err(ScanError::Http).boxed())
    }
}
