//! Concurrent fan-out over candidate report links.
//!
//! One hit detection machine per link, all downloads in flight at once
//! up to the admission cap, results index-aligned with the input links.
//! The scan is all-or-nothing: the first failure cancels every sibling
//! download and propagates; there is no partial-success mode.

use crate::error::{Result, ScanError};
use crate::fetch::ReportFetcher;
use covscan_stream::{HitDetector, Target};
use futures::future::try_join_all;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Scan tuning knobs
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Maximum downloads in flight at once
    pub max_concurrency: usize,
    /// Per-download budget covering connect, status and body streaming
    pub download_timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            download_timeout: Duration::from_secs(30),
        }
    }
}

/// Runs one `HitDetector` per candidate report link, concurrently
#[derive(Debug)]
pub struct ReportScanner<F> {
    fetcher: F,
    config: ScanConfig,
}

impl<F: ReportFetcher> ReportScanner<F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_config(fetcher, ScanConfig::default())
    }

    pub fn with_config(fetcher: F, config: ScanConfig) -> Self {
        Self { fetcher, config }
    }

    /// Download every link and return one verdict per link, in input
    /// order regardless of completion order.
    pub async fn scan(&self, links: &[String], target: &Target) -> Result<Vec<bool>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        log::info!(
            "scanning {} report link(s) for {}:{}",
            links.len(),
            target.path,
            target.line
        );
        let scans = links.iter().map(|link| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .expect("scan semaphore never closed");
                match tokio::time::timeout(
                    self.config.download_timeout,
                    self.scan_one(link, target),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ScanError::Timeout {
                        url: link.clone(),
                        timeout: self.config.download_timeout,
                    }),
                }
            }
        });
        try_join_all(scans).await
    }

    /// Stream one report body through a fresh machine
    async fn scan_one(&self, link: &str, target: &Target) -> Result<bool> {
        let mut body = self.fetcher.fetch(link).await?;
        let mut machine = HitDetector::new(target.clone());
        while let Some(chunk) = body.next().await {
            machine
                .feed(&chunk?)
                .map_err(|e| ScanError::stream(link, e))?;
        }
        let verdict = machine.finish().map_err(|e| ScanError::stream(link, e))?;
        log::debug!("report {link}: verdict {verdict}");
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::ByteStream;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const GOOD_HIT: &str = "<<<<<< network\n# path=coverage.xml\n\
        <coverage><packages><package><classes>\n\
        <class filename=\"src/foo.py\" name=\"foo\">\n\
        <lines><line number=\"42\" hits=\"3\"/></lines></class>\n\
        </classes></package></packages></coverage>\n<<<<<< EOF\n";

    const GOOD_MISS: &str = "<<<<<< network\n# path=coverage.xml\n\
        <coverage><packages><package><classes>\n\
        <class filename=\"src/foo.py\" name=\"foo\">\n\
        <lines><line number=\"42\" hits=\"0\"/></lines></class>\n\
        </classes></package></packages></coverage>\n<<<<<< EOF\n";

    const BAD_XML: &str = "<<<<<< network\n# path=coverage.xml\n\
        <coverage></oops>\n<<<<<< EOF\n";

    enum Canned {
        Body { text: &'static str, delay_ms: u64 },
        Status(u16),
    }

    #[derive(Default)]
    struct FakeFetcher {
        responses: HashMap<String, Canned>,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl FakeFetcher {
        fn with(responses: Vec<(&str, Canned)>) -> Self {
            Self {
                responses: responses
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl ReportFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<ByteStream> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
            let result = match self.responses.get(url).expect("unexpected url") {
                Canned::Status(status) => Err(ScanError::status(url, *status)),
                Canned::Body { text, delay_ms } => {
                    tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                    let chunks: Vec<Result<Bytes>> = text
                        .as_bytes()
                        .chunks(11)
                        .map(|c| Ok(Bytes::copy_from_slice(c)))
                        .collect();
                    Ok(futures::stream::iter(chunks).boxed())
                }
            };
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    fn links(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn target() -> Target {
        Target::new("src/foo.py", "42")
    }

    #[tokio::test]
    async fn test_verdicts_align_with_input_order() {
        // A is slowest, C is fastest: completion order must not leak
        let fetcher = FakeFetcher::with(vec![
            ("a", Canned::Body { text: GOOD_HIT, delay_ms: 40 }),
            ("b", Canned::Body { text: GOOD_MISS, delay_ms: 0 }),
            ("c", Canned::Body { text: GOOD_HIT, delay_ms: 10 }),
        ]);
        let scanner = ReportScanner::new(fetcher);
        let verdicts = scanner
            .scan(&links(&["a", "b", "c"]), &target())
            .await
            .expect("scan");
        assert_eq!(verdicts, vec![true, false, true]);
    }

    #[tokio::test]
    async fn test_failed_download_fails_whole_scan() {
        let fetcher = FakeFetcher::with(vec![
            ("a", Canned::Body { text: GOOD_HIT, delay_ms: 0 }),
            ("b", Canned::Status(500)),
            ("c", Canned::Body { text: GOOD_HIT, delay_ms: 50 }),
        ]);
        let scanner = ReportScanner::new(fetcher);
        let err = scanner
            .scan(&links(&["a", "b", "c"]), &target())
            .await
            .expect_err("fail fast");
        assert!(matches!(err, ScanError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_malformed_xml_fails_whole_scan() {
        let fetcher = FakeFetcher::with(vec![
            ("a", Canned::Body { text: GOOD_HIT, delay_ms: 0 }),
            ("b", Canned::Body { text: BAD_XML, delay_ms: 0 }),
        ]);
        let scanner = ReportScanner::new(fetcher);
        let err = scanner
            .scan(&links(&["a", "b"]), &target())
            .await
            .expect_err("fail fast");
        assert!(matches!(err, ScanError::Stream { .. }));
    }

    #[tokio::test]
    async fn test_concurrency_cap_is_respected() {
        const NAMES: [&str; 6] = ["l0", "l1", "l2", "l3", "l4", "l5"];
        let fetcher = FakeFetcher::with(
            NAMES
                .iter()
                .map(|n| (*n, Canned::Body { text: GOOD_MISS, delay_ms: 20 }))
                .collect(),
        );
        let scanner = ReportScanner::with_config(
            fetcher,
            ScanConfig {
                max_concurrency: 2,
                ..ScanConfig::default()
            },
        );
        let verdicts = scanner.scan(&links(&NAMES), &target()).await.expect("scan");
        assert_eq!(verdicts.len(), 6);
        assert!(
            scanner.fetcher.peak_in_flight.load(Ordering::SeqCst) <= 2,
            "cap exceeded"
        );
    }

    #[tokio::test]
    async fn test_stalled_download_times_out() {
        let fetcher = FakeFetcher::with(vec![(
            "slow",
            Canned::Body { text: GOOD_HIT, delay_ms: 500 },
        )]);
        let scanner = ReportScanner::with_config(
            fetcher,
            ScanConfig {
                download_timeout: Duration::from_millis(50),
                ..ScanConfig::default()
            },
        );
        let err = scanner
            .scan(&links(&["slow"]), &target())
            .await
            .expect_err("timeout");
        assert!(matches!(err, ScanError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_empty_link_list_is_empty_result() {
        let scanner = ReportScanner::new(FakeFetcher::default());
        let verdicts = scanner.scan(&[], &target()).await.expect("scan");
        assert!(verdicts.is_empty());
    }
}
