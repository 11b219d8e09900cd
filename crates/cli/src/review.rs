//! Review URL parsing.
//!
//! The tool takes the URL a reviewer is looking at, e.g.
//! `https://github.com/twisted/twisted/pull/1234/files#diff-3ed07ab7R742`,
//! and pulls out everything the scan needs: repository coordinates,
//! pull request number, the file anchor and the line number.

use anyhow::{bail, Context, Result};
use reqwest::Url;

/// Coordinates extracted from a pull-request files URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewUrl {
    pub owner: String,
    pub repo: String,
    pub pull_number: u64,
    /// Opaque per-file anchor from the fragment, resolved to a path
    /// against the page itself
    pub anchor: String,
    /// Line number as text, the way reports encode it
    pub line: String,
}

pub fn parse_review_url(raw: &str) -> Result<ReviewUrl> {
    let url = Url::parse(raw).with_context(|| format!("Invalid review URL {raw:?}"))?;
    let segments: Vec<&str> = url
        .path_segments()
        .context("Review URL has no path")?
        .filter(|s| !s.is_empty())
        .collect();
    // /{owner}/{repo}/pull/{number}/files
    let [owner, repo, rest @ ..] = segments.as_slice() else {
        bail!("Review URL path is too short: {raw:?}");
    };
    if rest.len() < 2 {
        bail!("Review URL path is too short: {raw:?}");
    }
    let pull_number: u64 = rest[rest.len() - 2]
        .parse()
        .with_context(|| format!("Review URL has no pull request number: {raw:?}"))?;

    // The fragment is "<anchor>R<line>"; the anchor itself may contain
    // an R, so split on the last one
    let fragment = url
        .fragment()
        .context("Review URL has no #fragment with a line anchor")?;
    let (anchor, line) = fragment
        .rsplit_once('R')
        .with_context(|| format!("Fragment {fragment:?} has no R<line> suffix"))?;
    if line.is_empty() || !line.bytes().all(|b| b.is_ascii_digit()) {
        bail!("Fragment {fragment:?} does not end in a line number");
    }

    Ok(ReviewUrl {
        owner: (*owner).to_string(),
        repo: (*repo).to_string(),
        pull_number,
        anchor: anchor.to_string(),
        line: line.to_string(),
    })
}
