//! Pull-request head resolution via the GitHub REST API.

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct PullResponse {
    head: PullHead,
}

#[derive(Debug, Deserialize)]
struct PullHead {
    sha: String,
}

/// Resolve the head commit of a pull request.
///
/// The token is optional; unauthenticated requests work for public
/// repositories until the rate limit bites.
pub async fn tip_of_branch(
    client: &Client,
    token: Option<&str>,
    owner: &str,
    repo: &str,
    pull_number: u64,
) -> Result<String> {
    let url = format!("https://api.github.com/repos/{owner}/{repo}/pulls/{pull_number}");
    log::debug!("resolving pull request head via {url}");
    let mut request = client
        .get(&url)
        .header("accept", "application/vnd.github+json");
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    let response = request
        .send()
        .await
        .with_context(|| format!("GitHub API request to {url} failed"))?;
    let status = response.status();
    if !status.is_success() {
        bail!("GitHub API returned {status} for {url}");
    }
    let pull: PullResponse = response
        .json()
        .await
        .with_context(|| format!("GitHub API response from {url} was not a pull request"))?;
    Ok(pull.head.sha)
}
