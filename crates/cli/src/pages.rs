//! Codecov page extraction.
//!
//! Two HTML pages feed the scan: the pull-request files page, which
//! maps the fragment anchor to a file path, and the codecov build page
//! for the head commit, which lists one UI "card" per uploaded report
//! with its download link and a human-readable description.
//!
//! Extraction is attribute-level regex matching over tags, mirroring
//! the substring class checks the pages are scraped with upstream; this
//! is not an HTML parser and does not try to be one.

use anyhow::{bail, Context, Result};
use covscan_scanner::{ReportFetcher, ReportScanner};
use covscan_stream::Target;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;

/// Any tag, from `<` to its closing `>`
static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[a-zA-Z][^>]*>").expect("static regex"));

/// `<a ...>inner</a>` with the opening tag and inner text captured
static ANCHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)(<a\b[^>]*>)(.*?)</a>").expect("static regex"));

/// `<div class="...">inner</div>` with class value and inner captured
static DIV_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<div\b[^>]*class="([^"]*)"[^>]*>(.*?)</div>"#).expect("static regex")
});

/// One double-quoted attribute, name and value captured
static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([a-zA-Z][a-zA-Z0-9-]*)\s*=\s*"([^"]*)""#).expect("static regex")
});

/// Any tag, for stripping markup out of text fragments
static STRIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("static regex"));

/// One build card from the codecov commit page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportCard {
    pub description: String,
    pub links: Vec<String>,
}

/// Resolve the file anchor from the review URL against the page itself.
///
/// Exactly one element must carry `data-anchor="{anchor}"` with a
/// `data-path`; zero or several is an ambiguous lookup and fails
/// immediately, no retry.
pub async fn anchor_to_path(client: &Client, page_url: &str, anchor: &str) -> Result<String> {
    let response = client
        .get(page_url)
        .send()
        .await
        .with_context(|| format!("Request to {page_url} failed"))?;
    let status = response.status();
    if !status.is_success() {
        bail!("Review page {page_url} returned {status}");
    }
    let html = response.text().await.context("Review page body failed")?;
    let mut paths = data_paths_for_anchor(&html, anchor);
    if paths.len() != 1 {
        bail!(
            "Expected exactly 1 element with data-anchor={anchor:?}, found {}",
            paths.len()
        );
    }
    Ok(paths.remove(0))
}

/// Enumerate build cards, scan every download link, and return the
/// descriptions of cards whose report exercised the target line.
pub async fn builds_with_file_and_line<F: ReportFetcher>(
    client: &Client,
    scanner: &ReportScanner<F>,
    owner: &str,
    repo: &str,
    commit: &str,
    target: &Target,
) -> Result<Vec<String>> {
    let url = format!("https://codecov.io/gh/{owner}/{repo}/commit/{commit}/build");
    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("Request to {url} failed"))?;
    let status = response.status();
    if !status.is_success() {
        bail!("Codecov build page {url} returned {status}");
    }
    let html = response.text().await.context("Codecov build page body failed")?;

    let cards = extract_cards(&html);
    if cards.is_empty() {
        bail!("No build cards found at {url}");
    }
    log::info!("found {} build card(s) for commit {commit}", cards.len());

    // Flatten to an ordered link list, remembering which card owns each
    // link so verdicts can be folded back per card
    let mut links = Vec::new();
    let mut link_card = Vec::new();
    for (index, card) in cards.iter().enumerate() {
        for link in &card.links {
            links.push(link.clone());
            link_card.push(index);
        }
    }

    let verdicts = scanner.scan(&links, target).await?;

    let mut matched = vec![false; cards.len()];
    for (card_index, verdict) in link_card.into_iter().zip(verdicts) {
        if verdict {
            matched[card_index] = true;
        }
    }
    Ok(cards
        .into_iter()
        .zip(matched)
        .filter(|(_, hit)| *hit)
        .map(|(card, _)| card.description)
        .collect())
}

/// data-path values of tags carrying the requested data-anchor
fn data_paths_for_anchor(html: &str, anchor: &str) -> Vec<String> {
    let needle = format!("data-anchor=\"{anchor}\"");
    tags(html)
        .into_iter()
        .filter(|tag| tag.contains(&needle))
        .filter_map(|tag| attr_value(tag, "data-path"))
        .collect()
}

/// Split the page into card regions and extract each card's download
/// links and description. A card starts at any tag whose class value
/// contains "ui", "color" and "card", and runs to the next card start.
fn extract_cards(html: &str) -> Vec<ReportCard> {
    let starts: Vec<usize> = TAG_RE
        .find_iter(html)
        .filter(|m| {
            attr_value(m.as_str(), "class").is_some_and(|class| {
                class.contains("ui") && class.contains("color") && class.contains("card")
            })
        })
        .map(|m| m.start())
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(html.len());
            let region = &html[start..end];
            ReportCard {
                description: extract_description(region),
                links: download_links(region),
            }
        })
        .collect()
}

/// hrefs of anchors whose text contains "Download"
fn download_links(card: &str) -> Vec<String> {
    anchors(card)
        .into_iter()
        .filter(|(_, text)| text.contains("Download"))
        .filter_map(|(tag, _)| attr_value(tag, "href"))
        .collect()
}

/// Best-available label for a card: its description text, else the CI
/// build link, else the card header.
fn extract_description(card: &str) -> String {
    if let Some(text) = div_text(card, "description") {
        if !text.is_empty() {
            return text;
        }
    }
    if let Some(href) = anchors(card)
        .into_iter()
        .find(|(_, text)| text.contains("View CI Build"))
        .and_then(|(tag, _)| attr_value(tag, "href"))
    {
        return href;
    }
    div_text(card, "header").unwrap_or_default()
}

/// Every tag in a fragment
fn tags(html: &str) -> Vec<&str> {
    TAG_RE.find_iter(html).map(|m| m.as_str()).collect()
}

/// (opening tag, stripped inner text) for every `<a>` in a fragment
fn anchors(html: &str) -> Vec<(&str, String)> {
    ANCHOR_RE
        .captures_iter(html)
        .map(|caps| {
            let tag = caps.get(1).expect("anchor tag").as_str();
            let text = strip_tags(caps.get(2).expect("anchor body").as_str());
            (tag, text)
        })
        .collect()
}

/// Stripped text of the first div whose class contains `class_token`
fn div_text(html: &str, class_token: &str) -> Option<String> {
    DIV_RE
        .captures_iter(html)
        .find(|caps| caps.get(1).expect("div class").as_str().contains(class_token))
        .map(|caps| strip_tags(caps.get(2).expect("div body").as_str()))
}

/// Double-quoted attribute value from a single tag
fn attr_value(tag: &str, name: &str) -> Option<String> {
    ATTR_RE
        .captures_iter(tag)
        .find(|caps| caps.get(1).expect("attr name").as_str() == name)
        .map(|caps| caps.get(2).expect("attr value").as_str().to_string())
}

/// Drop tags and collapse whitespace
fn strip_tags(fragment: &str) -> String {
    let text = STRIP_RE.replace_all(fragment, " ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
