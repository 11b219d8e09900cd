use anyhow::{Context as AnyhowContext, Result};
use clap::Parser;
use covscan_scanner::{HttpFetcher, ReportScanner, ScanConfig, USER_AGENT};
use covscan_stream::Target;
use serde::Serialize;
use std::env;
use std::time::Duration;

mod github;
mod pages;
mod review;

#[derive(Parser)]
#[command(name = "which-build")]
#[command(about = "Find which CI coverage reports exercised a reviewed line", long_about = None)]
#[command(version)]
struct Cli {
    /// Pull request files URL, including the #diff-...R<line> fragment
    url: String,

    /// GitHub API token (falls back to COVSCAN_GITHUB_TOKEN)
    #[arg(long)]
    github_token: Option<String>,

    /// Maximum concurrent report downloads
    #[arg(long, default_value_t = 8)]
    max_concurrency: usize,

    /// Per-download timeout in seconds
    #[arg(long, default_value_t = 30)]
    download_timeout: u64,

    /// Output machine-readable JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for results)
    #[arg(long)]
    quiet: bool,
}

#[derive(Serialize)]
struct ScanOutput<'a> {
    commit: &'a str,
    path: &'a str,
    line: &'a str,
    builds: &'a [String],
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();

    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let review = review::parse_review_url(&cli.url)?;
    let token = cli
        .github_token
        .clone()
        .or_else(|| env::var("COVSCAN_GITHUB_TOKEN").ok());
    if token.is_none() {
        log::debug!("no GitHub token configured; API requests are unauthenticated");
    }

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")?;

    let commit = github::tip_of_branch(
        &client,
        token.as_deref(),
        &review.owner,
        &review.repo,
        review.pull_number,
    )
    .await?;
    log::info!("pull request #{} head is {commit}", review.pull_number);

    let path = pages::anchor_to_path(&client, &cli.url, &review.anchor).await?;
    let target = Target::new(path, review.line.clone());
    log::info!("looking for reports covering {}:{}", target.path, target.line);

    let scanner = ReportScanner::with_config(
        HttpFetcher::with_client(client.clone()),
        ScanConfig {
            max_concurrency: cli.max_concurrency,
            download_timeout: Duration::from_secs(cli.download_timeout),
        },
    );
    let builds = pages::builds_with_file_and_line(
        &client,
        &scanner,
        &review.owner,
        &review.repo,
        &commit,
        &target,
    )
    .await?;

    if cli.json {
        let output = ScanOutput {
            commit: &commit,
            path: &target.path,
            line: &target.line,
            builds: &builds,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if builds.is_empty() {
        log::warn!(
            "no coverage report exercised {}:{}",
            target.path,
            target.line
        );
    } else {
        for build in &builds {
            println!("{build}");
        }
    }
    Ok(())
}
