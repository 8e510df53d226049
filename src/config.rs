use crate::scrapers::browser::ChromeOptions;
use crate::scrapers::types::Selectors;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_URL: &str = "https://www.oliveyoung.co.kr/store/main/getBestList.do";

/// Daily best-seller ranking scraper
#[derive(Debug, Parser)]
#[command(name = "ranking-scout", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub options: Options,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Extract the ranking and save today's snapshot
    Scrape,
    /// Send the most recent snapshot to the webhook
    Notify,
    /// Scrape, then notify when a webhook is configured
    Run,
}

#[derive(Debug, Clone, Args)]
pub struct Options {
    /// Ranking page to extract
    #[arg(long, env = "RANKING_URL", default_value = DEFAULT_URL, global = true)]
    pub url: String,

    /// Directory holding ranking_<date>.json snapshots
    #[arg(long, env = "RANKING_OUTPUT_DIR", default_value = ".", global = true)]
    pub output_dir: PathBuf,

    /// Maximum number of products to keep (0 keeps all)
    #[arg(long, env = "RANKING_MAX_ITEMS", default_value_t = 100, global = true)]
    pub max_items: usize,

    /// Seconds to wait for each candidate card selector
    #[arg(long, env = "RANKING_WAIT_TIMEOUT_SECS", default_value_t = 35, global = true)]
    pub wait_timeout_secs: u64,

    /// Page loads tried before navigation or listing failures are final
    #[arg(long, env = "RANKING_MAX_ATTEMPTS", default_value_t = 3, global = true)]
    pub max_attempts: u32,

    /// Seconds allowed for page navigation
    #[arg(long, default_value_t = 60, global = true)]
    pub nav_timeout_secs: u64,

    /// Number of products listed in the notification
    #[arg(long, default_value_t = 10, global = true)]
    pub top_n: usize,

    /// Slack incoming webhook URL
    #[arg(long, env = "SLACK_WEBHOOK_URL", hide_env_values = true, global = true)]
    pub webhook_url: Option<String>,

    /// JSON file overriding the built-in selector candidates
    #[arg(long, global = true)]
    pub selectors: Option<PathBuf>,

    /// Extract from a saved HTML page instead of launching Chrome
    #[arg(long, global = true)]
    pub from_html: Option<PathBuf>,

    /// Show the browser window
    #[arg(long, global = true)]
    pub headful: bool,

    /// Where page dumps go when no listing is found
    #[arg(long, default_value = "debug", global = true)]
    pub debug_dir: PathBuf,
}

/// Resolved settings for one invocation
#[derive(Debug, Clone)]
pub struct Config {
    pub url: String,
    pub output_dir: PathBuf,
    pub max_items: Option<usize>,
    pub wait_timeout: Duration,
    /// At least 1
    pub max_attempts: u32,
    pub top_n: usize,
    pub webhook_url: Option<String>,
    pub selectors: Selectors,
    pub from_html: Option<PathBuf>,
    pub debug_dir: PathBuf,
    pub chrome: ChromeOptions,
}

impl Config {
    pub fn from_options(options: Options) -> Result<Self> {
        let selectors = match &options.selectors {
            Some(path) => load_selectors(path)?,
            None => Selectors::default(),
        };

        let chrome = ChromeOptions {
            headless: !options.headful,
            navigation_timeout: Duration::from_secs(options.nav_timeout_secs),
            ..ChromeOptions::default()
        };

        Ok(Self {
            url: options.url,
            output_dir: options.output_dir,
            max_items: (options.max_items > 0).then_some(options.max_items),
            wait_timeout: Duration::from_secs(options.wait_timeout_secs),
            max_attempts: options.max_attempts.max(1),
            top_n: options.top_n,
            webhook_url: options.webhook_url.filter(|url| !url.trim().is_empty()),
            selectors,
            from_html: options.from_html,
            debug_dir: options.debug_dir,
            chrome,
        })
    }
}

fn load_selectors(path: &Path) -> Result<Selectors> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read selectors from {}", path.display()))?;
    let selectors: Selectors = serde_json::from_str(&raw)
        .with_context(|| format!("Malformed selectors file {}", path.display()))?;

    if selectors.card.is_empty() {
        anyhow::bail!("Selectors file {} lists no card selectors", path.display());
    }
    Ok(selectors)
}
