use anyhow::{Context, Result};
use clap::Parser;

use crate::reconcile::PollConfig;

/// Paragraphs API terminal client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Base URL of the Paragraphs API
    #[arg(short = 'u', long, env = "PARAGRAPHS_BASE_URL")]
    pub base_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP connect timeout in seconds
    #[arg(long, env = "HTTP_CONNECT_TIMEOUT", default_value = "10")]
    pub connect_timeout: u64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,

    /// How many times to re-fetch the list after a submission
    #[arg(long, env = "POLL_MAX_ATTEMPTS", default_value = "5")]
    pub poll_max_attempts: u32,

    /// Delay between post-submission fetches in milliseconds
    #[arg(long, env = "POLL_INTERVAL_MS", default_value = "2000")]
    pub poll_interval_ms: u64,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub base_url: String,

    // HTTP client
    pub connect_timeout: u64,
    pub request_timeout: u64,

    // Post-write reconciliation
    pub poll_max_attempts: u32,
    pub poll_interval_ms: u64,

    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        Self::from_args(args)
    }

    fn from_args(args: CliArgs) -> Result<Self> {
        let base_url = args
            .base_url
            .context("PARAGRAPHS_BASE_URL is required (use -u or set PARAGRAPHS_BASE_URL)")?
            .trim_end_matches('/')
            .to_string();

        Ok(Config {
            base_url,
            connect_timeout: args.connect_timeout,
            request_timeout: args.request_timeout,
            poll_max_attempts: args.poll_max_attempts,
            poll_interval_ms: args.poll_interval_ms,
            log_level: args.log_level,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            anyhow::bail!("base URL must start with http:// or https://: {}", self.base_url);
        }

        if self.poll_max_attempts == 0 {
            anyhow::bail!("POLL_MAX_ATTEMPTS must be at least 1");
        }

        if self.poll_interval_ms == 0 {
            anyhow::bail!("POLL_INTERVAL_MS must be at least 1");
        }

        Ok(())
    }

    /// Poll bounds for the reconciliation loop
    pub fn poll(&self) -> PollConfig {
        PollConfig::new(self.poll_max_attempts, self.poll_interval_ms)
    }
}
