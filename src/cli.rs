//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Values left unset fall back to the config file.

use clap::Parser;
use std::path::PathBuf;

/// ThreatGlobe - live malicious-URL threat map backend
///
/// Polls a public feed of recently reported malicious URLs, geolocates each
/// host, keeps a bounded window of recent events in memory and serves them
/// over HTTP together with frequency summaries and an AI situation report.
///
/// Examples:
///   threatglobe
///   threatglobe --port 8080 --poll-interval 60
///   threatglobe --config ./threatglobe.toml --verbose
///   threatglobe --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .threatglobe.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address to bind the HTTP server to
    #[arg(long, value_name = "HOST", env = "THREATGLOBE_HOST")]
    pub host: Option<String>,

    /// Port to bind the HTTP server to
    #[arg(short, long, value_name = "PORT", env = "THREATGLOBE_PORT")]
    pub port: Option<u16>,

    /// Upstream feed endpoint
    #[arg(long, value_name = "URL")]
    pub feed_url: Option<String>,

    /// API key for the upstream feed (sent as Auth-Key)
    #[arg(long, env = "AUTH_KEY", hide_env_values = true)]
    pub feed_api_key: Option<String>,

    /// Geolocation endpoint (the host is appended as a path segment)
    #[arg(long, value_name = "URL")]
    pub geo_url: Option<String>,

    /// OpenAI-compatible text-completion endpoint
    #[arg(long, value_name = "URL", env = "AI_BASE_URL")]
    pub ai_url: Option<String>,

    /// Model used for situation reports
    #[arg(long, value_name = "MODEL", env = "AI_MODEL")]
    pub ai_model: Option<String>,

    /// API key for the text-completion endpoint
    #[arg(long, env = "AI_API_KEY", hide_env_values = true)]
    pub ai_api_key: Option<String>,

    /// Seconds between feed poll cycles
    #[arg(long, value_name = "SECS")]
    pub poll_interval: Option<u64>,

    /// Maximum feed entries processed per cycle
    #[arg(long, value_name = "COUNT")]
    pub max_entries: Option<usize>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .threatglobe.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        for (name, url) in [
            ("Feed URL", &self.feed_url),
            ("Geolocation URL", &self.geo_url),
            ("AI URL", &self.ai_url),
        ] {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(format!("{} must start with 'http://' or 'https://'", name));
                }
            }
        }

        if self.poll_interval == Some(0) {
            return Err("Poll interval must be at least 1 second".to_string());
        }

        if self.max_entries == Some(0) {
            return Err("Max entries must be at least 1".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
