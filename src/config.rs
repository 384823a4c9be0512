//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.threatglobe.toml` files. API keys never live in the file; they come
//! from the environment through the CLI.

use crate::pipeline::{FeedConfig, GeoConfig};
use crate::report::CompletionConfig;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".threatglobe.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub feed: FeedSection,

    #[serde(default)]
    pub geo: GeoSection,

    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub narrative: NarrativeSection,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

/// Upstream feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSection {
    #[serde(default = "default_feed_url")]
    pub url: String,

    /// Identifier stamped on every event.
    #[serde(default = "default_source")]
    pub source: String,

    /// Seconds between poll cycles.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Entries taken from the head of each response.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            source: default_source(),
            interval_seconds: default_interval(),
            timeout_seconds: default_timeout(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_feed_url() -> String {
    "https://urlhaus-api.abuse.ch/v1/urls/recent/".to_string()
}

fn default_source() -> String {
    "urlhaus".to_string()
}

fn default_interval() -> u64 {
    120 // every 2 min
}

fn default_timeout() -> u64 {
    10
}

fn default_max_entries() -> usize {
    50
}

/// Geolocation collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoSection {
    #[serde(default = "default_geo_url")]
    pub url: String,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Maximum number of cached hosts.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for GeoSection {
    fn default() -> Self {
        Self {
            url: default_geo_url(),
            timeout_seconds: default_timeout(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

fn default_geo_url() -> String {
    "http://ip-api.com/json".to_string()
}

fn default_cache_capacity() -> usize {
    10_000
}

/// Event store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Events considered by the recent summary and the SITREP.
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            recent_window: default_recent_window(),
        }
    }
}

fn default_capacity() -> usize {
    crate::pipeline::store::DEFAULT_CAPACITY
}

fn default_recent_window() -> usize {
    crate::analysis::RECENT_WINDOW
}

/// Text-completion collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeSection {
    /// OpenAI-compatible base URL.
    #[serde(default = "default_ai_url")]
    pub url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_ai_timeout")]
    pub timeout_seconds: u64,
}

impl Default for NarrativeSection {
    fn default() -> Self {
        Self {
            url: default_ai_url(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_seconds: default_ai_timeout(),
        }
    }
}

fn default_ai_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_ai_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given explicitly on the command line (or via env) override
    /// the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref host) = args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }

        if let Some(ref url) = args.feed_url {
            self.feed.url = url.clone();
        }
        if let Some(interval) = args.poll_interval {
            self.feed.interval_seconds = interval;
        }
        if let Some(max_entries) = args.max_entries {
            self.feed.max_entries = max_entries;
        }

        if let Some(ref url) = args.geo_url {
            self.geo.url = url.clone();
        }

        if let Some(ref url) = args.ai_url {
            self.narrative.url = url.clone();
        }
        if let Some(ref model) = args.ai_model {
            self.narrative.model = model.clone();
        }
    }

    /// Reject values that would break the poll cadence or every outbound call.
    ///
    /// Run after `merge_with_args`, so file and CLI values are checked alike.
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("feed.url", &self.feed.url),
            ("geo.url", &self.geo.url),
            ("narrative.url", &self.narrative.url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                bail!("{} must start with 'http://' or 'https://': {}", name, url);
            }
        }

        if self.feed.interval_seconds == 0 {
            bail!("feed.interval_seconds must be at least 1");
        }
        if self.feed.max_entries == 0 {
            bail!("feed.max_entries must be at least 1");
        }

        for (name, timeout) in [
            ("feed.timeout_seconds", self.feed.timeout_seconds),
            ("geo.timeout_seconds", self.geo.timeout_seconds),
            ("narrative.timeout_seconds", self.narrative.timeout_seconds),
        ] {
            if timeout == 0 {
                bail!("{} must be at least 1", name);
            }
        }

        Ok(())
    }

    /// Feed poller settings, with the API key from the environment.
    pub fn feed_config(&self, api_key: Option<String>) -> FeedConfig {
        FeedConfig {
            url: self.feed.url.clone(),
            api_key,
            source: self.feed.source.clone(),
            interval_seconds: self.feed.interval_seconds,
            timeout_seconds: self.feed.timeout_seconds,
            max_entries: self.feed.max_entries,
        }
    }

    pub fn geo_config(&self) -> GeoConfig {
        GeoConfig {
            base_url: self.geo.url.clone(),
            timeout_seconds: self.geo.timeout_seconds,
            capacity: self.geo.cache_capacity,
        }
    }

    pub fn completion_config(&self, api_key: Option<String>) -> CompletionConfig {
        CompletionConfig {
            base_url: self.narrative.url.clone(),
            api_key,
            model: self.narrative.model.clone(),
            temperature: self.narrative.temperature,
            timeout_seconds: self.narrative.timeout_seconds,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
