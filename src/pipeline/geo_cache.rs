//! Memoized host → geolocation lookups.
//!
//! A hit never touches the network. Records are never refreshed; the cache
//! is bounded and drops the oldest-inserted host once full.

use crate::error::{describe_transport_error, PipelineError};
use crate::models::GeoLocation;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::{debug, info};

/// Configuration for the geolocation collaborator.
#[derive(Debug, Clone)]
pub struct GeoConfig {
    /// Base URL; the host is appended as the last path segment.
    pub base_url: String,
    pub timeout_seconds: u64,
    /// Maximum number of cached hosts.
    pub capacity: usize,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            base_url: "http://ip-api.com/json".to_string(),
            timeout_seconds: 10,
            capacity: 10_000,
        }
    }
}

#[derive(Default)]
struct Entries {
    records: HashMap<String, GeoLocation>,
    /// Insertion order, oldest first.
    order: VecDeque<String>,
}

/// Caching client for the geolocation collaborator.
pub struct GeoCache {
    config: GeoConfig,
    http_client: reqwest::Client,
    entries: RwLock<Entries>,
}

impl GeoCache {
    pub fn new(config: GeoConfig) -> Result<Self, reqwest::Error> {
        info!(
            "Geolocation cache using {} (capacity {})",
            config.base_url, config.capacity
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            http_client,
            entries: RwLock::new(Entries::default()),
        })
    }

    /// Resolve a host, from cache when possible.
    pub async fn lookup(&self, host: &str) -> Result<GeoLocation, PipelineError> {
        if let Some(record) = self.cached(host) {
            debug!("Geolocation cache hit for {}", host);
            return Ok(record);
        }

        debug!("Geolocation cache miss for {}", host);
        let record = self.fetch(host).await?;
        self.insert(host, record.clone());
        Ok(record)
    }

    /// Cached record for a host, without any outbound call.
    pub fn cached(&self, host: &str) -> Option<GeoLocation> {
        self.entries.read().records.get(host).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().records.len()
    }

    async fn fetch(&self, host: &str) -> Result<GeoLocation, PipelineError> {
        let url = self.lookup_url(host)?;

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| {
                PipelineError::lookup(host, describe_transport_error(&e, self.config.timeout_seconds))
            })?;

        if !response.status().is_success() {
            return Err(PipelineError::lookup(
                host,
                format!("geolocation API error {}", response.status()),
            ));
        }

        response
            .json::<GeoLocation>()
            .await
            .map_err(|e| PipelineError::lookup(host, format!("unparseable response: {}", e)))
    }

    /// Base URL with the host appended as a single encoded path segment.
    fn lookup_url(&self, host: &str) -> Result<reqwest::Url, PipelineError> {
        let mut url = reqwest::Url::parse(&self.config.base_url)
            .map_err(|e| PipelineError::lookup(host, format!("invalid base URL: {}", e)))?;

        url.path_segments_mut()
            .map_err(|_| PipelineError::lookup(host, "base URL cannot take a path"))?
            .pop_if_empty()
            .push(host);

        Ok(url)
    }

    fn insert(&self, host: &str, record: GeoLocation) {
        let mut entries = self.entries.write();

        if entries.records.contains_key(host) {
            entries.records.insert(host.to_string(), record);
            return;
        }

        while entries.records.len() >= self.config.capacity.max(1) {
            match entries.order.pop_front() {
                Some(oldest) => {
                    entries.records.remove(&oldest);
                }
                None => break,
            }
        }

        entries.order.push_back(host.to_string());
        entries.records.insert(host.to_string(), record);
    }
}
