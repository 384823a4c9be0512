//! Background feed poller.
//!
//! Runs one fetch → enrich → admit cycle per interval, forever, until the
//! shutdown channel flips. No cycle error ever ends the loop.

use crate::error::{describe_transport_error, truncate_body, PipelineError};
use crate::models::{Event, FeedResponse, Severity};
use crate::pipeline::geo_cache::GeoCache;
use crate::pipeline::store::EventStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Configuration for the upstream feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: String,
    /// Sent as the `Auth-Key` header when present.
    pub api_key: Option<String>,
    /// Identifier stamped on every event.
    pub source: String,
    pub interval_seconds: u64,
    pub timeout_seconds: u64,
    /// Entries taken from the head of each response.
    pub max_entries: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "https://urlhaus-api.abuse.ch/v1/urls/recent/".to_string(),
            api_key: None,
            source: "urlhaus".to_string(),
            interval_seconds: 120,
            timeout_seconds: 10,
            max_entries: 50,
        }
    }
}

/// Outcome counters for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Entries considered (after the head cap).
    pub fetched: usize,
    pub admitted: usize,
    pub duplicates: usize,
    pub lookup_failures: usize,
    /// Entries without a host.
    pub skipped: usize,
}

/// The single writer of the event store and geolocation cache.
pub struct FeedPoller {
    config: FeedConfig,
    http_client: reqwest::Client,
    cache: Arc<GeoCache>,
    store: Arc<EventStore>,
}

impl FeedPoller {
    pub fn new(
        config: FeedConfig,
        cache: Arc<GeoCache>,
        store: Arc<EventStore>,
    ) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            http_client,
            cache,
            store,
        })
    }

    /// Poll until `shutdown` becomes `true` or its sender is dropped.
    ///
    /// The first cycle starts immediately. Shutdown is only observed while
    /// sleeping between cycles.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Feed poller started: {} every {}s",
            self.config.url, self.config.interval_seconds
        );
        let interval = Duration::from_secs(self.config.interval_seconds);

        loop {
            match self.run_cycle().await {
                Ok(report) => info!(
                    fetched = report.fetched,
                    admitted = report.admitted,
                    duplicates = report.duplicates,
                    lookup_failures = report.lookup_failures,
                    skipped = report.skipped,
                    retained = self.store.len(),
                    cached_hosts = self.cache.len(),
                    "Poll cycle complete"
                ),
                Err(e) => error!(kind = e.kind(), "Poll cycle failed: {}", e),
            }

            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Feed poller stopped");
    }

    /// One fetch → enrich → admit pass.
    pub async fn run_cycle(&self) -> Result<CycleReport, PipelineError> {
        let feed = self.fetch_feed().await?;
        debug!(
            "Feed returned {} entries (query_status {:?})",
            feed.urls.len(),
            feed.query_status
        );

        let mut report = CycleReport::default();

        for entry in feed.urls.iter().take(self.config.max_entries) {
            report.fetched += 1;

            let Some(host) = entry.host.as_deref().filter(|h| !h.is_empty()) else {
                warn!("Feed entry without host, skipping");
                report.skipped += 1;
                continue;
            };

            let geo = match self.cache.lookup(host).await {
                Ok(geo) => geo,
                Err(e) => {
                    warn!(kind = e.kind(), "{}", e);
                    report.lookup_failures += 1;
                    continue;
                }
            };

            let event = Event {
                latitude: geo.lat,
                longitude: geo.lon,
                attack_vectors: entry.tag_list(),
                severity: Severity::random(),
                source: self.config.source.clone(),
                observed_at: Utc::now().timestamp(),
                host: Some(host.to_string()),
                country: geo.country.clone(),
            };

            if self.store.admit(event) {
                report.admitted += 1;
            } else {
                report.duplicates += 1;
            }
        }

        Ok(report)
    }

    async fn fetch_feed(&self) -> Result<FeedResponse, PipelineError> {
        let mut request = self
            .http_client
            .get(&self.config.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");

        if let Some(ref key) = self.config.api_key {
            request = request.header("Auth-Key", key);
        }

        let response = request.send().await.map_err(|e| {
            PipelineError::FetchFailed(describe_transport_error(&e, self.config.timeout_seconds))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::FetchFailed(format!(
                "feed API error {}: {}",
                status,
                truncate_body(&body)
            )));
        }

        response
            .json::<FeedResponse>()
            .await
            .map_err(|e| PipelineError::FetchFailed(format!("unparseable feed body: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::geo_cache::GeoConfig;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn poller_for(server: &MockServer, max_entries: usize) -> (FeedPoller, Arc<GeoCache>, Arc<EventStore>) {
        let cache = Arc::new(
            GeoCache::new(GeoConfig {
                base_url: format!("{}/json", server.uri()),
                timeout_seconds: 2,
                capacity: 100,
            })
            .unwrap(),
        );
        let store = Arc::new(EventStore::new(500));
        let poller = FeedPoller::new(
            FeedConfig {
                url: format!("{}/v1/urls/recent/", server.uri()),
                api_key: Some("test-key".to_string()),
                source: "urlhaus".to_string(),
                interval_seconds: 1,
                timeout_seconds: 2,
                max_entries,
            },
            cache.clone(),
            store.clone(),
        )
        .unwrap();
        (poller, cache, store)
    }

    async fn mount_geo(server: &MockServer, host: &str, body: serde_json::Value, calls: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/json/{}", host)))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(calls)
            .mount(server)
            .await;
    }

    async fn mount_feed(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/v1/urls/recent/"))
            .and(header("Auth-Key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_cycle_admits_enriched_events() {
        let server = MockServer::start().await;
        mount_feed(
            &server,
            json!({"query_status": "ok", "urls": [
                {"host": "1.1.1.1", "tags": ["mirai"]},
                {"host": "2.2.2.2", "tags": []}
            ]}),
        )
        .await;
        mount_geo(&server, "1.1.1.1", json!({"lat": 10.0, "lon": 20.0, "country": "A"}), 1).await;
        mount_geo(&server, "2.2.2.2", json!({"lat": 30.0, "lon": 40.0}), 1).await;

        let (poller, _cache, store) = poller_for(&server, 50);
        let report = poller.run_cycle().await.unwrap();

        assert_eq!(report.admitted, 2);
        let events = store.snapshot();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].attack_vectors, vec!["mirai"]);
        assert_eq!(events[0].latitude, Some(10.0));
        assert_eq!(events[0].country.as_deref(), Some("A"));
        assert_eq!(events[0].source, "urlhaus");
        assert!(events[1].attack_vectors.is_empty());
        assert_eq!(events[1].host.as_deref(), Some("2.2.2.2"));
    }

    #[tokio::test]
    async fn test_repeated_host_served_from_cache() {
        let server = MockServer::start().await;
        mount_feed(
            &server,
            json!({"urls": [
                {"host": "1.1.1.1", "tags": ["mirai"]},
                {"host": "1.1.1.1", "tags": ["elf"]}
            ]}),
        )
        .await;
        mount_geo(&server, "1.1.1.1", json!({"lat": 10.0, "lon": 20.0}), 1).await;

        let (poller, cache, store) = poller_for(&server, 50);
        let report = poller.run_cycle().await.unwrap();

        // Same coordinates, so the second event is a duplicate.
        assert_eq!(report.admitted, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_500_leaves_store_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/urls/recent/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (poller, _cache, store) = poller_for(&server, 50);
        let err = poller.run_cycle().await.unwrap_err();

        assert!(matches!(err, PipelineError::FetchFailed(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_non_json_feed_is_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/urls/recent/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let (poller, _cache, _store) = poller_for(&server, 50);
        assert!(matches!(
            poller.run_cycle().await,
            Err(PipelineError::FetchFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_lookup_failure_skips_only_that_entry() {
        let server = MockServer::start().await;
        mount_feed(
            &server,
            json!({"urls": [
                {"host": "6.6.6.6", "tags": ["a"]},
                {"tags": ["no-host"]},
                {"host": "7.7.7.7", "tags": null}
            ]}),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/json/6.6.6.6"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_geo(&server, "7.7.7.7", json!({"lat": 1.0, "lon": 1.0}), 1).await;

        let (poller, _cache, store) = poller_for(&server, 50);
        let report = poller.run_cycle().await.unwrap();

        assert_eq!(
            report,
            CycleReport {
                fetched: 3,
                admitted: 1,
                duplicates: 0,
                lookup_failures: 1,
                skipped: 1,
            }
        );
        assert_eq!(store.snapshot()[0].host.as_deref(), Some("7.7.7.7"));
    }

    #[tokio::test]
    async fn test_only_head_of_feed_is_taken() {
        let server = MockServer::start().await;
        let urls: Vec<_> = (0..5)
            .map(|i| json!({"host": format!("10.0.0.{}", i), "tags": [format!("t{}", i)]}))
            .collect();
        mount_feed(&server, json!({ "urls": urls })).await;
        for i in 0..5 {
            let calls = if i < 3 { 1 } else { 0 };
            mount_geo(&server, &format!("10.0.0.{}", i), json!({"lat": i as f64, "lon": 0.0}), calls).await;
        }

        let (poller, _cache, store) = poller_for(&server, 3);
        poller.run_cycle().await.unwrap();

        let tags: Vec<_> = store
            .snapshot()
            .into_iter()
            .flat_map(|e| e.attack_vectors)
            .collect();
        assert_eq!(tags, vec!["t0", "t1", "t2"]);
    }

    #[tokio::test]
    async fn test_error_body_is_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/urls/recent/"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<p>down</p>".repeat(1_000)))
            .mount(&server)
            .await;

        let (poller, _cache, _store) = poller_for(&server, 50);
        let err = poller.run_cycle().await.unwrap_err().to_string();

        assert!(err.contains("502"));
        assert!(err.len() < 400, "error message too long: {} bytes", err.len());
    }

    #[tokio::test]
    async fn test_feed_not_requested_again_before_interval() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/urls/recent/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        // Interval is 1s; only the immediate first cycle fits in 500ms.
        let (poller, _cache, _store) = poller_for(&server, 50);
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(poller.run(rx));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(server.received_requests().await.unwrap().len(), 1);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("poller did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_survives_failures_and_stops_on_shutdown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/urls/recent/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (poller, _cache, store) = poller_for(&server, 50);
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(poller.run(rx));

        // Long enough for the first failed cycle and one retry.
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(!handle.is_finished());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("poller did not stop")
            .unwrap();
        assert!(store.is_empty());
        assert!(server.received_requests().await.unwrap().len() >= 2);
    }
}
