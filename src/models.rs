//! Data models for the threat pipeline.
//!
//! This module contains the event records served to the dashboard, the
//! geolocation records cached per host and the upstream feed payload shapes.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Severity level of a threat event.
///
/// Currently assigned at random by the poller as a stand-in signal; it is
/// not derived from any risk analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Low, Severity::Medium, Severity::High];

    /// Uniform pick from all severities.
    pub fn random() -> Self {
        use rand::Rng;
        Self::ALL[rand::rng().random_range(0..Self::ALL.len())]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

/// A single enriched threat observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Latitude of the host, absent when geolocation had none.
    #[serde(rename = "lat")]
    pub latitude: Option<f64>,
    /// Longitude of the host, absent when geolocation had none.
    #[serde(rename = "lon")]
    pub longitude: Option<f64>,
    /// Feed tags, in upstream order. May be empty.
    #[serde(rename = "attack_format", default, deserialize_with = "vectors_from_any")]
    pub attack_vectors: Vec<String>,
    pub severity: Severity,
    /// Identifier of the upstream feed.
    pub source: String,
    /// Epoch seconds at enrichment time.
    #[serde(rename = "timestamp")]
    pub observed_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Event {
    /// The dedup key: the exact (latitude, longitude) pair, absent included.
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            lat: self.latitude.map(f64::to_bits),
            lon: self.longitude.map(f64::to_bits),
        }
    }
}

/// Hashable form of an event's coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coordinates {
    lat: Option<u64>,
    lon: Option<u64>,
}

/// Accepts a list, a legacy scalar string, or null.
fn vectors_from_any<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<String>),
        One(String),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::Many(v)) => v,
        Some(OneOrMany::One(s)) => vec![s],
        None => Vec::new(),
    })
}

/// Geolocation record returned by the collaborator for one host.
///
/// Only the fields the pipeline reads are typed; everything else is kept
/// verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub country: Option<String>,
    /// "success" or "fail" on ip-api style collaborators.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response body of the recent-URLs feed.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedResponse {
    #[serde(default)]
    pub query_status: Option<String>,
    #[serde(default)]
    pub urls: Vec<FeedEntry>,
}

/// One reported malicious URL.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedEntry {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl FeedEntry {
    pub fn tag_list(&self) -> Vec<String> {
        self.tags.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_event(lat: Option<f64>, lon: Option<f64>) -> Event {
        Event {
            latitude: lat,
            longitude: lon,
            attack_vectors: vec!["mirai".to_string()],
            severity: Severity::High,
            source: "urlhaus".to_string(),
            observed_at: 1_700_000_000,
            host: None,
            country: None,
        }
    }

    #[test]
    fn test_event_wire_names() {
        let json = serde_json::to_value(make_event(Some(1.5), Some(-2.0))).unwrap();
        assert_eq!(json["lat"], 1.5);
        assert_eq!(json["lon"], -2.0);
        assert_eq!(json["attack_format"][0], "mirai");
        assert_eq!(json["severity"], "high");
        assert_eq!(json["timestamp"], 1_700_000_000);
        assert!(json.get("country").is_none());
    }

    #[test]
    fn test_legacy_scalar_attack_format() {
        let json = r#"{"lat":null,"lon":null,"attack_format":"elf","severity":"low","source":"urlhaus","timestamp":1}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.attack_vectors, vec!["elf"]);

        let json = r#"{"lat":null,"lon":null,"attack_format":null,"severity":"low","source":"urlhaus","timestamp":1}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert!(event.attack_vectors.is_empty());
    }

    #[test]
    fn test_coordinates_key() {
        assert_eq!(
            make_event(Some(1.0), Some(2.0)).coordinates(),
            make_event(Some(1.0), Some(2.0)).coordinates()
        );
        assert_ne!(
            make_event(Some(1.0), Some(2.0)).coordinates(),
            make_event(Some(2.0), Some(1.0)).coordinates()
        );
        assert_eq!(
            make_event(None, None).coordinates(),
            make_event(None, None).coordinates()
        );
    }

    #[test]
    fn test_geolocation_keeps_unknown_fields() {
        let json = r#"{"status":"success","lat":52.1,"lon":4.3,"country":"Netherlands","isp":"Example BV"}"#;
        let geo: GeoLocation = serde_json::from_str(json).unwrap();
        assert_eq!(geo.lat, Some(52.1));
        assert_eq!(geo.country.as_deref(), Some("Netherlands"));
        assert_eq!(geo.extra.get("isp"), Some(&Value::from("Example BV")));
    }

    #[test]
    fn test_feed_entry_null_tags() {
        let json = r#"{"query_status":"ok","urls":[{"host":"1.1.1.1","tags":null},{"host":"2.2.2.2","tags":["mirai"]}]}"#;
        let feed: FeedResponse = serde_json::from_str(json).unwrap();
        assert_eq!(feed.urls.len(), 2);
        assert!(feed.urls[0].tag_list().is_empty());
        assert_eq!(feed.urls[1].tag_list(), vec!["mirai"]);
    }

    #[test]
    fn test_random_severity_in_range() {
        for _ in 0..50 {
            assert!(Severity::ALL.contains(&Severity::random()));
        }
    }
}
