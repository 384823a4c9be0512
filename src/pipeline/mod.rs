//! Ingestion pipeline: geolocation cache, feed poller and event store.

pub mod geo_cache;
pub mod poller;
pub mod store;

pub use geo_cache::{GeoCache, GeoConfig};
pub use poller::{FeedConfig, FeedPoller};
pub use store::EventStore;
