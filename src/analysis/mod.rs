//! Read-only aggregation over event store snapshots.

pub mod aggregator;

pub use aggregator::*;
