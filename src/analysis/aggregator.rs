//! Frequency summaries over event snapshots.
//!
//! Rankings are stable: vectors with equal counts keep the order in which
//! they were first seen.

use crate::models::Event;
use serde::Serialize;
use std::collections::HashMap;

/// Number of entries in a summary ranking.
pub const TOP_LIMIT: usize = 5;

/// Default size of the recent window.
pub const RECENT_WINDOW: usize = 30;

/// Country label used when an event carries none.
pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// Whole-store summary, as served on `/summary`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    #[serde(rename = "total_events")]
    pub total_count: usize,
    #[serde(rename = "top_attack_formats")]
    pub top_vectors: Vec<(String, usize)>,
}

/// Counts over the most recent events only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentSnapshot {
    /// Events inside the window.
    pub window_size: usize,
    /// Events in the whole store.
    pub total_active: usize,
    #[serde(rename = "top_attack_formats")]
    pub top_vectors: Vec<(String, usize)>,
    pub top_countries: Vec<(String, usize)>,
}

/// Count every attack vector across `events`.
pub fn summarize(events: &[Event]) -> Summary {
    Summary {
        total_count: events.len(),
        top_vectors: rank(events.iter().flat_map(|e| e.attack_vectors.iter().cloned()), TOP_LIMIT),
    }
}

/// Count vectors and countries over the last `n` admitted events.
pub fn recent_window(events: &[Event], n: usize) -> RecentSnapshot {
    let window = &events[events.len().saturating_sub(n)..];

    RecentSnapshot {
        window_size: window.len(),
        total_active: events.len(),
        top_vectors: rank(window.iter().flat_map(|e| e.attack_vectors.iter().cloned()), TOP_LIMIT),
        top_countries: rank(
            window.iter().map(|e| {
                e.country
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_COUNTRY.to_string())
            }),
            TOP_LIMIT,
        ),
    }
}

/// Rank items by descending count, ties in first-seen order.
pub fn rank(items: impl IntoIterator<Item = String>, limit: usize) -> Vec<(String, usize)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();

    for item in items {
        match index.get(&item) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(item.clone(), counts.len());
                counts.push((item, 1));
            }
        }
    }

    // Stable sort: ties stay in first-seen order.
    counts.sort_by_key(|(_, count)| std::cmp::Reverse(*count));
    counts.truncate(limit);
    counts
}
