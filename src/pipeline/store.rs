//! Bounded, insertion-ordered, deduplicating event buffer.
//!
//! The store is the single source of truth for every query path. One writer
//! (the feed poller) admits events; any number of readers take snapshots.

use crate::models::{Coordinates, Event};
use parking_lot::RwLock;
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Default number of retained events.
pub const DEFAULT_CAPACITY: usize = 500;

/// Fixed-capacity FIFO of recent events, deduplicated by coordinate pair.
pub struct EventStore {
    capacity: usize,
    inner: RwLock<Inner>,
}

struct Inner {
    events: VecDeque<Event>,
    /// Coordinate pairs of the retained events.
    occupied: HashSet<Coordinates>,
}

impl EventStore {
    /// Create an empty store. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: RwLock::new(Inner {
                events: VecDeque::with_capacity(capacity),
                occupied: HashSet::new(),
            }),
        }
    }

    /// Try to insert an event.
    ///
    /// Returns `false` if a retained event already has the same
    /// (latitude, longitude) pair; otherwise stores the event, evicting the
    /// oldest one when full, and returns `true`.
    pub fn admit(&self, event: Event) -> bool {
        let key = event.coordinates();
        let mut inner = self.inner.write();

        if inner.occupied.contains(&key) {
            debug!("Duplicate coordinates {:?}, dropping event", key);
            return false;
        }

        if inner.events.len() >= self.capacity {
            if let Some(evicted) = inner.events.pop_front() {
                inner.occupied.remove(&evicted.coordinates());
            }
        }

        inner.occupied.insert(key);
        inner.events.push_back(event);
        true
    }

    /// Point-in-time copy of all retained events, oldest first.
    pub fn snapshot(&self) -> Vec<Event> {
        self.inner.read().events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().events.len()
    }

    #[allow(dead_code)] // Pairs with len()
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
