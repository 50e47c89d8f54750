//! Generic time-bounded memoization.
//!
//! Used by the widget collaborators and the LLM keyword cache; the article
//! pipeline itself is stateless across queries. Entries are evicted lazily
//! on read; there is no background sweeper, and the lock is held only for
//! the map operation itself.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A mutex-guarded TTL cache keyed by opaque strings.
#[derive(Debug)]
pub struct TtlCache<T> {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, T)>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch a live entry, evicting it if it has expired.
    pub fn get(&self, key: &str) -> Option<T> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((stamp, value)) if stamp.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: &str, value: T) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.to_string(), (Instant::now(), value));
    }
}
