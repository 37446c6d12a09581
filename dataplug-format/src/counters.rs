//! Progress counters
//!
//! Counters are written inline by pipeline stages and read periodically by the
//! progress reporter. Increments are relaxed atomic adds; nothing locks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle to a single named counter
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicU64>);

impl Counter {
    /// Create a detached counter starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Add `n`
    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    /// Current value
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Ordered set of named counters owned by the invoking command
#[derive(Debug, Clone, Default)]
pub struct Counters {
    entries: Vec<(String, Counter)>,
}

impl Counters {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set with the given counter names, all at zero
    pub fn with_names<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counters = Self::new();
        for name in names {
            counters.register(name);
        }
        counters
    }

    /// Return the counter called `name`, creating it at zero if needed
    pub fn register(&mut self, name: &str) -> Counter {
        if let Some(counter) = self.get(name) {
            return counter;
        }
        let counter = Counter::new();
        self.entries.push((name.to_string(), counter.clone()));
        counter
    }

    /// Look up an existing counter
    pub fn get(&self, name: &str) -> Option<Counter> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, counter)| counter.clone())
    }

    /// Current value of `name`, zero when unknown
    pub fn value(&self, name: &str) -> u64 {
        self.get(name).map(|counter| counter.get()).unwrap_or(0)
    }

    /// Iterate counters in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Counter)> {
        self.entries
            .iter()
            .map(|(name, counter)| (name.as_str(), counter))
    }

    /// Number of registered counters
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no counter is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Point-in-time copy of every counter, as a JSON object in registration order
    pub fn snapshot(&self) -> serde_json::Map<String, serde_json::Value> {
        self.entries
            .iter()
            .map(|(name, counter)| (name.clone(), serde_json::Value::from(counter.get())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent() {
        let mut counters = Counters::new();
        let first = counters.register("valid");
        let second = counters.register("valid");
        first.inc();
        second.inc();
        assert_eq!(counters.len(), 1);
        assert_eq!(counters.value("valid"), 2);
    }

    #[test]
    fn snapshot_keeps_registration_order() {
        let counters = Counters::with_names(["filtered", "valid", "invalid"]);
        counters.get("invalid").unwrap().add(3);
        let snapshot = counters.snapshot();
        let keys: Vec<_> = snapshot.keys().cloned().collect();
        assert_eq!(keys, vec!["filtered", "valid", "invalid"]);
        assert_eq!(snapshot["invalid"], 3);
        assert_eq!(snapshot["filtered"], 0);
    }

    #[test]
    fn unknown_counter_reads_zero() {
        let counters = Counters::new();
        assert_eq!(counters.value("missing"), 0);
        assert!(counters.get("missing").is_none());
    }
}
