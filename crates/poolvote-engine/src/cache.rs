//! Generation-scoped stat memoization.
//!
//! Each entry is computed at most once per generation and never replaced
//! until [`StatsCache::reload`] clears the whole snapshot. Computation runs
//! outside the lock so that a stat may resolve its own dependencies through
//! the same cache. When two callers race on an uncached name, both compute
//! but the first stored value wins and is what both return. A result whose
//! computation straddled a reload is handed back to its caller but not
//! stored, so a snapshot never mixes generations.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::value::StatValue;

#[derive(Debug, Default)]
struct Snapshot {
    generation: u64,
    entries: BTreeMap<String, StatValue>,
}

#[derive(Debug, Default)]
pub struct StatsCache {
    inner: Mutex<Snapshot>,
}

impl StatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached value for `name`, computing and storing it on a miss.
    ///
    /// Errors from `compute` are returned and nothing is cached.
    pub fn get<E>(
        &self,
        name: &str,
        compute: impl FnOnce() -> Result<StatValue, E>,
    ) -> Result<StatValue, E> {
        let generation = {
            let snapshot = self.lock();
            if let Some(value) = snapshot.entries.get(name) {
                return Ok(value.clone());
            }
            snapshot.generation
        };

        let value = compute()?;

        let mut snapshot = self.lock();
        if snapshot.generation != generation {
            debug!(
                stat = name,
                computed_in = generation,
                current = snapshot.generation,
                "reload during computation, result not cached"
            );
            return Ok(value);
        }

        Ok(snapshot
            .entries
            .entry(name.to_string())
            .or_insert(value)
            .clone())
    }

    /// The cached value for `name`, without computing.
    pub fn peek(&self, name: &str) -> Option<StatValue> {
        self.lock().entries.get(name).cloned()
    }

    /// Drop every entry and start a new generation. Returns the new generation.
    pub fn reload(&self) -> u64 {
        let mut snapshot = self.lock();
        snapshot.entries.clear();
        snapshot.generation += 1;
        debug!(generation = snapshot.generation, "stats cache reloaded");
        snapshot.generation
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// A consistent copy of the current generation's entries.
    pub fn entries(&self) -> (u64, BTreeMap<String, StatValue>) {
        let snapshot = self.lock();
        (snapshot.generation, snapshot.entries.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}
