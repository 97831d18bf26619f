//! Window counter storage.
//!
//! The [`CounterStore`] trait is the seam between the quota engine and wherever
//! counters live. Its single mutating operation, [`CounterStore::transact`],
//! applies a caller-supplied transition to one counter atomically. The
//! in-memory store serialises transitions with a per-key mutex; a networked
//! store can implement the same contract with a compare-and-swap loop,
//! re-running the transition against each fresh snapshot.

use crate::{LimitDimension, Principal};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use marketmate_error::MarketmateResult;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Usage accumulated by one principal on one dimension in the open window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowCounter {
    /// Cumulative charge in the open window
    pub count: u64,
    /// When the open window started
    pub window_start: DateTime<Utc>,
}

impl WindowCounter {
    /// A counter with nothing charged, opening its window at `now`.
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    /// Lazily roll the window.
    ///
    /// If more than `window` has elapsed since the window opened, the count is
    /// cleared and a new window opens at `now`. A counter idle for many
    /// windows collapses into a single reset. Returns true if a reset happened.
    pub fn roll(&mut self, now: DateTime<Utc>, window: TimeDelta) -> bool {
        if now - self.window_start > window {
            self.count = 0;
            self.window_start = now;
            true
        } else {
            false
        }
    }

    /// Instant after which the next touch will reset this counter.
    pub fn resets_at(&self, window: TimeDelta) -> DateTime<Utc> {
        self.window_start + window
    }
}

/// Identifies one counter: a principal on a dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CounterKey {
    /// Who the counter belongs to
    pub principal: Principal,
    /// What the counter meters
    pub dimension: LimitDimension,
}

impl CounterKey {
    /// Create a key for `principal` on `dimension`.
    pub fn new(principal: Principal, dimension: LimitDimension) -> Self {
        Self {
            principal,
            dimension,
        }
    }
}

/// Result of applying a transition to a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    /// Value returned by the transition
    pub admitted: bool,
    /// Counter state after the transition
    pub counter: WindowCounter,
}

/// Storage for window counters.
///
/// Operations on different keys must not contend; operations on the same key
/// must be linearisable.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically apply `transition` to the counter for `key`.
    ///
    /// A counter that does not exist yet is created as
    /// [`WindowCounter::fresh(now)`](WindowCounter::fresh) before the
    /// transition runs. No other transition on the same key may interleave
    /// between the transition reading the counter and its result being
    /// stored. The transition may be invoked more than once by stores that
    /// retry on conflict, so it must be a pure function of the counter it is
    /// given.
    async fn transact(
        &self,
        key: &CounterKey,
        now: DateTime<Utc>,
        transition: &mut (dyn for<'c> FnMut(&'c mut WindowCounter) -> bool + Send),
    ) -> MarketmateResult<Applied>;

    /// Current counter for `key` without modifying it, if one exists.
    async fn get(&self, key: &CounterKey) -> MarketmateResult<Option<WindowCounter>>;
}

/// Process-local counter store.
///
/// Counters live for the lifetime of the store. Each counter sits behind its
/// own mutex; the map only hands out the mutex, so two keys never wait on each
/// other for longer than a map lookup.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    counters: DashMap<CounterKey, Arc<Mutex<WindowCounter>>>,
}

impl InMemoryCounterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of counters created so far.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Returns true if no counter has been created.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    fn slot(&self, key: &CounterKey, now: DateTime<Utc>) -> Arc<Mutex<WindowCounter>> {
        if let Some(slot) = self.counters.get(key) {
            return Arc::clone(slot.value());
        }
        let slot = self
            .counters
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(WindowCounter::fresh(now))));
        Arc::clone(slot.value())
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn transact(
        &self,
        key: &CounterKey,
        now: DateTime<Utc>,
        transition: &mut (dyn for<'c> FnMut(&'c mut WindowCounter) -> bool + Send),
    ) -> MarketmateResult<Applied> {
        let slot = self.slot(key, now);
        let mut counter = slot.lock();
        let admitted = transition(&mut *counter);
        Ok(Applied {
            admitted,
            counter: *counter,
        })
    }

    async fn get(&self, key: &CounterKey) -> MarketmateResult<Option<WindowCounter>> {
        Ok(self.counters.get(key).map(|slot| *slot.value().lock()))
    }
}
