//! Per-identity sliding-window timestamp storage shared by the limiters and
//! the error-rate circuit.

use dashmap::DashMap;
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

/// Identity → timestamps inside the trailing window.
///
/// Stale timestamps are dropped lazily whenever an identity is touched, and
/// identities that went quiet are removed by [`WindowStore::sweep`]. Cloning
/// the store shares the underlying map.
///
/// A bounded store that is full evicts the stalest tenth of its identities in
/// one pass, so a stream of new identities pays for a scan once per batch
/// rather than once per request.
#[derive(Debug, Clone)]
pub struct WindowStore {
    entries: Arc<DashMap<String, VecDeque<Instant>>>,
    max_identities: usize,
    evicting: Arc<AtomicBool>,
    eviction_passes: Arc<AtomicUsize>,
}

impl Default for WindowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowStore {
    /// Creates a store without an identity bound.
    pub fn new() -> Self {
        Self::bounded(usize::MAX)
    }

    /// Creates a store holding at most `max_identities` identities.
    pub fn bounded(max_identities: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            max_identities: max_identities.max(1),
            evicting: Arc::new(AtomicBool::new(false)),
            eviction_passes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Records `now` for `identity` only if fewer than `max` timestamps fall
    /// inside the window. Returns whether the request was admitted.
    pub fn try_acquire(&self, identity: &str, window: Duration, max: u32, now: Instant) -> bool {
        self.make_room(identity);
        let mut timestamps = self.entries.entry(identity.to_owned()).or_default();
        prune(&mut timestamps, window, now);
        if timestamps.len() < max as usize {
            timestamps.push_back(now);
            true
        } else {
            false
        }
    }

    /// Unconditionally records `now` for `identity`.
    pub fn record(&self, identity: &str, window: Duration, now: Instant) {
        self.make_room(identity);
        let mut timestamps = self.entries.entry(identity.to_owned()).or_default();
        prune(&mut timestamps, window, now);
        timestamps.push_back(now);
    }

    /// Number of timestamps for `identity` inside the window ending at `now`.
    pub fn count(&self, identity: &str, window: Duration, now: Instant) -> usize {
        match self.entries.get_mut(identity) {
            Some(mut timestamps) => {
                prune(&mut timestamps, window, now);
                timestamps.len()
            }
            None => 0,
        }
    }

    /// Prunes every identity and drops the ones left without timestamps.
    /// Returns how many identities were removed.
    pub fn sweep(&self, window: Duration, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, timestamps| {
            prune(timestamps, window, now);
            !timestamps.is_empty()
        });
        before.saturating_sub(self.entries.len())
    }

    /// Number of tracked identities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the timestamps held for `identity`, oldest first.
    pub fn timestamps(&self, identity: &str) -> Vec<Instant> {
        self.entries
            .get(identity)
            .map(|timestamps| timestamps.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    #[cfg(test)]
    fn eviction_passes(&self) -> usize {
        self.eviction_passes.load(Ordering::Relaxed)
    }

    fn eviction_batch(&self) -> usize {
        (self.max_identities / 10).max(1)
    }

    /// Evicts the identities with the oldest most-recent activity when a new
    /// identity would exceed the bound. Empty identities go first. Only one
    /// caller evicts at a time; concurrent inserts may briefly overshoot the
    /// bound. Must not be called while holding an entry guard.
    fn make_room(&self, identity: &str) {
        if self.entries.len() < self.max_identities || self.entries.contains_key(identity) {
            return;
        }
        if self
            .evicting
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        let mut by_activity: Vec<(Option<Instant>, String)> = self
            .entries
            .iter()
            .map(|entry| (entry.value().back().copied(), entry.key().clone()))
            .collect();
        let batch = self.eviction_batch().min(by_activity.len());
        if batch > 0 {
            by_activity.select_nth_unstable(batch - 1);
            for (_, stale) in by_activity.drain(..batch) {
                self.entries.remove(&stale);
            }
        }

        let passes = self.eviction_passes.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(evicted = batch, passes, "Evicted stalest tracked clients");
        self.evicting.store(false, Ordering::Release);
    }
}

fn prune(timestamps: &mut VecDeque<Instant>, window: Duration, now: Instant) {
    while let Some(oldest) = timestamps.front() {
        if now.saturating_duration_since(*oldest) < window {
            break;
        }
        timestamps.pop_front();
    }
}
