//! Counter storage for fixed-window rate limiting.
//!
//! The limiter only talks to [`CounterStore`]. A single instance uses
//! [`InMemoryCounterStore`]; several instances behind a load balancer need a
//! shared store with atomic increments implementing the same trait.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::store::StoreResult;

/// Counter value after an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Requests counted in the current window, including this one.
    pub count: u64,
    /// Time until the window resets.
    pub resets_in: Duration,
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Count one request under `key`. Starts a fresh window when none is open
    /// or the previous one has elapsed.
    async fn increment(&self, key: &str, window: Duration) -> StoreResult<WindowCount>;

    /// Give back one request in the current window, if any.
    async fn decrement(&self, key: &str) -> StoreResult<()>;

    /// Drop elapsed windows. Returns the number removed.
    async fn prune(&self) -> StoreResult<usize>;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    length: Duration,
    count: u64,
}

impl Window {
    fn elapsed_at(&self, now: Instant) -> bool {
        now >= self.started + self.length
    }
}

/// Process-local counters. Each key is updated under its DashMap shard lock,
/// so concurrent increments never undercount.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    windows: DashMap<String, Window>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked windows.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> StoreResult<WindowCount> {
        let now = Instant::now();
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            length: window,
            count: 0,
        });
        if entry.elapsed_at(now) {
            *entry = Window {
                started: now,
                length: window,
                count: 0,
            };
        }
        entry.count += 1;
        Ok(WindowCount {
            count: entry.count,
            resets_in: (entry.started + entry.length).saturating_duration_since(now),
        })
    }

    async fn decrement(&self, key: &str) -> StoreResult<()> {
        let now = Instant::now();
        if let Some(mut entry) = self.windows.get_mut(key)
            && !entry.elapsed_at(now)
        {
            entry.count = entry.count.saturating_sub(1);
        }
        Ok(())
    }

    async fn prune(&self) -> StoreResult<usize> {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows.retain(|_, window| !window.elapsed_at(now));
        Ok(before.saturating_sub(self.windows.len()))
    }
}
