//! Bounded store of replayable command envelopes

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use gitsplits_core::{ReplayableCommand, DEFAULT_REPLAY_CAPACITY, DEFAULT_REPLAY_TTL_HOURS};

/// Result of looking up a replay id
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayLookup {
    Found(ReplayableCommand),
    NotFound,
    Expired,
}

#[derive(Debug, Default)]
struct ReplayEntries {
    by_id: HashMap<String, ReplayableCommand>,
    order: VecDeque<String>,
}

/// Fixed-capacity map with FIFO eviction and a usage window
///
/// Re-registering an existing id replaces the envelope but keeps its
/// original position in the eviction order.
#[derive(Debug)]
pub struct ReplayStore {
    capacity: usize,
    ttl: Duration,
    entries: Mutex<ReplayEntries>,
}

impl Default for ReplayStore {
    fn default() -> Self {
        Self::new(DEFAULT_REPLAY_CAPACITY, Duration::hours(DEFAULT_REPLAY_TTL_HOURS))
    }
}

impl ReplayStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            entries: Mutex::new(ReplayEntries::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.by_id.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert an envelope, evicting the oldest entries past capacity
    pub fn register(&self, command: ReplayableCommand) {
        let Ok(mut entries) = self.entries.lock() else {
            tracing::warn!(
                event_id = %command.event_id,
                "Replay store lock poisoned; command not registered"
            );
            return;
        };
        let id = command.event_id.clone();
        if entries.by_id.insert(id.clone(), command).is_none() {
            entries.order.push_back(id);
        }
        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.by_id.remove(&oldest);
                tracing::debug!(event_id = %oldest, "Evicted replay entry");
            }
        }
    }

    /// Raw lookup, ignoring age
    pub fn get(&self, event_id: &str) -> Option<ReplayableCommand> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.by_id.get(event_id).cloned())
    }

    /// Lookup for replay at `now`; entries older than the window are rejected
    pub fn lookup(&self, event_id: &str, now: DateTime<Utc>) -> ReplayLookup {
        match self.get(event_id) {
            None => ReplayLookup::NotFound,
            Some(command) if now - command.created_at > self.ttl => ReplayLookup::Expired,
            Some(command) => ReplayLookup::Found(command),
        }
    }
}
