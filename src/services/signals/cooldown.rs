//! Per (instrument, side) emission cooldown.

use crate::types::Side;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

/// Gate state for one key at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CooldownState {
    Armed,
    Suppressed { remaining_ms: i64 },
}

/// Remembers the last accepted emission per (instrument, side).
///
/// Entries live for the life of the process.
pub struct CooldownGate {
    cooldown_ms: i64,
    /// Key: (uppercased instrument, side) -> last accepted emission (ms).
    last_emission: DashMap<(String, Side), i64>,
}

impl CooldownGate {
    pub fn new(cooldown_ms: i64) -> Arc<Self> {
        Arc::new(Self {
            cooldown_ms: cooldown_ms.max(0),
            last_emission: DashMap::new(),
        })
    }

    pub fn cooldown_ms(&self) -> i64 {
        self.cooldown_ms
    }

    fn key(instrument: &str, side: Side) -> (String, Side) {
        (instrument.to_uppercase(), side)
    }

    /// Accept an emission at `now_ms` if the key is armed, recording it.
    ///
    /// Check and record happen under the same shard lock, so concurrent
    /// callers for one key cannot both succeed. Rejections leave the state
    /// untouched.
    pub fn try_acquire(&self, instrument: &str, side: Side, now_ms: i64) -> bool {
        match self.last_emission.entry(Self::key(instrument, side)) {
            Entry::Occupied(mut entry) => {
                if now_ms - *entry.get() >= self.cooldown_ms {
                    entry.insert(now_ms);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now_ms);
                true
            }
        }
    }

    pub fn state(&self, instrument: &str, side: Side, now_ms: i64) -> CooldownState {
        match self.last_emission.get(&Self::key(instrument, side)) {
            Some(last) => {
                let elapsed = now_ms - *last;
                if elapsed >= self.cooldown_ms {
                    CooldownState::Armed
                } else {
                    CooldownState::Suppressed {
                        remaining_ms: self.cooldown_ms - elapsed,
                    }
                }
            }
            None => CooldownState::Armed,
        }
    }

    pub fn last_emission(&self, instrument: &str, side: Side) -> Option<i64> {
        self.last_emission
            .get(&Self::key(instrument, side))
            .map(|v| *v)
    }

    /// Number of keys that have ever emitted.
    pub fn len(&self) -> usize {
        self.last_emission.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_emission.is_empty()
    }
}
