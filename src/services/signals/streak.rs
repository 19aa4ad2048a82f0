//! Per-instrument win/loss history.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Reported outcomes for one instrument.
///
/// `streak` is signed: positive counts consecutive wins, negative counts
/// consecutive losses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeStats {
    pub streak: i32,
    pub wins: u32,
    pub losses: u32,
}

impl OutcomeStats {
    pub fn total(&self) -> u32 {
        self.wins + self.losses
    }

    pub fn win_rate(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self.wins as f64 / total as f64),
        }
    }
}

pub struct StreakStore {
    stats: DashMap<String, OutcomeStats>,
}

impl StreakStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            stats: DashMap::new(),
        })
    }

    /// Record a closed trade outcome and return the new streak.
    pub fn register_outcome(&self, instrument: &str, won: bool) -> i32 {
        let key = instrument.to_uppercase();
        let mut entry = self.stats.entry(key.clone()).or_default();
        let previous = entry.streak;
        if won {
            entry.streak = previous.max(0) + 1;
            entry.wins += 1;
        } else {
            entry.streak = previous.min(0) - 1;
            entry.losses += 1;
        }
        debug!(
            "Outcome for {}: streak {} -> {} ({}W/{}L)",
            key, previous, entry.streak, entry.wins, entry.losses
        );
        entry.streak
    }

    pub fn get(&self, instrument: &str) -> i32 {
        self.stats(instrument).streak
    }

    pub fn stats(&self, instrument: &str) -> OutcomeStats {
        self.stats
            .get(&instrument.to_uppercase())
            .map(|s| *s)
            .unwrap_or_default()
    }
}
