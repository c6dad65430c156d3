//! Weekly leaderboard aggregation.
//!
//! Totals are bucketed by the composite (ISO year, ISO week) key. The board
//! resets either from the scheduled check (a fixed weekday/hour anchor,
//! polled every minute) or lazily the moment any record or query notices the
//! stored window no longer matches the current week — whichever fires first.
//! Clearing the in-memory totals always wins; deleting the persisted rows of
//! the old window is best-effort and asynchronous.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::shop::history::TradeLog;
use crate::shop::types::{Money, PlayerWeeklyStats, TradeSide, WeekKey};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Day the scheduled reset fires (e.g. "monday").
    pub reset_weekday: String,
    /// Hour of day (UTC) the scheduled reset fires.
    pub reset_hour: u32,
    /// Persist per-player rows through the trade log.
    pub persist: bool,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            reset_weekday: "monday".to_string(),
            reset_hour: 0,
            persist: true,
        }
    }
}

impl RankingConfig {
    fn weekday(&self) -> Weekday {
        self.reset_weekday.parse().unwrap_or_else(|_| {
            warn!(
                "invalid ranking reset weekday '{}', defaulting to monday",
                self.reset_weekday
            );
            Weekday::Mon
        })
    }
}

struct Entry {
    stats: PlayerWeeklyStats,
    /// Insertion order, used to break ties deterministically.
    seq: u64,
}

struct BoardState {
    window: WeekKey,
    entries: HashMap<String, Entry>,
    next_seq: u64,
    last_reset: DateTime<Utc>,
    last_reset_boundary_minute: Option<i64>,
}

/// Accumulates per-player buy/sell totals for the current weekly window.
pub struct RankingBoard {
    config: RankingConfig,
    log: Option<Arc<dyn TradeLog>>,
    state: RwLock<BoardState>,
}

impl RankingBoard {
    pub fn new(config: RankingConfig, log: Option<Arc<dyn TradeLog>>) -> Self {
        Self {
            config,
            log,
            state: RwLock::new(BoardState {
                window: WeekKey::current(),
                entries: HashMap::new(),
                next_seq: 0,
                last_reset: Utc::now(),
                last_reset_boundary_minute: None,
            }),
        }
    }

    /// Rehydrate the current window from persisted rows (called once at
    /// startup). Rows from other windows are left for their reset to clean.
    pub fn load_persisted(&self) {
        let Some(log) = self.log.as_ref().filter(|_| self.config.persist) else {
            return;
        };
        let week = WeekKey::current();
        match log.week_stats(week) {
            Ok(rows) => {
                let count = rows.len();
                let mut state = self.write_state();
                for stats in rows {
                    let seq = state.next_seq;
                    state.next_seq += 1;
                    state
                        .entries
                        .insert(stats.player.to_ascii_lowercase(), Entry { stats, seq });
                }
                if count > 0 {
                    info!("restored {} ranking rows for {}", count, week);
                }
            }
            Err(e) => warn!("could not restore ranking rows: {}", e),
        }
    }

    /// Fold one completed transaction into the player's weekly totals.
    pub fn record(&self, player: &str, amount: Money, side: TradeSide) {
        let snapshot = {
            let mut guard = self.write_state();
            self.roll_if_stale(&mut guard);
            let state = &mut *guard;
            let window = state.window;
            let seq = state.next_seq;
            let entry = state
                .entries
                .entry(player.to_ascii_lowercase())
                .or_insert_with(|| Entry {
                    stats: PlayerWeeklyStats::new(player, window),
                    seq,
                });
            if entry.seq == seq {
                state.next_seq += 1;
            }
            entry.stats.record(amount, side);
            entry.stats.clone()
        };

        // Persist outside the lock; failure never blocks the in-memory path.
        if self.config.persist {
            if let Some(log) = &self.log {
                if let Err(e) = log.put_week_stats(&snapshot) {
                    warn!("failed to persist ranking row for {}: {}", player, e);
                }
            }
        }
    }

    /// Top players by total bought, descending, ties by insertion order.
    pub fn top_buyers(&self, limit: usize) -> Vec<(String, Money)> {
        self.top_by(limit, |stats| stats.total_bought)
    }

    /// Top players by total sold, descending, ties by insertion order.
    pub fn top_sellers(&self, limit: usize) -> Vec<(String, Money)> {
        self.top_by(limit, |stats| stats.total_sold)
    }

    fn top_by(&self, limit: usize, metric: impl Fn(&PlayerWeeklyStats) -> Money) -> Vec<(String, Money)> {
        {
            let mut state = self.write_state();
            self.roll_if_stale(&mut state);
        }
        let state = self.read_state();
        let mut rows: Vec<_> = state
            .entries
            .values()
            .map(|entry| (entry.stats.player.clone(), metric(&entry.stats), entry.seq))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        rows.truncate(limit);
        rows.into_iter().map(|(player, total, _)| (player, total)).collect()
    }

    /// A player's totals for the current window, if any.
    pub fn player_stats(&self, player: &str) -> Option<PlayerWeeklyStats> {
        {
            let mut state = self.write_state();
            self.roll_if_stale(&mut state);
        }
        let state = self.read_state();
        state
            .entries
            .get(&player.to_ascii_lowercase())
            .map(|entry| entry.stats.clone())
    }

    pub fn last_reset(&self) -> DateTime<Utc> {
        self.read_state().last_reset
    }

    /// Clear all totals now (admin command or scheduled anchor).
    pub fn reset(&self) {
        let mut state = self.write_state();
        self.reset_locked(&mut state);
    }

    /// Minute-resolution scheduled check. Fires when the configured weekday
    /// and hour begin; the boundary-minute memo prevents double fires within
    /// the same minute. Returns whether a reset happened.
    pub fn maybe_scheduled_reset(&self) -> bool {
        let now = Utc::now();
        if now.weekday() != self.config.weekday()
            || now.hour() != self.config.reset_hour
            || now.minute() != 0
        {
            return false;
        }
        let boundary_minute = now.timestamp() / 60;
        let mut state = self.write_state();
        if state.last_reset_boundary_minute == Some(boundary_minute) {
            return false;
        }
        state.last_reset_boundary_minute = Some(boundary_minute);
        self.reset_locked(&mut state);
        true
    }

    /// Replace the window if the calendar moved on since the last event.
    fn roll_if_stale(&self, state: &mut BoardState) {
        if state.window != WeekKey::current() {
            info!("ranking window {} is stale, rolling over", state.window);
            self.reset_locked(state);
        }
    }

    fn reset_locked(&self, state: &mut BoardState) {
        let old_week = state.window;
        let had_entries = !state.entries.is_empty();
        state.entries.clear();
        state.next_seq = 0;
        state.window = WeekKey::current();
        state.last_reset = Utc::now();
        if had_entries {
            info!("weekly ranking reset, previous window {}", old_week);
        }

        // Best-effort, asynchronous cleanup of the old window's rows.
        if self.config.persist && old_week != state.window {
            if let Some(log) = self.log.clone() {
                let delete = move || {
                    if let Err(e) = log.delete_week(old_week) {
                        warn!("failed to delete ranking rows for {}: {}", old_week, e);
                    }
                };
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn_blocking(delete);
                    }
                    Err(_) => delete(),
                }
            }
        }
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, BoardState> {
        self.state.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, BoardState> {
        self.state.write().unwrap_or_else(|p| p.into_inner())
    }
}
