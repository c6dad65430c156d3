//! Durable transaction history and weekly-stats persistence.
//!
//! The trade log is best-effort audit, not the system of record for funds or
//! items: a failed append is logged and dropped, never retried inline, and
//! never rolls back the economic mutation that already committed. The sled
//! implementation keys trades by player with an inverted timestamp so a
//! prefix scan yields newest-first without sorting.

use chrono::{DateTime, Utc};
use log::warn;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::RwLock;

use crate::shop::errors::HistoryError;
use crate::shop::types::{PlayerWeeklyStats, Transaction, WeekKey, TRADE_SCHEMA_VERSION};

const TREE_TRADES: &str = "trades";
const TREE_WEEK_STATS: &str = "week_stats";

/// How many transactions the in-memory recent cache keeps per player.
const RECENT_CAP: usize = 10;

/// Durable append-and-query store for completed transactions, plus the
/// weekly-stats rows the ranking board persists. Implementations must
/// tolerate being unavailable; every method is allowed to fail and the
/// engine treats each failure as non-fatal.
pub trait TradeLog: Send + Sync {
    fn append(&self, tx: &Transaction) -> Result<(), HistoryError>;

    /// A player's transactions, most recent first.
    fn recent(&self, player: &str, limit: usize) -> Result<Vec<Transaction>, HistoryError>;

    /// Drop trades older than the cutoff. Returns how many were removed.
    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, HistoryError>;

    fn put_week_stats(&self, stats: &PlayerWeeklyStats) -> Result<(), HistoryError>;

    /// All persisted rows for one weekly window.
    fn week_stats(&self, week: WeekKey) -> Result<Vec<PlayerWeeklyStats>, HistoryError>;

    /// Delete all rows for one weekly window. Returns how many were removed.
    fn delete_week(&self, week: WeekKey) -> Result<usize, HistoryError>;
}

/// Sled-backed [`TradeLog`].
pub struct SledTradeLog {
    _db: sled::Db,
    trades: sled::Tree,
    week_stats: sled::Tree,
}

impl SledTradeLog {
    /// Open (or create) the store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, HistoryError> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;
        let db = sled::open(path)?;
        let trades = db.open_tree(TREE_TRADES)?;
        let week_stats = db.open_tree(TREE_WEEK_STATS)?;
        Ok(Self {
            _db: db,
            trades,
            week_stats,
        })
    }

    /// `player:inverted-nanos:id` so an ascending prefix scan is
    /// newest-first.
    fn trade_key(tx: &Transaction) -> Vec<u8> {
        let nanos = tx
            .timestamp
            .timestamp_nanos_opt()
            .unwrap_or_else(|| tx.timestamp.timestamp_micros() * 1000) as u64;
        format!(
            "{}:{:020}:{}",
            tx.player.to_ascii_lowercase(),
            u64::MAX - nanos,
            tx.id
        )
        .into_bytes()
    }

    fn player_prefix(player: &str) -> Vec<u8> {
        format!("{}:", player.to_ascii_lowercase()).into_bytes()
    }

    fn stats_key(week: WeekKey, player: &str) -> Vec<u8> {
        format!("{}:{}", week, player.to_ascii_lowercase()).into_bytes()
    }

    fn week_prefix(week: WeekKey) -> Vec<u8> {
        format!("{}:", week).into_bytes()
    }
}

impl TradeLog for SledTradeLog {
    fn append(&self, tx: &Transaction) -> Result<(), HistoryError> {
        let bytes = bincode::serialize(tx)?;
        self.trades.insert(Self::trade_key(tx), bytes)?;
        self.trades.flush()?;
        Ok(())
    }

    fn recent(&self, player: &str, limit: usize) -> Result<Vec<Transaction>, HistoryError> {
        let mut out = Vec::new();
        for entry in self.trades.scan_prefix(Self::player_prefix(player)) {
            let (_, bytes) = entry?;
            let tx: Transaction = bincode::deserialize(&bytes)?;
            if tx.schema_version != TRADE_SCHEMA_VERSION {
                warn!(
                    "skipping trade record with schema {} (expected {})",
                    tx.schema_version, TRADE_SCHEMA_VERSION
                );
                continue;
            }
            out.push(tx);
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }

    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, HistoryError> {
        let mut stale = Vec::new();
        for entry in self.trades.iter() {
            let (key, bytes) = entry?;
            let tx: Transaction = bincode::deserialize(&bytes)?;
            if tx.timestamp < cutoff {
                stale.push(key);
            }
        }
        for key in &stale {
            self.trades.remove(key)?;
        }
        if !stale.is_empty() {
            self.trades.flush()?;
        }
        Ok(stale.len())
    }

    fn put_week_stats(&self, stats: &PlayerWeeklyStats) -> Result<(), HistoryError> {
        let bytes = bincode::serialize(stats)?;
        self.week_stats
            .insert(Self::stats_key(stats.week, &stats.player), bytes)?;
        Ok(())
    }

    fn week_stats(&self, week: WeekKey) -> Result<Vec<PlayerWeeklyStats>, HistoryError> {
        let mut out = Vec::new();
        for entry in self.week_stats.scan_prefix(Self::week_prefix(week)) {
            let (_, bytes) = entry?;
            out.push(bincode::deserialize(&bytes)?);
        }
        Ok(out)
    }

    fn delete_week(&self, week: WeekKey) -> Result<usize, HistoryError> {
        let mut keys = Vec::new();
        for entry in self.week_stats.scan_prefix(Self::week_prefix(week)) {
            let (key, _) = entry?;
            keys.push(key);
        }
        for key in &keys {
            self.week_stats.remove(key)?;
        }
        if !keys.is_empty() {
            self.week_stats.flush()?;
        }
        Ok(keys.len())
    }
}

/// Bounded in-memory cache of each player's latest transactions, so history
/// display does not need the durable store on the hot path.
#[derive(Default)]
pub struct RecentTrades {
    per_player: RwLock<HashMap<String, VecDeque<Transaction>>>,
}

impl RecentTrades {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, tx: Transaction) {
        let mut map = self.per_player.write().unwrap_or_else(|p| p.into_inner());
        let queue = map
            .entry(tx.player.to_ascii_lowercase())
            .or_insert_with(VecDeque::new);
        queue.push_front(tx);
        queue.truncate(RECENT_CAP);
    }

    pub fn for_player(&self, player: &str) -> Vec<Transaction> {
        let map = self.per_player.read().unwrap_or_else(|p| p.into_inner());
        map.get(&player.to_ascii_lowercase())
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        let mut map = self.per_player.write().unwrap_or_else(|p| p.into_inner());
        map.clear();
    }
}
