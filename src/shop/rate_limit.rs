//! Per-player transaction throttling.
//!
//! Two independent guards: a fixed 60-second window capping how many
//! transactions a player may start per minute, and a minimum-gap cooldown
//! between consecutive completed transactions. The window is advisory
//! anti-abuse, not billing-grade, so it resets when it elapses rather than
//! sliding continuously. Both maps self-prune entries idle longer than five
//! minutes so disconnected players do not accumulate.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Length of the fixed counting window, in seconds.
    pub window_secs: i64,
    /// Maximum transactions allowed per window.
    pub max_per_window: u32,
    /// Minimum gap between two completed transactions, in seconds.
    pub cooldown_secs: i64,
    /// Entries idle longer than this are dropped by the prune sweep.
    pub idle_prune_secs: i64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_per_window: 30,
            cooldown_secs: 2,
            idle_prune_secs: 300,
        }
    }
}

/// Why a request was throttled. Carries the wait the caller should report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Throttle {
    /// The fixed window is full; retry once it rolls over.
    RateLimited { retry_after_secs: i64 },
    /// Too soon after the player's last completed transaction.
    Cooldown { remaining_secs: i64 },
}

impl Throttle {
    pub fn retry_after_secs(&self) -> i64 {
        match self {
            Throttle::RateLimited { retry_after_secs } => *retry_after_secs,
            Throttle::Cooldown { remaining_secs } => *remaining_secs,
        }
    }
}

impl fmt::Display for Throttle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Throttle::RateLimited { retry_after_secs } => {
                write!(f, "transaction limit reached, retry in {}s", retry_after_secs)
            }
            Throttle::Cooldown { remaining_secs } => {
                write!(f, "wait {}s between transactions", remaining_secs)
            }
        }
    }
}

#[derive(Debug, Clone)]
struct WindowEntry {
    count: u32,
    window_start: DateTime<Utc>,
}

impl WindowEntry {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }
}

/// Combined rate limiter and cooldown guard, independent of pricing.
pub struct TradeThrottle {
    config: ThrottleConfig,
    windows: RwLock<HashMap<String, WindowEntry>>,
    cooldowns: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl TradeThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            windows: RwLock::new(HashMap::new()),
            cooldowns: RwLock::new(HashMap::new()),
        }
    }

    /// Check both guards and, if allowed, consume one window slot. The
    /// cooldown mark itself is only written by [`mark_completed`], so a
    /// request rejected later in validation does not delay the next attempt.
    ///
    /// [`mark_completed`]: TradeThrottle::mark_completed
    pub fn try_acquire(&self, player: &str) -> Result<(), Throttle> {
        let now = Utc::now();

        // Cooldown first: it gives the shorter, more precise wait.
        {
            let cooldowns = self.cooldowns.read().unwrap_or_else(|p| p.into_inner());
            if let Some(last) = cooldowns.get(player) {
                let elapsed = now.signed_duration_since(*last).num_milliseconds();
                let needed = self.config.cooldown_secs * 1000;
                if elapsed < needed {
                    // Round the remaining wait up so "wait 0s" never happens.
                    let remaining_secs = (needed - elapsed + 999) / 1000;
                    return Err(Throttle::Cooldown { remaining_secs });
                }
            }
        }

        let mut windows = self.windows.write().unwrap_or_else(|p| p.into_inner());
        let entry = windows
            .entry(player.to_string())
            .or_insert_with(|| WindowEntry::new(now));

        let window = Duration::seconds(self.config.window_secs);
        if now.signed_duration_since(entry.window_start) >= window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= self.config.max_per_window {
            let rollover = entry.window_start + window;
            let retry_after_secs = rollover
                .signed_duration_since(now)
                .num_seconds()
                .max(1);
            return Err(Throttle::RateLimited { retry_after_secs });
        }

        entry.count += 1;
        Ok(())
    }

    /// Record that a transaction completed, starting the cooldown.
    pub fn mark_completed(&self, player: &str) {
        let mut cooldowns = self.cooldowns.write().unwrap_or_else(|p| p.into_inner());
        cooldowns.insert(player.to_string(), Utc::now());
    }

    /// Drop window and cooldown entries idle longer than the prune horizon.
    /// Returns how many entries were removed.
    pub fn prune(&self) -> usize {
        let cutoff = Utc::now() - Duration::seconds(self.config.idle_prune_secs);
        let mut removed = 0;
        {
            let mut windows = self.windows.write().unwrap_or_else(|p| p.into_inner());
            let before = windows.len();
            windows.retain(|_, entry| entry.window_start > cutoff);
            removed += before - windows.len();
        }
        {
            let mut cooldowns = self.cooldowns.write().unwrap_or_else(|p| p.into_inner());
            let before = cooldowns.len();
            cooldowns.retain(|_, last| *last > cutoff);
            removed += before - cooldowns.len();
        }
        removed
    }

    /// Number of players currently tracked across both maps.
    pub fn tracked_players(&self) -> usize {
        let windows = self.windows.read().unwrap_or_else(|p| p.into_inner()).len();
        let cooldowns = self.cooldowns.read().unwrap_or_else(|p| p.into_inner()).len();
        windows.max(cooldowns)
    }
}
