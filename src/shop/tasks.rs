//! Background maintenance.
//!
//! Each concern gets its own tokio interval task: price decay, price-state
//! eviction, balance-cache cleanup, throttle pruning, the weekly ranking
//! anchor check, and trade-history retention. The tasks share state with the
//! foreground path only through the components' own locks, so they can run
//! concurrently with transaction processing.

use chrono::{Duration as ChronoDuration, Utc};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::shop::economy::BalanceCache;
use crate::shop::history::TradeLog;
use crate::shop::pricing::PricingEngine;
use crate::shop::ranking::RankingBoard;
use crate::shop::rate_limit::TradeThrottle;

/// Seconds between price-state eviction sweeps.
const SWEEP_INTERVAL_SECS: u64 = 3600;
/// Seconds between balance-cache cleanups.
const CACHE_CLEANUP_SECS: u64 = 60;
/// Seconds between throttle prunes.
const THROTTLE_PRUNE_SECS: u64 = 300;
/// Seconds between ranking anchor checks.
const RANKING_CHECK_SECS: u64 = 60;
/// Seconds between history retention passes.
const RETENTION_INTERVAL_SECS: u64 = 86_400;
/// Trades older than this many days are dropped by the retention pass.
const RETENTION_DAYS: i64 = 30;

/// Handles to the running maintenance tasks. Dropping the struct leaves the
/// tasks running; call [`shutdown`](Maintenance::shutdown) to stop them.
pub struct Maintenance {
    handles: Vec<JoinHandle<()>>,
}

impl Maintenance {
    /// Spawn the full set of periodic tasks. Must be called from within a
    /// tokio runtime.
    pub fn spawn(
        pricing: Arc<PricingEngine>,
        balance_cache: Arc<BalanceCache>,
        throttle: Arc<TradeThrottle>,
        ranking: Arc<RankingBoard>,
        log: Option<Arc<dyn TradeLog>>,
    ) -> Self {
        let mut handles = Vec::new();

        if pricing.is_enabled() {
            let tick_pricing = pricing.clone();
            let interval = pricing.update_interval();
            handles.push(tokio::spawn(async move {
                let mut timer = tokio::time::interval(interval);
                timer.tick().await; // first tick fires immediately, skip it
                loop {
                    timer.tick().await;
                    let remaining = tick_pricing.tick();
                    if remaining > 0 {
                        debug!("price decay tick: {} items still under pressure", remaining);
                    }
                }
            }));

            let sweep_pricing = pricing;
            handles.push(tokio::spawn(async move {
                let mut timer = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
                timer.tick().await;
                loop {
                    timer.tick().await;
                    let evicted = sweep_pricing.sweep();
                    if evicted > 0 {
                        debug!("price sweep evicted {} idle items", evicted);
                    }
                }
            }));
        }

        handles.push(tokio::spawn(async move {
            let mut timer = tokio::time::interval(Duration::from_secs(CACHE_CLEANUP_SECS));
            timer.tick().await;
            loop {
                timer.tick().await;
                balance_cache.cleanup();
            }
        }));

        handles.push(tokio::spawn(async move {
            let mut timer = tokio::time::interval(Duration::from_secs(THROTTLE_PRUNE_SECS));
            timer.tick().await;
            loop {
                timer.tick().await;
                let removed = throttle.prune();
                if removed > 0 {
                    debug!("throttle prune dropped {} idle entries", removed);
                }
            }
        }));

        handles.push(tokio::spawn(async move {
            let mut timer = tokio::time::interval(Duration::from_secs(RANKING_CHECK_SECS));
            timer.tick().await;
            loop {
                timer.tick().await;
                if ranking.maybe_scheduled_reset() {
                    info!("scheduled weekly ranking reset fired");
                }
            }
        }));

        if let Some(log) = log {
            handles.push(tokio::spawn(async move {
                let mut timer = tokio::time::interval(Duration::from_secs(RETENTION_INTERVAL_SECS));
                timer.tick().await;
                loop {
                    timer.tick().await;
                    let cutoff = Utc::now() - ChronoDuration::days(RETENTION_DAYS);
                    let log = log.clone();
                    let result =
                        tokio::task::spawn_blocking(move || log.delete_older_than(cutoff)).await;
                    match result {
                        Ok(Ok(removed)) if removed > 0 => {
                            info!("history retention removed {} old trades", removed);
                        }
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => warn!("history retention failed: {}", e),
                        Err(e) => warn!("history retention task failed: {}", e),
                    }
                }
            }));
        }

        Self { handles }
    }

    /// Abort every maintenance task.
    pub fn shutdown(self) {
        for handle in self.handles {
            handle.abort();
        }
    }

    pub fn task_count(&self) -> usize {
        self.handles.len()
    }
}
