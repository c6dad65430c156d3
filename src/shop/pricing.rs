//! Demand-driven dynamic pricing.
//!
//! Each traded item accrues a signed demand counter: buys push it up, sells
//! pull it down. The unit price is the item's base price scaled by
//! `1 + demand * decay_rate`, clamped to the configured multiplier bounds, so
//! heavy buying raises prices and oversupply drags them below base without
//! ever reaching zero. A periodic tick steps demand back toward zero so price
//! pressure relaxes over real time, and an eviction sweep drops state for
//! items nobody has traded in 24 hours.
//!
//! Pricing never fails a transaction: any internal inconsistency falls back
//! to the base price with a warning.

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::shop::types::{ItemKey, Money, ShopItem, TradeSide};

/// PriceState entries untouched for this many hours are evicted by the sweep.
const EVICT_IDLE_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// When disabled, every price query returns the static base price.
    pub enabled: bool,
    /// Lower clamp on the price multiplier (default 0.5).
    pub min_multiplier: f64,
    /// Upper clamp on the price multiplier (default 2.0).
    pub max_multiplier: f64,
    /// Demand-to-multiplier slope: multiplier = 1 + demand * decay_rate.
    pub decay_rate: f64,
    /// How many demand points each background tick removes, moving toward 0.
    pub decay_step: i64,
    /// Seconds between background decay ticks.
    pub update_interval_secs: u64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_multiplier: 0.5,
            max_multiplier: 2.0,
            decay_rate: 0.01,
            decay_step: 1,
            update_interval_secs: 300,
        }
    }
}

/// Per-item pricing state, created lazily on the first demand event.
#[derive(Debug, Clone)]
struct PriceState {
    base: Money,
    demand: i64,
    current: Money,
    last_update: DateTime<Utc>,
}

impl PriceState {
    fn new(base: Money) -> Self {
        Self {
            base,
            demand: 0,
            current: base,
            last_update: Utc::now(),
        }
    }
}

/// Computes the price used at transaction time and tracks demand.
pub struct PricingEngine {
    config: PricingConfig,
    states: RwLock<HashMap<ItemKey, PriceState>>,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self {
            config,
            states: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// How often the background decay tick should run.
    pub fn update_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.config.update_interval_secs.max(1))
    }

    /// Clamped multiplier for a given demand level. Falls back to 1.0 with a
    /// warning if the configuration produces a non-finite value.
    fn multiplier(&self, demand: i64) -> f64 {
        let raw = 1.0 + demand as f64 * self.config.decay_rate;
        if !raw.is_finite() {
            warn!("non-finite price multiplier for demand {}, using base price", demand);
            return 1.0;
        }
        raw.clamp(self.config.min_multiplier, self.config.max_multiplier)
    }

    fn scaled(&self, base: Money, demand: i64) -> Money {
        let price = (base as f64 * self.multiplier(demand)).round();
        if !price.is_finite() {
            warn!("non-finite scaled price for base {}, using base price", base);
            return base;
        }
        price as Money
    }

    /// Current unit price for one side of a trade. `None` when the item does
    /// not support that side. With pricing disabled this is the base price,
    /// unconditionally.
    pub fn unit_price(&self, item: &ShopItem, side: TradeSide) -> Option<Money> {
        let base = item.base_price(side)?;
        if !self.config.enabled {
            return Some(base);
        }
        let states = self.read_states();
        match states.get(&item.key) {
            Some(state) => Some(self.scaled(base, state.demand)),
            None => Some(base),
        }
    }

    /// The current multiplier applied to an item, 1.0 if untracked.
    pub fn current_multiplier(&self, key: &ItemKey) -> f64 {
        let states = self.read_states();
        states
            .get(key)
            .map(|s| self.multiplier(s.demand))
            .unwrap_or(1.0)
    }

    /// Record a completed trade's demand pressure. Buys raise demand by
    /// `quantity`, sells lower it. A buy-side event for an item with no buy
    /// price never creates state.
    pub fn record_demand(&self, item: &ShopItem, side: TradeSide, quantity: u32) {
        if !self.config.enabled {
            return;
        }
        // Anchor the state on the side's own base so sell-only items track a
        // real price and purchase-only items ignore stray sell events.
        let Some(anchor) = item.buy_price.or(item.sell_price) else {
            return;
        };
        if item.base_price(side).is_none() {
            return;
        }

        let mut states = self.write_states();
        let state = states
            .entry(item.key.clone())
            .or_insert_with(|| PriceState::new(anchor));
        match side {
            TradeSide::Buy => state.demand = state.demand.saturating_add(quantity as i64),
            TradeSide::Sell => state.demand = state.demand.saturating_sub(quantity as i64),
        }
        state.current = self.scaled(state.base, state.demand);
        state.last_update = Utc::now();
        debug!(
            "demand for {} now {} (price {} from base {})",
            item.key, state.demand, state.current, state.base
        );
    }

    /// Background decay: step every demand counter toward zero and recompute
    /// prices. Returns how many items still carry non-zero demand.
    pub fn tick(&self) -> usize {
        if !self.config.enabled {
            return 0;
        }
        let step = self.config.decay_step.max(0);
        let mut remaining = 0;
        let mut states = self.write_states();
        for state in states.values_mut() {
            if state.demand == 0 {
                continue;
            }
            state.demand = if state.demand > 0 {
                (state.demand - step).max(0)
            } else {
                (state.demand + step).min(0)
            };
            state.current = self.scaled(state.base, state.demand);
            state.last_update = Utc::now();
            if state.demand != 0 {
                remaining += 1;
            }
        }
        remaining
    }

    /// Drop state for items idle longer than 24 hours. Returns the number of
    /// evicted entries.
    pub fn sweep(&self) -> usize {
        let cutoff = Utc::now() - Duration::hours(EVICT_IDLE_HOURS);
        let mut states = self.write_states();
        let before = states.len();
        states.retain(|_, state| state.last_update > cutoff);
        before - states.len()
    }

    /// Number of items currently tracked.
    pub fn tracked_items(&self) -> usize {
        self.read_states().len()
    }

    fn read_states(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ItemKey, PriceState>> {
        self.states.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_states(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ItemKey, PriceState>> {
        self.states.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
