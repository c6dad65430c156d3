//! Transaction orchestration.
//!
//! A request walks a fixed sequence of checks — throttle, permission, price,
//! funds or held items, capacity — and only then touches external state. The
//! ledger and the inventory must move together: if the second mutation fails
//! the first is compensated before the caller sees the error, so no request
//! can end with money gone and no items delivered, or items gone and no money
//! credited. History logging is best-effort and never rolls back a completed
//! trade.
//!
//! No lock on shared in-memory state is held across an external call: the
//! throttle, cache, pricing, and ranking each take their own lock briefly
//! before or after the ledger/inventory mutations.

use log::{debug, error, info, warn};
use std::sync::Arc;

use crate::shop::catalog::CatalogHandle;
use crate::shop::economy::{AccountService, BalanceCache};
use crate::shop::errors::{AccountError, InventoryError, RejectReason};
use crate::shop::history::{RecentTrades, TradeLog};
use crate::shop::inventory::InventoryService;
use crate::shop::pricing::PricingEngine;
use crate::shop::ranking::RankingBoard;
use crate::shop::rate_limit::TradeThrottle;
use crate::shop::types::{ShopItem, TradeSide, Transaction};

/// Global permission tag required to buy anything.
pub const PERM_BUY: &str = "tradepost.buy";
/// Global permission tag required to sell anything.
pub const PERM_SELL: &str = "tradepost.sell";
/// Tag for administrative operations (reload, reset).
pub const PERM_ADMIN: &str = "tradepost.admin";

/// Capability check against the embedding game's permission system.
pub trait Permissions: Send + Sync {
    fn has(&self, player: &str, tag: &str) -> bool;
}

/// Grants everything; the default when the embedder does not wire a real
/// permission system.
pub struct AllowAll;

impl Permissions for AllowAll {
    fn has(&self, _player: &str, _tag: &str) -> bool {
        true
    }
}

/// A validated request, as seen by pre-transaction observers.
#[derive(Debug, Clone)]
pub struct TradeRequest {
    pub player: String,
    pub item: ShopItem,
    pub quantity: u32,
    pub side: TradeSide,
    pub unit_price: crate::shop::types::Money,
}

impl TradeRequest {
    pub fn total(&self) -> crate::shop::types::Money {
        self.unit_price * self.quantity as crate::shop::types::Money
    }
}

/// Hook points around a transaction. Observers run synchronously in
/// registration order: `before` fires after validation but before any
/// external mutation and may veto; `after` fires once the trade has fully
/// committed and is notification only.
pub trait TradeObserver: Send + Sync {
    fn before(&self, _request: &TradeRequest) -> Result<(), String> {
        Ok(())
    }

    fn after(&self, _tx: &Transaction) {}
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Largest quantity accepted for a single buy.
    pub max_buy_quantity: u32,
    /// Largest quantity accepted for a single sell.
    pub max_sell_quantity: u32,
    /// When false, the global and per-item permission checks are skipped.
    pub check_permissions: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_buy_quantity: 64,
            max_sell_quantity: 64,
            check_permissions: true,
        }
    }
}

/// The storefront transaction engine. One instance serves every player;
/// construct it once and share it by reference.
pub struct TradeEngine {
    config: EngineConfig,
    catalog: Arc<CatalogHandle>,
    pricing: Arc<PricingEngine>,
    throttle: Arc<TradeThrottle>,
    balance_cache: Arc<BalanceCache>,
    ranking: Arc<RankingBoard>,
    accounts: Arc<dyn AccountService>,
    inventory: Arc<dyn InventoryService>,
    permissions: Arc<dyn Permissions>,
    log: Option<Arc<dyn TradeLog>>,
    recent: RecentTrades,
    observers: Vec<Arc<dyn TradeObserver>>,
}

/// Assembles a [`TradeEngine`] from its collaborators. Catalog, accounts and
/// inventory are required; everything else has a sensible default.
pub struct TradeEngineBuilder {
    config: EngineConfig,
    catalog: Arc<CatalogHandle>,
    pricing: Option<Arc<PricingEngine>>,
    throttle: Option<Arc<TradeThrottle>>,
    balance_cache: Option<Arc<BalanceCache>>,
    ranking: Option<Arc<RankingBoard>>,
    accounts: Arc<dyn AccountService>,
    inventory: Arc<dyn InventoryService>,
    permissions: Arc<dyn Permissions>,
    log: Option<Arc<dyn TradeLog>>,
    observers: Vec<Arc<dyn TradeObserver>>,
}

impl TradeEngineBuilder {
    pub fn new(
        catalog: Arc<CatalogHandle>,
        accounts: Arc<dyn AccountService>,
        inventory: Arc<dyn InventoryService>,
    ) -> Self {
        Self {
            config: EngineConfig::default(),
            catalog,
            pricing: None,
            throttle: None,
            balance_cache: None,
            ranking: None,
            accounts,
            inventory,
            permissions: Arc::new(AllowAll),
            log: None,
            observers: Vec::new(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn pricing(mut self, pricing: Arc<PricingEngine>) -> Self {
        self.pricing = Some(pricing);
        self
    }

    pub fn throttle(mut self, throttle: Arc<TradeThrottle>) -> Self {
        self.throttle = Some(throttle);
        self
    }

    pub fn balance_cache(mut self, cache: Arc<BalanceCache>) -> Self {
        self.balance_cache = Some(cache);
        self
    }

    pub fn ranking(mut self, ranking: Arc<RankingBoard>) -> Self {
        self.ranking = Some(ranking);
        self
    }

    pub fn permissions(mut self, permissions: Arc<dyn Permissions>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn trade_log(mut self, log: Arc<dyn TradeLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn TradeObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn build(self) -> TradeEngine {
        TradeEngine {
            config: self.config,
            catalog: self.catalog,
            pricing: self
                .pricing
                .unwrap_or_else(|| Arc::new(PricingEngine::new(Default::default()))),
            throttle: self
                .throttle
                .unwrap_or_else(|| Arc::new(TradeThrottle::new(Default::default()))),
            balance_cache: self
                .balance_cache
                .unwrap_or_else(|| Arc::new(BalanceCache::new(30))),
            ranking: self
                .ranking
                .unwrap_or_else(|| Arc::new(RankingBoard::new(Default::default(), None))),
            accounts: self.accounts,
            inventory: self.inventory,
            permissions: self.permissions,
            log: self.log,
            recent: RecentTrades::new(),
            observers: self.observers,
        }
    }
}

impl TradeEngine {
    pub fn builder(
        catalog: Arc<CatalogHandle>,
        accounts: Arc<dyn AccountService>,
        inventory: Arc<dyn InventoryService>,
    ) -> TradeEngineBuilder {
        TradeEngineBuilder::new(catalog, accounts, inventory)
    }

    pub fn catalog(&self) -> &CatalogHandle {
        &self.catalog
    }

    pub fn pricing(&self) -> &PricingEngine {
        &self.pricing
    }

    pub fn ranking(&self) -> &RankingBoard {
        &self.ranking
    }

    /// Buy `quantity` of the named catalog item.
    pub fn buy_by_name(
        &self,
        player: &str,
        name: &str,
        quantity: u32,
    ) -> Result<Transaction, RejectReason> {
        let catalog = self.catalog.current();
        let item = catalog.find_by_name(name).ok_or_else(|| RejectReason::UnknownItem {
            name: name.to_string(),
        })?;
        self.buy(player, item, quantity)
    }

    /// Sell `quantity` of the named catalog item.
    pub fn sell_by_name(
        &self,
        player: &str,
        name: &str,
        quantity: u32,
    ) -> Result<Transaction, RejectReason> {
        let catalog = self.catalog.current();
        let item = catalog.find_by_name(name).ok_or_else(|| RejectReason::UnknownItem {
            name: name.to_string(),
        })?;
        self.sell(player, item, quantity)
    }

    /// Buy: debit funds, then deliver items. The debit is authoritative at
    /// the ledger; the cached balance only shapes the early "insufficient
    /// funds" rejection. A failed delivery refunds the debit before the
    /// error surfaces.
    pub fn buy(
        &self,
        player: &str,
        item: &ShopItem,
        quantity: u32,
    ) -> Result<Transaction, RejectReason> {
        if quantity == 0 || quantity > self.config.max_buy_quantity {
            return Err(RejectReason::BadQuantity {
                max: self.config.max_buy_quantity,
            });
        }

        self.throttle.try_acquire(player).map_err(|t| RejectReason::Throttled {
            retry_after_secs: t.retry_after_secs(),
        })?;

        self.check_permission(player, PERM_BUY)?;
        if let Some(tag) = &item.permission {
            self.check_permission(player, tag)?;
        }

        let unit_price =
            self.pricing
                .unit_price(item, TradeSide::Buy)
                .ok_or_else(|| RejectReason::NotBuyable {
                    name: item.display_name.clone(),
                })?;
        let total = unit_price * quantity as i64;

        // Pre-check against the cached balance so most short-funded requests
        // reject cheaply and with an exact shortfall.
        let balance = self
            .balance_cache
            .get(player, self.accounts.as_ref())
            .map_err(|e| self.external("balance pre-check", player, e))?;
        if balance < total {
            return Err(RejectReason::InsufficientFunds {
                needed: total,
                missing: total - balance,
            });
        }

        let slots_needed = item.slots_needed(quantity);
        let free = self
            .inventory
            .free_slots(player)
            .map_err(|e| self.external_inv("capacity check", player, e))?;
        if free < slots_needed {
            return Err(RejectReason::InventoryFull { slots_needed });
        }

        let request = TradeRequest {
            player: player.to_string(),
            item: item.clone(),
            quantity,
            side: TradeSide::Buy,
            unit_price,
        };
        self.notify_before(&request)?;

        // The ledger re-validates the balance at the moment of debit; the
        // cache may have been stale.
        match self.accounts.withdraw(player, total) {
            Ok(()) => {}
            Err(AccountError::InsufficientFunds { needed, balance }) => {
                self.balance_cache.invalidate(player);
                return Err(RejectReason::InsufficientFunds {
                    needed,
                    missing: needed - balance,
                });
            }
            Err(e) => return Err(self.external("withdraw", player, e)),
        }

        if let Err(e) = self.inventory.grant(player, item, quantity) {
            // Compensate: the player paid and got nothing. Refund before
            // surfacing the failure.
            warn!(
                "delivery of {}x {} to {} failed ({}), refunding {}",
                quantity, item.key, player, e, total
            );
            if let Err(refund_err) = self.accounts.deposit(player, total) {
                error!(
                    "REFUND FAILED for {}: {} still debited after failed delivery ({})",
                    player, total, refund_err
                );
                return Err(RejectReason::External);
            }
            self.balance_cache.invalidate(player);
            return match e {
                InventoryError::NoSpace => Err(RejectReason::InventoryFull { slots_needed }),
                other => Err(self.external_inv("grant", player, other)),
            };
        }

        self.balance_cache.invalidate(player);
        let tx = self.commit(request);
        Ok(tx)
    }

    /// Sell: remove items, then credit funds. A failed credit restores the
    /// removed items before the error surfaces.
    pub fn sell(
        &self,
        player: &str,
        item: &ShopItem,
        quantity: u32,
    ) -> Result<Transaction, RejectReason> {
        if quantity == 0 || quantity > self.config.max_sell_quantity {
            return Err(RejectReason::BadQuantity {
                max: self.config.max_sell_quantity,
            });
        }

        self.throttle.try_acquire(player).map_err(|t| RejectReason::Throttled {
            retry_after_secs: t.retry_after_secs(),
        })?;

        self.check_permission(player, PERM_SELL)?;

        let unit_price =
            self.pricing
                .unit_price(item, TradeSide::Sell)
                .ok_or_else(|| RejectReason::NotSellable {
                    name: item.display_name.clone(),
                })?;
        let total = unit_price * quantity as i64;

        // Items are matched by identity, not display name.
        let held = self
            .inventory
            .held(player, item)
            .map_err(|e| self.external_inv("held check", player, e))?;
        if held < quantity {
            return Err(RejectReason::InsufficientItems {
                needed: quantity,
                held,
            });
        }

        let request = TradeRequest {
            player: player.to_string(),
            item: item.clone(),
            quantity,
            side: TradeSide::Sell,
            unit_price,
        };
        self.notify_before(&request)?;

        match self.inventory.remove(player, item, quantity) {
            Ok(()) => {}
            Err(InventoryError::NotEnough { needed, held }) => {
                return Err(RejectReason::InsufficientItems { needed, held });
            }
            Err(e) => return Err(self.external_inv("remove", player, e)),
        }

        if let Err(e) = self.accounts.deposit(player, total) {
            // Compensate: give the items back before surfacing the failure.
            warn!(
                "credit of {} to {} failed ({}), restoring {}x {}",
                total, player, e, quantity, item.key
            );
            if let Err(restore_err) = self.inventory.grant(player, item, quantity) {
                error!(
                    "RESTORE FAILED for {}: {}x {} removed with no credit ({})",
                    player, quantity, item.key, restore_err
                );
                return Err(RejectReason::External);
            }
            return Err(self.external("deposit", player, e));
        }

        self.balance_cache.invalidate(player);
        let tx = self.commit(request);
        Ok(tx)
    }

    /// Sell a player's entire held quantity of the item, clamped to the
    /// per-transaction maximum.
    pub fn sell_all(&self, player: &str, item: &ShopItem) -> Result<Transaction, RejectReason> {
        let held = self
            .inventory
            .held(player, item)
            .map_err(|e| self.external_inv("held check", player, e))?;
        if held == 0 {
            return Err(RejectReason::InsufficientItems { needed: 1, held: 0 });
        }
        self.sell(player, item, held.min(self.config.max_sell_quantity))
    }

    /// A player's recent transactions: the in-memory cache when it has
    /// entries, otherwise the durable log.
    pub fn history(&self, player: &str, limit: usize) -> Vec<Transaction> {
        let cached = self.recent.for_player(player);
        if !cached.is_empty() {
            let mut cached = cached;
            cached.truncate(limit);
            return cached;
        }
        match self.log.as_ref().map(|log| log.recent(player, limit)) {
            Some(Ok(rows)) => rows,
            Some(Err(e)) => {
                warn!("history query for {} failed: {}", player, e);
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Post-mutation bookkeeping shared by buy and sell. Everything here is
    /// commit-or-log: the economic mutation already happened and stands.
    fn commit(&self, request: TradeRequest) -> Transaction {
        let mut tx = Transaction::new(
            request.player.clone(),
            request.item.key.clone(),
            request.quantity,
            request.unit_price,
            request.side,
        );
        tx.mark_successful();

        if let Some(log) = &self.log {
            if let Err(e) = log.append(&tx) {
                warn!("failed to append trade {} to history: {}", tx.id, e);
            }
        }
        self.recent.push(tx.clone());

        self.pricing.record_demand(&request.item, request.side, request.quantity);
        self.ranking.record(&request.player, tx.total(), request.side);
        self.throttle.mark_completed(&request.player);

        for observer in &self.observers {
            observer.after(&tx);
        }

        info!("{}", tx);
        tx
    }

    fn notify_before(&self, request: &TradeRequest) -> Result<(), RejectReason> {
        for observer in &self.observers {
            if let Err(reason) = observer.before(request) {
                debug!(
                    "observer vetoed {} of {} for {}: {}",
                    request.side, request.item.key, request.player, reason
                );
                return Err(RejectReason::Vetoed { reason });
            }
        }
        Ok(())
    }

    fn check_permission(&self, player: &str, tag: &str) -> Result<(), RejectReason> {
        if self.config.check_permissions && !self.permissions.has(player, tag) {
            return Err(RejectReason::NoPermission {
                tag: tag.to_string(),
            });
        }
        Ok(())
    }

    fn external(&self, what: &str, player: &str, e: AccountError) -> RejectReason {
        warn!("account {} for {} failed: {}", what, player, e);
        RejectReason::External
    }

    fn external_inv(&self, what: &str, player: &str, e: InventoryError) -> RejectReason {
        warn!("inventory {} for {} failed: {}", what, player, e);
        RejectReason::External
    }
}
