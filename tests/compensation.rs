//! Compensation invariants: money and items change together or not at all.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use common::{diamond, engine_builder};
use tradepost::shop::{
    AccountError, AccountService, InventoryError, InventoryService, MemoryBank, MemoryInventory,
    Money, RejectReason, ShopItem, TradeEngine,
};

/// Inventory that refuses grants while the fuse is lit, delegating
/// everything else to a real in-memory inventory.
struct BrokenGrants {
    inner: MemoryInventory,
    fail_grants: AtomicBool,
}

impl BrokenGrants {
    fn new() -> Self {
        Self {
            inner: MemoryInventory::new(),
            fail_grants: AtomicBool::new(false),
        }
    }

    fn fail_next_grants(&self, on: bool) {
        self.fail_grants.store(on, Ordering::SeqCst);
    }
}

impl InventoryService for BrokenGrants {
    fn free_slots(&self, player: &str) -> Result<u32, InventoryError> {
        self.inner.free_slots(player)
    }

    fn held(&self, player: &str, item: &ShopItem) -> Result<u32, InventoryError> {
        self.inner.held(player, item)
    }

    fn grant(&self, player: &str, item: &ShopItem, quantity: u32) -> Result<(), InventoryError> {
        if self.fail_grants.load(Ordering::SeqCst) {
            return Err(InventoryError::Unavailable("simulated outage".to_string()));
        }
        self.inner.grant(player, item, quantity)
    }

    fn remove(&self, player: &str, item: &ShopItem, quantity: u32) -> Result<(), InventoryError> {
        self.inner.remove(player, item, quantity)
    }
}

/// Ledger that refuses deposits while the fuse is lit.
struct BrokenDeposits {
    inner: MemoryBank,
    fail_deposits: AtomicBool,
}

impl BrokenDeposits {
    fn new(player: &str, balance: Money) -> Self {
        Self {
            inner: MemoryBank::with_balance(player, balance),
            fail_deposits: AtomicBool::new(false),
        }
    }

    fn fail_next_deposits(&self, on: bool) {
        self.fail_deposits.store(on, Ordering::SeqCst);
    }
}

impl AccountService for BrokenDeposits {
    fn balance(&self, player: &str) -> Result<Money, AccountError> {
        self.inner.balance(player)
    }

    fn withdraw(&self, player: &str, amount: Money) -> Result<(), AccountError> {
        self.inner.withdraw(player, amount)
    }

    fn deposit(&self, player: &str, amount: Money) -> Result<(), AccountError> {
        if self.fail_deposits.load(Ordering::SeqCst) {
            return Err(AccountError::Unavailable("simulated outage".to_string()));
        }
        self.inner.deposit(player, amount)
    }
}

#[test]
fn failed_delivery_refunds_the_debit() {
    let bank = Arc::new(MemoryBank::with_balance("alice", 100_000));
    let inventory = Arc::new(BrokenGrants::new());
    let engine = TradeEngine::builder(common::catalog_handle(), bank.clone(), inventory.clone())
        .config(tradepost::shop::EngineConfig {
            check_permissions: false,
            ..Default::default()
        })
        .build();

    let item = diamond(&engine);
    inventory.fail_next_grants(true);

    let err = engine.buy("alice", &item, 2).unwrap_err();
    assert_eq!(err, RejectReason::External);

    // The debit was compensated: balance intact, no items, no history.
    assert_eq!(bank.balance("alice").unwrap(), 100_000);
    assert_eq!(inventory.held("alice", &item).unwrap(), 0);
    assert!(engine.history("alice", 10).is_empty());

    // Once the outage clears the same request succeeds.
    inventory.fail_next_grants(false);
    assert!(engine.buy("alice", &item, 2).is_ok());
    assert_eq!(bank.balance("alice").unwrap(), 80_000);
}

#[test]
fn failed_credit_restores_removed_items() {
    let bank = Arc::new(BrokenDeposits::new("alice", 0));
    let inventory = Arc::new(MemoryInventory::new());
    let engine = engine_builder_with(bank.clone(), inventory.clone());

    let item = diamond(&engine);
    inventory.grant("alice", &item, 5).unwrap();
    bank.fail_next_deposits(true);

    let err = engine.sell("alice", &item, 3).unwrap_err();
    assert_eq!(err, RejectReason::External);

    // The removal was compensated: all five items back, no credit.
    assert_eq!(inventory.held("alice", &item).unwrap(), 5);
    assert_eq!(bank.balance("alice").unwrap(), 0);
    assert!(engine.history("alice", 10).is_empty());

    bank.fail_next_deposits(false);
    assert!(engine.sell("alice", &item, 3).is_ok());
    assert_eq!(bank.balance("alice").unwrap(), 15_000);
    assert_eq!(inventory.held("alice", &item).unwrap(), 2);
}

#[test]
fn stale_cache_does_not_bypass_the_authoritative_debit() {
    let bank = Arc::new(MemoryBank::with_balance("alice", 50_000));
    let inventory = Arc::new(MemoryInventory::with_capacity(1));
    let engine = engine_builder(bank.clone(), inventory.clone()).build();

    let catalog = engine.catalog().current();
    let sword = catalog.find_by_name("diamond sword").unwrap().clone();

    // Warm the cache: the funds pre-check passes, then the capacity check
    // rejects (two unstackable swords, one slot) without touching the cache.
    let err = engine.buy("alice", &sword, 2).unwrap_err();
    assert_eq!(err, RejectReason::InventoryFull { slots_needed: 2 });

    // Drain the account behind the engine's back. The cached 500.00 is now
    // stale but still within its TTL.
    bank.set_balance("alice", 0);

    // The pre-check passes on the stale value; the ledger's own
    // re-validation rejects the debit and nothing moves.
    let err = engine.buy("alice", &sword, 1).unwrap_err();
    assert_eq!(
        err,
        RejectReason::InsufficientFunds {
            needed: 25_000,
            missing: 25_000
        }
    );
    assert_eq!(bank.balance("alice").unwrap(), 0);
    assert_eq!(inventory.held("alice", &sword).unwrap(), 0);
}

fn engine_builder_with(
    bank: Arc<BrokenDeposits>,
    inventory: Arc<MemoryInventory>,
) -> TradeEngine {
    TradeEngine::builder(common::catalog_handle(), bank, inventory)
        .config(tradepost::shop::EngineConfig {
            check_permissions: false,
            ..Default::default()
        })
        .throttle(Arc::new(tradepost::shop::TradeThrottle::new(
            tradepost::shop::ThrottleConfig {
                cooldown_secs: 0,
                ..Default::default()
            },
        )))
        .build()
}
