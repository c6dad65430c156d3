//! End-to-end buy/sell postconditions against in-memory services and a
//! sled-backed trade log.

mod common;

use std::sync::Arc;
use tempfile::TempDir;

use common::{diamond, engine_builder};
use tradepost::shop::{
    AccountService, InventoryService, MemoryBank, MemoryInventory, RejectReason, SledTradeLog,
    TradeLog, TradeSide,
};

#[test]
fn buy_debits_exactly_and_appends_one_transaction() {
    let dir = TempDir::new().unwrap();
    let log: Arc<SledTradeLog> = Arc::new(SledTradeLog::open(dir.path()).unwrap());
    let bank = Arc::new(MemoryBank::with_balance("alice", 100_000));
    let inventory = Arc::new(MemoryInventory::new());
    let engine = engine_builder(bank.clone(), inventory.clone())
        .trade_log(log.clone())
        .build();

    let item = diamond(&engine);
    let tx = engine.buy("alice", &item, 3).unwrap();

    // Unit price 100.00, quantity 3.
    assert_eq!(tx.unit_price, 10_000);
    assert_eq!(tx.total(), 30_000);
    assert_eq!(tx.side, TradeSide::Buy);
    assert!(tx.successful);

    assert_eq!(bank.balance("alice").unwrap(), 70_000);
    assert_eq!(inventory.held("alice", &item).unwrap(), 3);

    let persisted = log.recent("alice", 10).unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].id, tx.id);
}

#[test]
fn sell_credits_exactly_and_removes_items() {
    let dir = TempDir::new().unwrap();
    let log: Arc<SledTradeLog> = Arc::new(SledTradeLog::open(dir.path()).unwrap());
    let bank = Arc::new(MemoryBank::with_balance("alice", 0));
    let inventory = Arc::new(MemoryInventory::new());
    let engine = engine_builder(bank.clone(), inventory.clone())
        .trade_log(log.clone())
        .build();

    let item = diamond(&engine);
    inventory.grant("alice", &item, 10).unwrap();

    let tx = engine.sell("alice", &item, 4).unwrap();
    assert_eq!(tx.unit_price, 5_000);
    assert_eq!(tx.total(), 20_000);

    assert_eq!(bank.balance("alice").unwrap(), 20_000);
    assert_eq!(inventory.held("alice", &item).unwrap(), 6);
    assert_eq!(log.recent("alice", 10).unwrap().len(), 1);
}

#[test]
fn rejected_requests_mutate_nothing() {
    let dir = TempDir::new().unwrap();
    let log: Arc<SledTradeLog> = Arc::new(SledTradeLog::open(dir.path()).unwrap());
    let bank = Arc::new(MemoryBank::with_balance("alice", 5_000));
    let inventory = Arc::new(MemoryInventory::new());
    let engine = engine_builder(bank.clone(), inventory.clone())
        .trade_log(log.clone())
        .build();

    let item = diamond(&engine);

    // Short 25.00 for one diamond at 100.00.
    let err = engine.buy("alice", &item, 1).unwrap_err();
    assert_eq!(
        err,
        RejectReason::InsufficientFunds {
            needed: 10_000,
            missing: 5_000
        }
    );

    // Selling items the player does not hold.
    let err = engine.sell("alice", &item, 2).unwrap_err();
    assert_eq!(err, RejectReason::InsufficientItems { needed: 2, held: 0 });

    assert_eq!(bank.balance("alice").unwrap(), 5_000);
    assert_eq!(inventory.held("alice", &item).unwrap(), 0);
    assert!(log.recent("alice", 10).unwrap().is_empty());
}

#[test]
fn buy_rejects_without_inventory_space() {
    let bank = Arc::new(MemoryBank::with_balance("alice", 1_000_000));
    let inventory = Arc::new(MemoryInventory::with_capacity(1));
    let engine = engine_builder(bank.clone(), inventory.clone()).build();

    // Swords do not stack: two swords need two slots, only one exists.
    let catalog = engine.catalog().current();
    let sword = catalog.find_by_name("diamond sword").unwrap().clone();
    let err = engine.buy("alice", &sword, 2).unwrap_err();
    assert_eq!(err, RejectReason::InventoryFull { slots_needed: 2 });
    assert_eq!(bank.balance("alice").unwrap(), 1_000_000);

    // A single sword fits.
    assert!(engine.buy("alice", &sword, 1).is_ok());
}

#[test]
fn sell_only_items_cannot_be_bought() {
    let bank = Arc::new(MemoryBank::with_balance("alice", 1_000_000));
    let inventory = Arc::new(MemoryInventory::new());
    let engine = engine_builder(bank, inventory.clone()).build();

    let catalog = engine.catalog().current();
    let cobble = catalog.find_by_name("cobblestone").unwrap().clone();
    let err = engine.buy("alice", &cobble, 1).unwrap_err();
    assert!(matches!(err, RejectReason::NotBuyable { .. }));

    inventory.grant("alice", &cobble, 5).unwrap();
    assert!(engine.sell("alice", &cobble, 5).is_ok());
}

#[test]
fn weekly_stats_follow_completed_trades() {
    let bank = Arc::new(MemoryBank::with_balance("alice", 100_000));
    let inventory = Arc::new(MemoryInventory::new());
    let engine = engine_builder(bank, inventory.clone()).build();

    let item = diamond(&engine);
    engine.buy("alice", &item, 2).unwrap();
    engine.sell("alice", &item, 1).unwrap();

    let stats = engine.ranking().player_stats("alice").unwrap();
    assert_eq!(stats.total_bought, 20_000);
    assert_eq!(stats.total_sold, 5_000);
    assert_eq!(stats.transactions, 2);
}
