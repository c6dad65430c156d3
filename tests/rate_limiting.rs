//! Throttling through the full engine: window caps, cooldowns, and the
//! distinct rejection they produce.

mod common;

use std::sync::Arc;

use common::{catalog_handle, diamond};
use tradepost::shop::{
    EngineConfig, InventoryService, MemoryBank, MemoryInventory, RejectReason, ThrottleConfig,
    TradeEngine, TradeThrottle,
};

fn engine_with_limits(limits: ThrottleConfig) -> (TradeEngine, Arc<MemoryInventory>) {
    let bank = Arc::new(MemoryBank::with_balance("alice", 10_000_000));
    let inventory = Arc::new(MemoryInventory::new());
    let engine = TradeEngine::builder(catalog_handle(), bank, inventory.clone())
        .config(EngineConfig {
            check_permissions: false,
            ..EngineConfig::default()
        })
        .throttle(Arc::new(TradeThrottle::new(limits)))
        .build();
    (engine, inventory)
}

#[test]
fn request_over_the_window_cap_gets_a_throttle_rejection() {
    let (engine, _) = engine_with_limits(ThrottleConfig {
        window_secs: 60,
        max_per_window: 3,
        cooldown_secs: 0,
        idle_prune_secs: 300,
    });
    let item = diamond(&engine);

    for _ in 0..3 {
        engine.buy("alice", &item, 1).unwrap();
    }
    let err = engine.buy("alice", &item, 1).unwrap_err();
    match err {
        RejectReason::Throttled { retry_after_secs } => {
            assert!(retry_after_secs >= 1 && retry_after_secs <= 60);
        }
        other => panic!("expected Throttled, got {:?}", other),
    }
}

#[test]
fn window_rollover_admits_the_next_request() {
    let (engine, _) = engine_with_limits(ThrottleConfig {
        window_secs: 1,
        max_per_window: 1,
        cooldown_secs: 0,
        idle_prune_secs: 300,
    });
    let item = diamond(&engine);

    engine.buy("alice", &item, 1).unwrap();
    assert!(matches!(
        engine.buy("alice", &item, 1),
        Err(RejectReason::Throttled { .. })
    ));

    std::thread::sleep(std::time::Duration::from_millis(1100));
    engine.buy("alice", &item, 1).unwrap();
}

#[test]
fn cooldown_separates_consecutive_completed_transactions() {
    let (engine, inventory) = engine_with_limits(ThrottleConfig {
        window_secs: 60,
        max_per_window: 30,
        cooldown_secs: 1,
        idle_prune_secs: 300,
    });
    let item = diamond(&engine);
    inventory.grant("alice", &item, 10).unwrap();

    engine.buy("alice", &item, 1).unwrap();

    // Any follow-up inside the gap is rejected, buy or sell alike.
    let err = engine.sell("alice", &item, 1).unwrap_err();
    assert!(matches!(err, RejectReason::Throttled { retry_after_secs } if retry_after_secs >= 1));

    std::thread::sleep(std::time::Duration::from_millis(1100));
    engine.sell("alice", &item, 1).unwrap();
}

#[test]
fn throttle_rejections_leave_no_trace() {
    let (engine, inventory) = engine_with_limits(ThrottleConfig {
        window_secs: 60,
        max_per_window: 1,
        cooldown_secs: 0,
        idle_prune_secs: 300,
    });
    let item = diamond(&engine);

    engine.buy("alice", &item, 1).unwrap();
    let held_before = inventory.held("alice", &item).unwrap();

    assert!(engine.buy("alice", &item, 1).is_err());
    assert_eq!(inventory.held("alice", &item).unwrap(), held_before);
    // Only the first, successful transaction is in history.
    assert_eq!(engine.history("alice", 10).len(), 1);
}
