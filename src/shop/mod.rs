//! Storefront engine: catalog, dynamic pricing, throttling, transaction
//! orchestration, durable history, and weekly rankings.
//!
//! The engine is the single in-process authority for economic state. It owns
//! no money and no items itself; it drives the injected account and inventory
//! services and guarantees that the two move together.

pub mod catalog;
pub mod economy;
pub mod engine;
pub mod errors;
pub mod history;
pub mod inventory;
pub mod pricing;
pub mod ranking;
pub mod rate_limit;
pub mod tasks;
pub mod types;

pub use catalog::{Catalog, CatalogHandle};
pub use economy::{AccountService, BalanceCache, MemoryBank};
pub use engine::{
    AllowAll, EngineConfig, Permissions, TradeEngine, TradeEngineBuilder, TradeObserver,
    TradeRequest, PERM_ADMIN, PERM_BUY, PERM_SELL,
};
pub use errors::{AccountError, CatalogError, HistoryError, InventoryError, RejectReason};
pub use history::{RecentTrades, SledTradeLog, TradeLog};
pub use inventory::{InventoryService, MemoryInventory};
pub use pricing::{PricingConfig, PricingEngine};
pub use ranking::{RankingBoard, RankingConfig};
pub use rate_limit::{Throttle, ThrottleConfig, TradeThrottle};
pub use tasks::Maintenance;
pub use types::{
    format_money, money_from_units, ItemKey, Money, PlayerWeeklyStats, ShopCategory, ShopItem,
    TradeSide, Transaction, WeekKey,
};
