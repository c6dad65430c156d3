//! # Tradepost - Storefront Transaction & Pricing Engine
//!
//! Tradepost is the economic core of an in-game shop: it validates and
//! executes buy/sell operations against a player's balance and inventory,
//! adjusts prices with per-item demand tracking, and keeps a durable trade
//! history plus a weekly leaderboard.
//!
//! ## Features
//!
//! - **Catalog**: Categories and items loaded from TOML, replaced atomically on reload, with a case-insensitive name index and legacy-id fallback.
//! - **Dynamic Pricing**: Signed demand counters drive a bounded price multiplier that decays back toward base over real time.
//! - **Safe Transactions**: Money and items move together or not at all; partial failures are compensated before the caller sees an error.
//! - **Throttling**: Per-player fixed-window rate limiting and a minimum-gap cooldown, independent of pricing.
//! - **Durable History**: Best-effort sled-backed trade log with newest-first queries and retention cleanup.
//! - **Weekly Rankings**: Top buyer/seller boards keyed by ISO year+week, reset on a schedule or lazily on window rollover.
//! - **Async Maintenance**: Tokio background tasks for decay ticks, cache cleanup, pruning, and the weekly reset check.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tradepost::shop::{CatalogHandle, MemoryBank, MemoryInventory, TradeEngine};
//!
//! fn main() -> anyhow::Result<()> {
//!     let catalog = Arc::new(CatalogHandle::open("shop.toml")?);
//!     let accounts = Arc::new(MemoryBank::with_balance("alice", 100_000));
//!     let inventory = Arc::new(MemoryInventory::new());
//!
//!     let engine = TradeEngine::builder(catalog, accounts, inventory).build();
//!     let tx = engine.buy_by_name("alice", "diamond", 3)?;
//!     println!("bought for {}", tx.total());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`shop`] - The engine itself: catalog, pricing, throttle, transactions, history, rankings
//! - [`config`] - Configuration loading and validation
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │   TradeEngine    │ ← validation, orchestration, compensation
//! └──────────────────┘
//!     │           │
//! ┌────────┐ ┌─────────────┐
//! │Pricing │ │  Throttle    │ ← in-memory, lock-per-map state
//! │Ranking │ │  BalanceCache│
//! └────────┘ └─────────────┘
//!     │
//! ┌──────────────────┐
//! │ Account/Inventory│ ← injected game services (the system of record)
//! │ TradeLog (sled)  │ ← best-effort audit trail
//! └──────────────────┘
//! ```

pub mod config;
pub mod shop;
