//! Shared fixtures for the integration suites.

use std::sync::Arc;

use tradepost::shop::{
    Catalog, CatalogHandle, EngineConfig, MemoryBank, MemoryInventory, ShopItem, ThrottleConfig,
    TradeEngine, TradeEngineBuilder, TradeThrottle,
};

pub const CATALOG_TOML: &str = r#"
[[categories]]
name = "Combat"
icon = "DIAMOND_SWORD"

  [[categories.items]]
  material = "DIAMOND_SWORD"
  name = "Diamond Sword"
  buy_price = 250.0
  sell_price = 100.0
  stack_size = 1

[[categories]]
name = "Resources"
icon = "CHEST"

  [[categories.items]]
  material = "DIAMOND"
  name = "Diamond"
  buy_price = 100.0
  sell_price = 50.0

  [[categories.items]]
  material = "COBBLESTONE"
  name = "Cobblestone"
  sell_price = 0.5
"#;

pub fn catalog_handle() -> Arc<CatalogHandle> {
    Arc::new(CatalogHandle::from_catalog(
        Catalog::from_toml(CATALOG_TOML).unwrap(),
    ))
}

/// Engine over in-memory services with throttling relaxed so sequential test
/// transactions do not trip the cooldown.
pub fn engine_builder(
    bank: Arc<MemoryBank>,
    inventory: Arc<MemoryInventory>,
) -> TradeEngineBuilder {
    TradeEngine::builder(catalog_handle(), bank, inventory)
        .config(EngineConfig {
            check_permissions: false,
            ..EngineConfig::default()
        })
        .throttle(Arc::new(TradeThrottle::new(ThrottleConfig {
            cooldown_secs: 0,
            max_per_window: 10_000,
            ..ThrottleConfig::default()
        })))
}

pub fn diamond(engine: &TradeEngine) -> ShopItem {
    engine
        .catalog()
        .current()
        .find_by_name("diamond")
        .unwrap()
        .clone()
}
