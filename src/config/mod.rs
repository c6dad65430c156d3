//! Configuration management.
//!
//! One TOML file drives the whole engine. Sections map one-to-one onto the
//! component configs so a loaded `Config` can be handed to each constructor
//! without translation. Every field has a default; a missing section falls
//! back wholesale, so a minimal config file is a valid config file.
//!
//! ```toml
//! [shop]
//! catalog_file = "shop.toml"
//! currency_symbol = "$"
//! max_buy_quantity = 64
//! max_sell_quantity = 64
//!
//! [pricing]
//! enabled = true
//! min_multiplier = 0.5
//! max_multiplier = 2.0
//! decay_rate = 0.01
//! update_interval_secs = 300
//!
//! [limits]
//! window_secs = 60
//! max_per_window = 30
//! cooldown_secs = 2
//!
//! [ranking]
//! reset_weekday = "monday"
//! reset_hour = 0
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::shop::engine::EngineConfig;
use crate::shop::pricing::PricingConfig;
use crate::shop::ranking::RankingConfig;
use crate::shop::rate_limit::ThrottleConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopConfig {
    /// Path to the catalog definition file, relative to the working dir.
    pub catalog_file: String,
    pub currency_symbol: String,
    pub max_buy_quantity: u32,
    pub max_sell_quantity: u32,
    /// When false, permission tags are ignored entirely.
    #[serde(default = "default_true")]
    pub check_permissions: bool,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            catalog_file: "shop.toml".to_string(),
            currency_symbol: "$".to_string(),
            max_buy_quantity: 64,
            max_sell_quantity: 64,
            check_permissions: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Seconds a cached balance stays trusted.
    pub balance_ttl_secs: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            balance_ttl_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for the sled-backed trade log.
    pub data_dir: String,
    /// Disable to run without any durable history.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub shop: ShopConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub limits: ThrottleConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file.
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file.
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// The engine-level knobs from the `[shop]` section. The other sections
    /// (`pricing`, `limits`, `ranking`) already are their component's config
    /// and can be handed over directly.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_buy_quantity: self.shop.max_buy_quantity,
            max_sell_quantity: self.shop.max_sell_quantity,
            check_permissions: self.shop.check_permissions,
        }
    }

    /// Sanity-check the numbers a bad hand-edit is most likely to break.
    pub fn validate(&self) -> Result<()> {
        let p = &self.pricing;
        if p.min_multiplier <= 0.0 || p.min_multiplier > 1.0 {
            return Err(anyhow!(
                "pricing.min_multiplier must be in (0, 1], got {}",
                p.min_multiplier
            ));
        }
        if p.max_multiplier < 1.0 {
            return Err(anyhow!(
                "pricing.max_multiplier must be >= 1.0, got {}",
                p.max_multiplier
            ));
        }
        if p.decay_rate < 0.0 || !p.decay_rate.is_finite() {
            return Err(anyhow!("pricing.decay_rate must be a finite value >= 0"));
        }
        if self.shop.max_buy_quantity == 0 || self.shop.max_sell_quantity == 0 {
            return Err(anyhow!("shop.max_*_quantity must be at least 1"));
        }
        if self.limits.window_secs <= 0 {
            return Err(anyhow!("limits.window_secs must be positive"));
        }
        if self.ranking.reset_hour > 23 {
            return Err(anyhow!(
                "ranking.reset_hour must be 0-23, got {}",
                self.ranking.reset_hour
            ));
        }
        Ok(())
    }
}

/// A starter catalog written by `tradepost init` next to the config file.
pub const STARTER_CATALOG: &str = r#"# tradepost catalog
# Prices are in whole currency units. Omit (or set negative) buy_price or
# sell_price to make an item sell-only or buy-only.

[[categories]]
name = "Combat"
icon = "DIAMOND_SWORD"

  [[categories.items]]
  material = "DIAMOND_SWORD"
  name = "Diamond Sword"
  buy_price = 250.0
  sell_price = 100.0
  stack_size = 1
  lore = ["A dependable blade."]

  [[categories.items]]
  material = "BOW"
  name = "Bow"
  buy_price = 60.0
  sell_price = 25.0
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
  material = "IRON_INGOT"
  name = "Iron Ingot"
  buy_price = 10.0
  sell_price = 4.0

  [[categories.items]]
  material = "GOLD_INGOT"
  name = "Gold Ingot"
  buy_price = 20.0
  sell_price = 8.0
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.shop.max_buy_quantity, 64);
        assert_eq!(parsed.pricing.update_interval_secs, 300);
        assert_eq!(parsed.limits.max_per_window, 30);
        assert_eq!(parsed.cache.balance_ttl_secs, 30);
        parsed.validate().unwrap();
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let parsed: Config = toml::from_str("[shop]\ncatalog_file = \"x.toml\"\ncurrency_symbol = \"€\"\nmax_buy_quantity = 32\nmax_sell_quantity = 32\n").unwrap();
        assert_eq!(parsed.shop.currency_symbol, "€");
        assert_eq!(parsed.shop.max_buy_quantity, 32);
        assert_eq!(parsed.pricing.min_multiplier, 0.5);
        assert_eq!(parsed.ranking.reset_weekday, "monday");
    }

    #[test]
    fn validation_rejects_broken_multipliers() {
        let mut config = Config::default();
        config.pricing.min_multiplier = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.pricing.max_multiplier = 0.9;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ranking.reset_hour = 24;
        assert!(config.validate().is_err());
    }

    #[test]
    fn engine_config_mirrors_the_shop_section() {
        let mut config = Config::default();
        config.shop.max_buy_quantity = 16;
        config.shop.check_permissions = false;
        let engine = config.engine_config();
        assert_eq!(engine.max_buy_quantity, 16);
        assert_eq!(engine.max_sell_quantity, 64);
        assert!(!engine.check_permissions);
    }

    #[test]
    fn starter_catalog_parses() {
        let catalog = crate::shop::Catalog::from_toml(STARTER_CATALOG).unwrap();
        assert_eq!(catalog.categories().len(), 2);
        assert!(catalog.find_by_name("diamond sword").is_some());
    }
}
