//! Core data model for the storefront engine.
//!
//! Money is an `i64` count of minor currency units (hundredths of the game
//! currency). Item identity is a `(material, variant)` pair; display names are
//! presentation only and never trusted for matching.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Minor currency units (hundredths of one unit).
pub type Money = i64;

/// Number of minor units in one major currency unit.
pub const MINOR_PER_UNIT: i64 = 100;

/// Convert a price given in major units (as read from a catalog file) into
/// minor units, rounding to the nearest.
pub fn money_from_units(units: f64) -> Money {
    (units * MINOR_PER_UNIT as f64).round() as Money
}

/// Format an amount for display, e.g. `$12.34`. Negative amounts keep the
/// sign between the symbol and the digits.
pub fn format_money(amount: Money, symbol: &str) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.abs();
    format!(
        "{}{}{}.{:02}",
        symbol,
        sign,
        abs / MINOR_PER_UNIT,
        abs % MINOR_PER_UNIT
    )
}

/// Schema version stamped into persisted trade records.
pub const TRADE_SCHEMA_VERSION: u8 = 1;

fn default_trade_schema_version() -> u8 {
    TRADE_SCHEMA_VERSION
}

/// Identity of a catalog item: material kind plus a small sub-variant
/// discriminator. Matching is always done on this pair, never on the display
/// name, so renamed or spoofed items do not match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    /// Material kind, stored uppercase (e.g. `DIAMOND_SWORD`).
    pub material: String,
    /// Sub-variant discriminator; 0 for most items.
    pub variant: u8,
}

impl ItemKey {
    pub fn new(material: impl Into<String>, variant: u8) -> Self {
        Self {
            material: material.into().to_ascii_uppercase(),
            variant,
        }
    }

    /// Parse a `MATERIAL:variant` string; a bare material implies variant 0.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        match s.split_once(':') {
            Some((mat, var)) => {
                let variant = var.trim().parse::<u8>().ok()?;
                Some(Self::new(mat.trim(), variant))
            }
            None => Some(Self::new(s, 0)),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.material, self.variant)
    }
}

/// An item offered by the storefront. Immutable after catalog load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopItem {
    /// Identity used for inventory matching and demand tracking.
    pub key: ItemKey,
    /// Human-facing name; unique per catalog (case-insensitive).
    pub display_name: String,
    /// Base buy price in minor units; `None` means not purchasable.
    pub buy_price: Option<Money>,
    /// Base sell price in minor units; `None` means not sellable.
    pub sell_price: Option<Money>,
    /// Extra permission tag required to buy this item, if any.
    pub permission: Option<String>,
    /// Free-form lore lines for display.
    pub lore: Vec<String>,
    /// How many of this item fit in one inventory slot (1 = unstackable).
    pub stack_size: u32,
}

impl ShopItem {
    /// Inventory slots needed to hold `quantity` of this item.
    pub fn slots_needed(&self, quantity: u32) -> u32 {
        let per_slot = self.stack_size.max(1);
        quantity.div_ceil(per_slot)
    }

    pub fn is_buyable(&self) -> bool {
        self.buy_price.is_some()
    }

    pub fn is_sellable(&self) -> bool {
        self.sell_price.is_some()
    }

    /// Base price for one unit on the given side.
    pub fn base_price(&self, side: TradeSide) -> Option<Money> {
        match side {
            TradeSide::Buy => self.buy_price,
            TradeSide::Sell => self.sell_price,
        }
    }
}

/// A named, ordered group of items. Fully replaced (never mutated) on reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopCategory {
    pub name: String,
    /// Material name used as the category icon by the presentation layer.
    pub icon: String,
    /// Permission tag required to browse this category, if any.
    pub permission: Option<String>,
    /// Items in display order.
    pub items: Vec<ShopItem>,
}

/// Direction of a trade from the player's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn is_buy(self) -> bool {
        matches!(self, TradeSide::Buy)
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

/// A completed (or in-flight) trade. Immutable once `successful` is set;
/// failed attempts are never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub player: String,
    pub item: ItemKey,
    pub quantity: u32,
    /// Unit price at execution time, after dynamic pricing.
    pub unit_price: Money,
    pub side: TradeSide,
    pub timestamp: DateTime<Utc>,
    pub successful: bool,
    #[serde(default = "default_trade_schema_version")]
    pub schema_version: u8,
}

impl Transaction {
    pub fn new(
        player: impl Into<String>,
        item: ItemKey,
        quantity: u32,
        unit_price: Money,
        side: TradeSide,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            player: player.into(),
            item,
            quantity,
            unit_price,
            side,
            timestamp: Utc::now(),
            successful: false,
            schema_version: TRADE_SCHEMA_VERSION,
        }
    }

    pub fn total(&self) -> Money {
        self.unit_price * self.quantity as Money
    }

    pub fn mark_successful(&mut self) {
        self.successful = true;
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} {}x {} at {} each (total {})",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.player,
            if self.side.is_buy() { "bought" } else { "sold" },
            self.quantity,
            self.item,
            format_money(self.unit_price, ""),
            format_money(self.total(), "")
        )
    }
}

/// The (ISO year, ISO week) window used to bucket ranking statistics.
/// The composite key keeps week 3 of one year from colliding with week 3 of
/// the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeekKey {
    pub iso_year: i32,
    pub iso_week: u32,
}

impl WeekKey {
    pub fn current() -> Self {
        Self::for_timestamp(Utc::now())
    }

    pub fn for_timestamp(at: DateTime<Utc>) -> Self {
        use chrono::Datelike;
        let week = at.iso_week();
        Self {
            iso_year: week.year(),
            iso_week: week.week(),
        }
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-W{:02}", self.iso_year, self.iso_week)
    }
}

/// Per-player totals within one weekly window. Replaced, never merged, when
/// the window rolls over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerWeeklyStats {
    pub player: String,
    pub total_bought: Money,
    pub total_sold: Money,
    pub transactions: u32,
    pub week: WeekKey,
    #[serde(default = "default_trade_schema_version")]
    pub schema_version: u8,
}

impl PlayerWeeklyStats {
    pub fn new(player: impl Into<String>, week: WeekKey) -> Self {
        Self {
            player: player.into(),
            total_bought: 0,
            total_sold: 0,
            transactions: 0,
            week,
            schema_version: TRADE_SCHEMA_VERSION,
        }
    }

    pub fn record(&mut self, amount: Money, side: TradeSide) {
        match side {
            TradeSide::Buy => self.total_bought += amount,
            TradeSide::Sell => self.total_sold += amount,
        }
        self.transactions += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_key_parse_and_display() {
        let key = ItemKey::parse("diamond_sword:0").unwrap();
        assert_eq!(key.material, "DIAMOND_SWORD");
        assert_eq!(key.variant, 0);
        assert_eq!(key.to_string(), "DIAMOND_SWORD:0");

        let bare = ItemKey::parse("wool").unwrap();
        assert_eq!(bare, ItemKey::new("WOOL", 0));

        assert!(ItemKey::parse("").is_none());
        assert!(ItemKey::parse("wool:notanumber").is_none());
    }

    #[test]
    fn money_conversion_and_formatting() {
        assert_eq!(money_from_units(100.0), 10_000);
        assert_eq!(money_from_units(0.015), 2); // rounds to nearest
        assert_eq!(format_money(12_34, "$"), "$12.34");
        assert_eq!(format_money(-500, "$"), "$-5.00");
        assert_eq!(format_money(5, ""), "0.05");
    }

    fn sword() -> ShopItem {
        ShopItem {
            key: ItemKey::new("DIAMOND_SWORD", 0),
            display_name: "Diamond Sword".to_string(),
            buy_price: Some(10_000),
            sell_price: Some(5_000),
            permission: None,
            lore: Vec::new(),
            stack_size: 1,
        }
    }

    #[test]
    fn slots_needed_respects_stack_size() {
        let mut item = sword();
        assert_eq!(item.slots_needed(3), 3); // unstackable

        item.stack_size = 64;
        assert_eq!(item.slots_needed(1), 1);
        assert_eq!(item.slots_needed(64), 1);
        assert_eq!(item.slots_needed(65), 2);
        assert_eq!(item.slots_needed(0), 0);
    }

    #[test]
    fn transaction_total_and_success_flag() {
        let mut tx = Transaction::new(
            "alice",
            ItemKey::new("DIAMOND", 0),
            3,
            2_50,
            TradeSide::Buy,
        );
        assert_eq!(tx.total(), 7_50);
        assert!(!tx.successful);
        tx.mark_successful();
        assert!(tx.successful);
        assert_eq!(tx.schema_version, TRADE_SCHEMA_VERSION);
    }

    #[test]
    fn week_key_uses_iso_year_not_calendar_year() {
        use chrono::TimeZone;
        // 2026-01-01 falls in ISO week 1 of 2026, but 2027-01-01 falls in
        // ISO week 53 of 2026.
        let jan1 = Utc.with_ymd_and_hms(2027, 1, 1, 12, 0, 0).unwrap();
        let key = WeekKey::for_timestamp(jan1);
        assert_eq!(key.iso_year, 2026);
        assert_eq!(key.iso_week, 53);
        assert_eq!(key.to_string(), "2026-W53");
    }

    #[test]
    fn weekly_stats_accumulate_per_side() {
        let mut stats = PlayerWeeklyStats::new("alice", WeekKey::current());
        stats.record(10_000, TradeSide::Buy);
        stats.record(2_500, TradeSide::Sell);
        stats.record(5_000, TradeSide::Buy);
        assert_eq!(stats.total_bought, 15_000);
        assert_eq!(stats.total_sold, 2_500);
        assert_eq!(stats.transactions, 3);
    }
}
