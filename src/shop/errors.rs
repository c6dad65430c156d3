//! Error taxonomy for the storefront engine.
//!
//! Rejections are structured values with a reason code, never panics or
//! exceptions-as-control-flow. Each variant renders a distinct user-facing
//! message carrying the numbers the player needs (shortfall, required
//! quantity, seconds remaining).

use thiserror::Error;

use crate::shop::types::{format_money, Money};

/// Why a buy/sell request was rejected. Terminal for the request; no state
/// was mutated unless the variant says otherwise (`External` after
/// compensation has already run).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectReason {
    /// Quantity was zero, negative, or above the per-transaction maximum.
    #[error("quantity must be between 1 and {max}")]
    BadQuantity { max: u32 },

    /// No catalog item matched the request.
    #[error("item not found: {name}")]
    UnknownItem { name: String },

    /// The item has no buy price.
    #[error("{name} cannot be bought")]
    NotBuyable { name: String },

    /// The item has no sell price.
    #[error("{name} cannot be sold")]
    NotSellable { name: String },

    /// Missing the global side permission or the item's own tag.
    #[error("you do not have permission for this ({tag})")]
    NoPermission { tag: String },

    /// Balance does not cover the total; `missing` is the shortfall.
    #[error("insufficient funds: need {} more", format_money(*.missing, ""))]
    InsufficientFunds { needed: Money, missing: Money },

    /// Player holds fewer matching items than requested.
    #[error("not enough items: need {needed}, have {held}")]
    InsufficientItems { needed: u32, held: u32 },

    /// Not enough free inventory capacity for the resulting stacks.
    #[error("inventory full: {slots_needed} free slot(s) required")]
    InventoryFull { slots_needed: u32 },

    /// Rate limit or cooldown; retry after the given number of seconds.
    #[error("too many transactions, wait {retry_after_secs}s")]
    Throttled { retry_after_secs: i64 },

    /// A pre-transaction observer vetoed the request.
    #[error("transaction blocked: {reason}")]
    Vetoed { reason: String },

    /// An external service (ledger, inventory) failed. Any partial mutation
    /// has already been compensated, or the double failure was logged.
    #[error("transaction failed, please contact an administrator")]
    External,
}

impl RejectReason {
    /// Throttle rejections are transient; everything else needs the player
    /// to change something before retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, RejectReason::Throttled { .. } | RejectReason::External)
    }
}

/// Catalog loading failures. Fatal to the reload operation only; the
/// previously active catalog stays in place.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalog file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The `categories` section is missing or empty. Individual malformed
    /// entries are skipped with a warning, but an empty shop is a load error.
    #[error("catalog defines no categories")]
    NoCategories,
}

/// Failures from the external account service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AccountError {
    #[error("insufficient funds: balance {balance}, needed {needed}")]
    InsufficientFunds { needed: Money, balance: Money },

    #[error("account service unavailable: {0}")]
    Unavailable(String),

    #[error("account operation rejected: {0}")]
    Rejected(String),
}

/// Failures from the external inventory service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InventoryError {
    #[error("not enough free inventory space")]
    NoSpace,

    #[error("not enough matching items: have {held}, needed {needed}")]
    NotEnough { needed: u32, held: u32 },

    #[error("inventory service unavailable: {0}")]
    Unavailable(String),
}

/// Failures from the durable trade log. Always tolerated by the engine:
/// appends are best-effort and never roll back a completed trade.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("store error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_messages_are_distinct_and_parameterized() {
        let funds = RejectReason::InsufficientFunds {
            needed: 15_000,
            missing: 2_50,
        };
        assert_eq!(funds.to_string(), "insufficient funds: need 2.50 more");

        let items = RejectReason::InsufficientItems { needed: 10, held: 3 };
        assert_eq!(items.to_string(), "not enough items: need 10, have 3");

        let throttle = RejectReason::Throttled { retry_after_secs: 2 };
        assert!(throttle.to_string().contains("2s"));
        assert!(throttle.is_transient());
        assert!(!items.is_transient());
    }
}
