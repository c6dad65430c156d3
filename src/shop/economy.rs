//! Account service boundary and the short-TTL balance cache.
//!
//! The engine never owns money; it talks to an [`AccountService`] the
//! embedding game provides. The cache in front of it exists so price checks
//! and menu rendering do not hit the ledger on every call. It is an
//! optimization only: the final debit decision always goes to the service,
//! which re-checks the balance itself.

use chrono::{DateTime, Duration, Utc};
use log::debug;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::shop::errors::AccountError;
use crate::shop::types::Money;

/// The external money ledger. Implementations may block briefly or fail;
/// callers never assume atomicity across two calls. A timeout inside an
/// implementation must surface as an error, never as a silent success.
pub trait AccountService: Send + Sync {
    fn balance(&self, player: &str) -> Result<Money, AccountError>;

    fn has(&self, player: &str, amount: Money) -> Result<bool, AccountError> {
        Ok(self.balance(player)? >= amount)
    }

    /// Debit `amount`, re-validating the balance at the moment of withdrawal.
    fn withdraw(&self, player: &str, amount: Money) -> Result<(), AccountError>;

    fn deposit(&self, player: &str, amount: Money) -> Result<(), AccountError>;
}

/// In-process ledger used by tests and the demo binary.
#[derive(Default)]
pub struct MemoryBank {
    balances: RwLock<HashMap<String, Money>>,
}

impl MemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(player: &str, amount: Money) -> Self {
        let bank = Self::new();
        bank.set_balance(player, amount);
        bank
    }

    pub fn set_balance(&self, player: &str, amount: Money) {
        let mut balances = self.balances.write().unwrap_or_else(|p| p.into_inner());
        balances.insert(player.to_string(), amount);
    }
}

impl AccountService for MemoryBank {
    fn balance(&self, player: &str) -> Result<Money, AccountError> {
        let balances = self.balances.read().unwrap_or_else(|p| p.into_inner());
        Ok(balances.get(player).copied().unwrap_or(0))
    }

    fn withdraw(&self, player: &str, amount: Money) -> Result<(), AccountError> {
        let mut balances = self.balances.write().unwrap_or_else(|p| p.into_inner());
        let balance = balances.entry(player.to_string()).or_insert(0);
        if *balance < amount {
            return Err(AccountError::InsufficientFunds {
                needed: amount,
                balance: *balance,
            });
        }
        *balance -= amount;
        Ok(())
    }

    fn deposit(&self, player: &str, amount: Money) -> Result<(), AccountError> {
        let mut balances = self.balances.write().unwrap_or_else(|p| p.into_inner());
        *balances.entry(player.to_string()).or_insert(0) += amount;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    balance: Money,
    fetched_at: DateTime<Utc>,
}

/// Read-through cache over [`AccountService::balance`] with a short TTL.
/// Entries are never trusted past the TTL and are invalidated after every
/// debit or credit the engine performs.
pub struct BalanceCache {
    ttl_secs: i64,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl BalanceCache {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            ttl_secs,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cached balance if fresh, otherwise fetched from the service and
    /// cached. The lock is released before the service call.
    pub fn get(&self, player: &str, accounts: &dyn AccountService) -> Result<Money, AccountError> {
        let now = Utc::now();
        {
            let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
            if let Some(entry) = entries.get(player) {
                if now.signed_duration_since(entry.fetched_at)
                    < Duration::seconds(self.ttl_secs)
                {
                    return Ok(entry.balance);
                }
            }
        }

        let balance = accounts.balance(player)?;
        debug!("balance cache refresh for {}: {}", player, balance);
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        entries.insert(
            player.to_string(),
            CacheEntry {
                balance,
                fetched_at: now,
            },
        );
        Ok(balance)
    }

    /// Forget a player's cached balance (called after debits and credits).
    pub fn invalidate(&self, player: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        entries.remove(player);
    }

    /// Drop all expired entries; run periodically to bound memory.
    pub fn cleanup(&self) -> usize {
        let cutoff = Utc::now() - Duration::seconds(self.ttl_secs);
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| entry.fetched_at > cutoff);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
