//! Inventory service boundary and a slot-accurate in-memory implementation.
//!
//! Items are matched by identity (`ItemKey`), never by display name, so a
//! renamed item cannot spoof a catalog entry. Capacity is counted in slots:
//! stackable items occupy `ceil(quantity / stack_size)` slots, unstackable
//! items one slot each.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::shop::errors::InventoryError;
use crate::shop::types::{ItemKey, ShopItem};

/// The player-local inventory the engine mutates. Synchronous from the
/// engine's perspective; `grant`/`remove` are fallible and each reversible
/// by its counterpart (the engine's compensation path relies on this).
pub trait InventoryService: Send + Sync {
    /// Number of completely empty slots.
    fn free_slots(&self, player: &str) -> Result<u32, InventoryError>;

    /// How many items matching this identity the player holds.
    fn held(&self, player: &str, item: &ShopItem) -> Result<u32, InventoryError>;

    /// Add `quantity` of the item, splitting into stacks as needed.
    fn grant(&self, player: &str, item: &ShopItem, quantity: u32) -> Result<(), InventoryError>;

    /// Remove `quantity` matching items.
    fn remove(&self, player: &str, item: &ShopItem, quantity: u32) -> Result<(), InventoryError>;
}

#[derive(Debug, Clone)]
struct Stack {
    key: ItemKey,
    count: u32,
    max: u32,
}

#[derive(Debug)]
struct PlayerSlots {
    capacity: u32,
    stacks: Vec<Stack>,
}

impl PlayerSlots {
    fn new(capacity: u32) -> Self {
        Self {
            capacity,
            stacks: Vec::new(),
        }
    }

    fn free(&self) -> u32 {
        self.capacity.saturating_sub(self.stacks.len() as u32)
    }

    fn held(&self, key: &ItemKey) -> u32 {
        self.stacks
            .iter()
            .filter(|s| &s.key == key)
            .map(|s| s.count)
            .sum()
    }
}

/// Default slot count, matching a standard player inventory.
pub const DEFAULT_CAPACITY: u32 = 36;

/// In-process inventory used by tests and the demo binary. Mimics stack
/// filling: grants top up existing partial stacks before opening new slots.
pub struct MemoryInventory {
    capacity: u32,
    players: RwLock<HashMap<String, PlayerSlots>>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            capacity,
            players: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryInventory {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryService for MemoryInventory {
    fn free_slots(&self, player: &str) -> Result<u32, InventoryError> {
        let players = self.players.read().unwrap_or_else(|p| p.into_inner());
        Ok(players
            .get(player)
            .map(|slots| slots.free())
            .unwrap_or(self.capacity))
    }

    fn held(&self, player: &str, item: &ShopItem) -> Result<u32, InventoryError> {
        let players = self.players.read().unwrap_or_else(|p| p.into_inner());
        Ok(players
            .get(player)
            .map(|slots| slots.held(&item.key))
            .unwrap_or(0))
    }

    fn grant(&self, player: &str, item: &ShopItem, quantity: u32) -> Result<(), InventoryError> {
        let mut players = self.players.write().unwrap_or_else(|p| p.into_inner());
        let slots = players
            .entry(player.to_string())
            .or_insert_with(|| PlayerSlots::new(self.capacity));

        let max = item.stack_size.max(1);
        let mut remaining = quantity;

        // Room check before mutating anything.
        let partial_room: u32 = slots
            .stacks
            .iter()
            .filter(|s| s.key == item.key && s.max == max)
            .map(|s| max - s.count)
            .sum();
        let overflow = remaining.saturating_sub(partial_room);
        let new_slots = overflow.div_ceil(max);
        if new_slots > slots.free() {
            return Err(InventoryError::NoSpace);
        }

        for stack in slots
            .stacks
            .iter_mut()
            .filter(|s| s.key == item.key && s.max == max)
        {
            let take = remaining.min(stack.max - stack.count);
            stack.count += take;
            remaining -= take;
            if remaining == 0 {
                break;
            }
        }
        while remaining > 0 {
            let take = remaining.min(max);
            slots.stacks.push(Stack {
                key: item.key.clone(),
                count: take,
                max,
            });
            remaining -= take;
        }
        Ok(())
    }

    fn remove(&self, player: &str, item: &ShopItem, quantity: u32) -> Result<(), InventoryError> {
        let mut players = self.players.write().unwrap_or_else(|p| p.into_inner());
        let slots = players
            .entry(player.to_string())
            .or_insert_with(|| PlayerSlots::new(self.capacity));

        let held = slots.held(&item.key);
        if held < quantity {
            return Err(InventoryError::NotEnough {
                needed: quantity,
                held,
            });
        }

        let mut remaining = quantity;
        for stack in slots.stacks.iter_mut().filter(|s| s.key == item.key) {
            let take = remaining.min(stack.count);
            stack.count -= take;
            remaining -= take;
            if remaining == 0 {
                break;
            }
        }
        slots.stacks.retain(|s| s.count > 0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stackable() -> ShopItem {
        ShopItem {
            key: ItemKey::new("DIAMOND", 0),
            display_name: "Diamond".to_string(),
            buy_price: Some(2_500),
            sell_price: Some(2_000),
            permission: None,
            lore: Vec::new(),
            stack_size: 64,
        }
    }

    fn unstackable() -> ShopItem {
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
    fn grant_fills_partial_stacks_before_new_slots() {
        let inv = MemoryInventory::with_capacity(4);
        let item = stackable();

        inv.grant("alice", &item, 60).unwrap();
        assert_eq!(inv.free_slots("alice").unwrap(), 3);

        // 60 + 10 = 70 -> one full stack of 64 plus a stack of 6.
        inv.grant("alice", &item, 10).unwrap();
        assert_eq!(inv.held("alice", &item).unwrap(), 70);
        assert_eq!(inv.free_slots("alice").unwrap(), 2);
    }

    #[test]
    fn grant_rejects_when_slots_run_out() {
        let inv = MemoryInventory::with_capacity(2);
        let sword = unstackable();

        inv.grant("alice", &sword, 2).unwrap();
        let err = inv.grant("alice", &sword, 1).unwrap_err();
        assert_eq!(err, InventoryError::NoSpace);
        // Failed grant mutated nothing.
        assert_eq!(inv.held("alice", &sword).unwrap(), 2);
    }

    #[test]
    fn remove_requires_matching_identity() {
        let inv = MemoryInventory::new();
        let diamond = stackable();
        let sword = unstackable();

        inv.grant("alice", &diamond, 10).unwrap();
        let err = inv.remove("alice", &sword, 1).unwrap_err();
        assert_eq!(err, InventoryError::NotEnough { needed: 1, held: 0 });

        inv.remove("alice", &diamond, 4).unwrap();
        assert_eq!(inv.held("alice", &diamond).unwrap(), 6);
    }

    #[test]
    fn remove_collapses_emptied_stacks() {
        let inv = MemoryInventory::with_capacity(3);
        let sword = unstackable();

        inv.grant("alice", &sword, 3).unwrap();
        assert_eq!(inv.free_slots("alice").unwrap(), 0);

        inv.remove("alice", &sword, 2).unwrap();
        assert_eq!(inv.free_slots("alice").unwrap(), 2);
        assert_eq!(inv.held("alice", &sword).unwrap(), 1);
    }
}
