//! Shop catalog: categories, items, and the lookup index.
//!
//! The catalog is loaded wholesale from a TOML file and is immutable
//! afterwards. Reload builds a complete replacement and swaps it behind an
//! `Arc`, so concurrent readers never observe a half-built catalog. Malformed
//! categories or items are skipped with a warning; a catalog with no usable
//! categories fails the load and leaves the previous one active.

use log::{info, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::shop::errors::CatalogError;
use crate::shop::types::{money_from_units, ItemKey, ShopCategory, ShopItem};

/// Raw catalog file shape. Prices are given in major currency units; missing
/// or negative prices mean "not purchasable"/"not sellable".
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    categories: Vec<CategoryDef>,
}

#[derive(Debug, Deserialize)]
struct CategoryDef {
    name: Option<String>,
    #[serde(default = "default_icon")]
    icon: String,
    #[serde(default)]
    permission: Option<String>,
    #[serde(default)]
    items: Vec<ItemDef>,
}

#[derive(Debug, Deserialize)]
struct ItemDef {
    material: Option<String>,
    #[serde(default)]
    variant: u8,
    name: Option<String>,
    #[serde(default)]
    buy_price: Option<f64>,
    #[serde(default)]
    sell_price: Option<f64>,
    #[serde(default)]
    permission: Option<String>,
    #[serde(default)]
    lore: Vec<String>,
    #[serde(default = "default_stack_size")]
    stack_size: u32,
}

fn default_icon() -> String {
    "CHEST".to_string()
}

fn default_stack_size() -> u32 {
    64
}

/// Normalize a name for index lookup: case-folded, interior whitespace
/// collapsed to single underscores.
fn normalize_name(name: &str) -> String {
    name.trim()
        .to_ascii_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Legacy numeric identifiers still accepted by older front-ends. Checked
/// only after name and identity lookup both miss.
fn legacy_material(id: u32) -> Option<&'static str> {
    match id {
        264 => Some("DIAMOND"),
        265 => Some("IRON_INGOT"),
        266 => Some("GOLD_INGOT"),
        276 => Some("DIAMOND_SWORD"),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
struct ItemRef {
    category: usize,
    item: usize,
}

/// The full set of categories and items currently purchasable. Immutable;
/// rebuilt from scratch on every (re)load.
#[derive(Debug)]
pub struct Catalog {
    categories: Vec<ShopCategory>,
    /// Normalized display name and `MATERIAL:variant` identity → item.
    index: HashMap<String, ItemRef>,
}

impl Catalog {
    /// Build a catalog from already-validated categories, deriving the
    /// lookup index. Duplicate names collide last-write-wins with a warning.
    pub fn new(categories: Vec<ShopCategory>) -> Self {
        let mut index = HashMap::new();
        for (ci, category) in categories.iter().enumerate() {
            for (ii, item) in category.items.iter().enumerate() {
                let at = ItemRef { category: ci, item: ii };
                let by_name = normalize_name(&item.display_name);
                if index.insert(by_name, at).is_some() {
                    warn!(
                        "duplicate item name '{}' in category '{}', keeping the later entry",
                        item.display_name, category.name
                    );
                }
                index.insert(item.key.to_string().to_ascii_lowercase(), at);
            }
        }
        Self { categories, index }
    }

    /// Parse and validate a TOML catalog document.
    pub fn from_toml(text: &str) -> Result<Self, CatalogError> {
        let raw: CatalogFile = toml::from_str(text)?;
        if raw.categories.is_empty() {
            return Err(CatalogError::NoCategories);
        }

        let mut categories = Vec::new();
        for def in raw.categories {
            let Some(name) = def.name.filter(|n| !n.trim().is_empty()) else {
                warn!("skipping category with no name");
                continue;
            };
            let mut items = Vec::new();
            for item in def.items {
                match build_item(item, &name) {
                    Some(item) => items.push(item),
                    None => continue,
                }
            }
            if items.is_empty() {
                warn!("category '{}' has no usable items", name);
            }
            categories.push(ShopCategory {
                name,
                icon: def.icon.to_ascii_uppercase(),
                permission: def.permission.filter(|p| !p.is_empty()),
                items,
            });
        }

        if categories.is_empty() {
            return Err(CatalogError::NoCategories);
        }
        Ok(Self::new(categories))
    }

    /// Load a catalog from a file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Categories in display order.
    pub fn categories(&self) -> &[ShopCategory] {
        &self.categories
    }

    pub fn category(&self, name: &str) -> Option<&ShopCategory> {
        let wanted = normalize_name(name);
        self.categories
            .iter()
            .find(|c| normalize_name(&c.name) == wanted)
    }

    /// Case-insensitive exact lookup by display name or `MATERIAL:variant`
    /// identity, with a legacy numeric-id fallback.
    pub fn find_by_name(&self, name: &str) -> Option<&ShopItem> {
        let normalized = normalize_name(name);
        if let Some(at) = self.index.get(&normalized) {
            return self.resolve(*at);
        }

        // Compatibility fallback for legacy numeric identifiers.
        if let Ok(id) = normalized.parse::<u32>() {
            let material = legacy_material(id)?;
            let key = ItemKey::new(material, 0).to_string().to_ascii_lowercase();
            return self.index.get(&key).and_then(|at| self.resolve(*at));
        }
        None
    }

    /// Lookup by exact identity.
    pub fn find_by_key(&self, key: &ItemKey) -> Option<&ShopItem> {
        self.index
            .get(&key.to_string().to_ascii_lowercase())
            .and_then(|at| self.resolve(*at))
    }

    pub fn item_count(&self) -> usize {
        self.categories.iter().map(|c| c.items.len()).sum()
    }

    fn resolve(&self, at: ItemRef) -> Option<&ShopItem> {
        self.categories.get(at.category)?.items.get(at.item)
    }
}

fn build_item(def: ItemDef, category: &str) -> Option<ShopItem> {
    let Some(material) = def.material.filter(|m| !m.trim().is_empty()) else {
        warn!("skipping item with no material in category '{}'", category);
        return None;
    };
    let key = ItemKey::new(material.trim(), def.variant);
    let display_name = def
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| key.material.clone());

    let price = |p: Option<f64>| p.filter(|v| *v >= 0.0).map(money_from_units);
    let buy_price = price(def.buy_price);
    let sell_price = price(def.sell_price);
    if buy_price.is_none() && sell_price.is_none() {
        warn!(
            "item '{}' in category '{}' has neither a buy nor a sell price, skipping",
            display_name, category
        );
        return None;
    }

    Some(ShopItem {
        key,
        display_name,
        buy_price,
        sell_price,
        permission: def.permission.filter(|p| !p.is_empty()),
        lore: def.lore,
        stack_size: def.stack_size.max(1),
    })
}

/// Shared handle over the active catalog. Readers take a cheap `Arc` clone;
/// reload builds the replacement outside the lock and swaps the pointer.
pub struct CatalogHandle {
    path: PathBuf,
    current: RwLock<Arc<Catalog>>,
}

impl CatalogHandle {
    /// Load the catalog at `path` and wrap it in a handle for later reloads.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let path = path.into();
        let catalog = Catalog::load(&path)?;
        info!(
            "loaded {} categories, {} items from {}",
            catalog.categories().len(),
            catalog.item_count(),
            path.display()
        );
        Ok(Self {
            path,
            current: RwLock::new(Arc::new(catalog)),
        })
    }

    /// Wrap an already-built catalog (used by tests and embedders that load
    /// definitions from elsewhere).
    pub fn from_catalog(catalog: Catalog) -> Self {
        Self {
            path: PathBuf::new(),
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    /// Snapshot of the active catalog.
    pub fn current(&self) -> Arc<Catalog> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Reload from the original path. On failure the active catalog stays in
    /// place. Returns `(categories, items)` counts for operator feedback.
    pub fn reload(&self) -> Result<(usize, usize), CatalogError> {
        let catalog = Catalog::load(&self.path)?;
        let counts = (catalog.categories().len(), catalog.item_count());
        self.swap(catalog);
        info!("catalog reloaded: {} categories, {} items", counts.0, counts.1);
        Ok(counts)
    }

    /// Atomically replace the active catalog.
    pub fn swap(&self, catalog: Catalog) {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(catalog);
    }
}
