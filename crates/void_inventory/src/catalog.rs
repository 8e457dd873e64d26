//! Read-only item catalog
//!
//! The allocation engine never mutates item types; it looks them up through
//! [`ItemCatalog`]. [`StaticCatalog`] is the in-memory implementation and can
//! be parsed from TOML:
//!
//! ```toml
//! [[item]]
//! id = 6265
//! name = "Soul Shard"
//! stack_limit = 1
//! bag_family = 4
//!
//! [[item]]
//! id = 21340
//! name = "Soul Pouch"
//! inventory_type = "bag"
//! container_slots = 20
//! container_family = 4
//!
//! [[limit_category]]
//! id = 7
//! cap = 2
//! mode = "equipped"
//! ```

use crate::item::{ItemType, ItemTypeId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// What a limit category caps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitMode {
    /// Units owned anywhere (equipped, carried, bank)
    #[default]
    Owned,
    /// Items and gems simultaneously equipped
    Equipped,
}

/// A cap shared by every item type in the category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitCategory {
    pub id: u32,
    pub cap: u32,
    #[serde(default)]
    pub mode: LimitMode,
}

impl LimitCategory {
    pub fn new(id: u32, cap: u32, mode: LimitMode) -> Self {
        Self { id, cap, mode }
    }
}

/// Source of static item type data
pub trait ItemCatalog: Send + Sync {
    /// Look up an item type
    fn item_type(&self, id: ItemTypeId) -> Option<Arc<ItemType>>;

    /// Look up a limit category
    fn limit_category(&self, id: u32) -> Option<LimitCategory>;
}

/// Catalog loading errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Duplicate item type {0}")]
    DuplicateItem(ItemTypeId),

    #[error("Duplicate limit category {0}")]
    DuplicateCategory(u32),

    #[error("Invalid item type {id}: {reason}")]
    InvalidItem { id: ItemTypeId, reason: String },
}

#[derive(Debug, Deserialize)]
struct CatalogToml {
    #[serde(default)]
    item: Vec<ItemType>,
    #[serde(default)]
    limit_category: Vec<LimitCategory>,
}

/// In-memory catalog
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    items: HashMap<ItemTypeId, Arc<ItemType>>,
    categories: HashMap<u32, LimitCategory>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item type (replaces an existing one with the same id)
    pub fn with_item(mut self, item: ItemType) -> Self {
        self.insert(item);
        self
    }

    /// Add a limit category
    pub fn with_limit_category(mut self, category: LimitCategory) -> Self {
        self.categories.insert(category.id, category);
        self
    }

    /// Insert an item type
    pub fn insert(&mut self, item: ItemType) {
        self.items.insert(item.id, Arc::new(item));
    }

    /// Number of item types
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Parse a catalog from TOML
    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        let parsed: CatalogToml = toml::from_str(content)?;
        let mut catalog = Self::new();

        for item in parsed.item {
            validate_item(&item)?;
            if catalog.items.contains_key(&item.id) {
                return Err(CatalogError::DuplicateItem(item.id));
            }
            catalog.insert(item);
        }
        for category in parsed.limit_category {
            if catalog.categories.insert(category.id, category).is_some() {
                return Err(CatalogError::DuplicateCategory(category.id));
            }
        }

        log::debug!(
            "Loaded item catalog: {} types, {} limit categories",
            catalog.items.len(),
            catalog.categories.len()
        );
        Ok(catalog)
    }

    /// Load a catalog file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

fn validate_item(item: &ItemType) -> Result<(), CatalogError> {
    let invalid = |reason: &str| CatalogError::InvalidItem {
        id: item.id,
        reason: reason.to_string(),
    };

    if item.stack_limit == 0 {
        return Err(invalid("stack_limit must be at least 1"));
    }
    if item.inventory_type.is_container() && item.container_slots == 0 {
        return Err(invalid("bag without container_slots"));
    }
    if item.container_slots > 0 && !item.inventory_type.is_container() {
        return Err(invalid("container_slots on a non-bag type"));
    }
    if item.is_container() && item.is_stackable() {
        return Err(invalid("bags cannot stack"));
    }
    Ok(())
}

impl ItemCatalog for StaticCatalog {
    fn item_type(&self, id: ItemTypeId) -> Option<Arc<ItemType>> {
        self.items.get(&id).cloned()
    }

    fn limit_category(&self, id: u32) -> Option<LimitCategory> {
        self.categories.get(&id).copied()
    }
}

/// Catalog shared across characters that can be swapped at runtime
#[derive(Debug, Default)]
pub struct ReloadableCatalog {
    inner: RwLock<StaticCatalog>,
}

impl ReloadableCatalog {
    pub fn new(catalog: StaticCatalog) -> Self {
        Self {
            inner: RwLock::new(catalog),
        }
    }

    /// Replace the whole table
    pub fn replace(&self, catalog: StaticCatalog) {
        let count = catalog.len();
        *self.inner.write() = catalog;
        log::info!("Item catalog reloaded ({} types)", count);
    }

    /// Number of item types
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl ItemCatalog for ReloadableCatalog {
    fn item_type(&self, id: ItemTypeId) -> Option<Arc<ItemType>> {
        self.inner.read().item_type(id)
    }

    fn limit_category(&self, id: u32) -> Option<LimitCategory> {
        self.inner.read().limit_category(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{BagFamily, BindingPolicy, InventoryType};

    const SAMPLE: &str = r#"
        [[item]]
        id = 6265
        name = "Soul Shard"
        bag_family = 4

        [[item]]
        id = 21340
        name = "Soul Pouch"
        inventory_type = "bag"
        container_slots = 20
        container_family = 4

        [[item]]
        id = 2589
        name = "Linen Cloth"
        stack_limit = 20

        [[item]]
        id = 30000
        name = "Quest Relic"
        binding = "quest"
        max_owned_count = 1

        [[limit_category]]
        id = 7
        cap = 2
        mode = "equipped"
    "#;

    #[test]
    fn test_parse_toml() {
        let catalog = StaticCatalog::from_toml_str(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 4);

        let pouch = catalog.item_type(ItemTypeId(21340)).unwrap();
        assert!(pouch.is_container());
        assert_eq!(pouch.inventory_type, InventoryType::Bag);
        assert_eq!(pouch.container_family, BagFamily::SOUL_SHARDS);

        let cloth = catalog.item_type(ItemTypeId(2589)).unwrap();
        assert_eq!(cloth.stack_limit, 20);

        let relic = catalog.item_type(ItemTypeId(30000)).unwrap();
        assert_eq!(relic.binding, BindingPolicy::Quest);
        assert_eq!(relic.stack_limit, 1);

        let category = catalog.limit_category(7).unwrap();
        assert_eq!(category.cap, 2);
        assert_eq!(category.mode, LimitMode::Equipped);
    }

    #[test]
    fn test_rejects_duplicate_item() {
        let toml = r#"
            [[item]]
            id = 1
            [[item]]
            id = 1
        "#;
        assert!(matches!(
            StaticCatalog::from_toml_str(toml),
            Err(CatalogError::DuplicateItem(ItemTypeId(1)))
        ));
    }

    #[test]
    fn test_rejects_bag_without_slots() {
        let toml = r#"
            [[item]]
            id = 2
            inventory_type = "bag"
        "#;
        assert!(matches!(
            StaticCatalog::from_toml_str(toml),
            Err(CatalogError::InvalidItem { .. })
        ));
    }

    #[test]
    fn test_reload() {
        let shared = Arc::new(ReloadableCatalog::new(StaticCatalog::new()));
        assert!(shared.item_type(ItemTypeId(1)).is_none());

        shared.replace(StaticCatalog::new().with_item(ItemType::new(1, "Apple").with_stack_limit(20)));
        assert_eq!(shared.item_type(ItemTypeId(1)).unwrap().stack_limit, 20);
        assert_eq!(shared.len(), 1);
    }
}
