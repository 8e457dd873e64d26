//! Void Inventory - Inventory and Equipment Allocation Engine
//!
//! This crate decides where items go and moves them there. It owns a
//! character's item instances, their containers and equipment slots, and
//! guarantees that every placement respects stack limits, ownership caps, bag
//! families and equip rules.
//!
//! # Features
//!
//! - Read-only placement planning with deterministic scan order
//! - All-or-nothing plan application with buffered validation
//! - Split, swap, move and equip-with-displacement as atomic operations
//! - Two-handed, dual wield, titan grip and quiver rules
//! - Owned and equipped limit categories, unique-equipped items and gems
//! - Buyback, cross-character transfer and incremental persistence records
//! - TOML item catalog and layout configuration
//!
//! # Example
//!
//! ```ignore
//! use void_inventory::prelude::*;
//! use std::sync::Arc;
//!
//! let catalog = StaticCatalog::new()
//!     .with_item(ItemType::new(2589, "Linen Cloth").with_stack_limit(20));
//!
//! let mut engine = InventoryEngine::new(
//!     Inventory::new(OwnerId(1), SlotLayout::default()),
//!     Arc::new(catalog),
//!     Arc::new(InstanceIdAllocator::new()),
//! );
//!
//! // 25 units spill over two pack slots
//! let receipt = engine.store_new(ItemTypeId(2589), 25, None, StoreMode::CarriedAndBags)?;
//! assert_eq!(receipt.destinations.len(), 2);
//! ```

pub mod catalog;
pub mod config;
pub mod container;
pub mod engine;
pub mod equipment;
pub mod error;
pub mod events;
pub mod executor;
pub mod inventory;
pub mod item;
pub mod persist;
pub mod planner;
pub mod transfer;

pub mod prelude {
    pub use crate::catalog::{ItemCatalog, LimitCategory, LimitMode, ReloadableCatalog, StaticCatalog};
    pub use crate::config::InventoryConfig;
    pub use crate::container::{Container, Coordinate, Domain, SlotLayout, StoreMode};
    pub use crate::engine::{InventoryEngine, Receipt};
    pub use crate::equipment::{Capabilities, EquipSlot};
    pub use crate::error::{ExecutorError, InventoryError, InventoryResult};
    pub use crate::events::{Collaborators, InventoryEvent, InventoryListener, QuestTracker, StatAndAuraSystem};
    pub use crate::executor::{Removal, StoreSource};
    pub use crate::inventory::Inventory;
    pub use crate::item::{
        BagFamily, BindingPolicy, InstanceId, InstanceIdAllocator, InventoryType, ItemInstance, ItemType, ItemTypeId,
        OwnerId, PersistenceState,
    };
    pub use crate::persist::ItemRecord;
    pub use crate::planner::{EquipPlan, EquipRequest, PlacementPlanner, Probe, StorePlan, StoreRequest};
}

pub use prelude::*;
