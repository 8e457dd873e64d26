//! Per-character engine facade
//!
//! [`InventoryEngine`] bundles one character's [`Inventory`] with the shared
//! catalog, the shared instance id allocator and the character's
//! collaborators. Single-leg planning and application live here; compound
//! operations are in `transfer`.

use crate::catalog::ItemCatalog;
use crate::config::InventoryConfig;
use crate::container::{Coordinate, StoreMode};
use crate::equipment::Capabilities;
use crate::error::{InventoryError, InventoryResult};
use crate::events::{Collaborators, InventoryEvent};
use crate::executor::{AllocationExecutor, Applied, Removal, StoreSource};
use crate::inventory::Inventory;
use crate::item::{InstanceId, InstanceIdAllocator, ItemInstance, ItemType, ItemTypeId, OwnerId};
use crate::planner::{EquipPlan, EquipRequest, PlacementPlanner, Probe, StorePlan, StoreRequest};
use std::sync::Arc;

/// What a completed operation did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Receipt {
    /// Coordinates that received units, with the units received
    pub destinations: Vec<(Coordinate, u32)>,
    /// Units refused by ownership caps
    pub unplaceable: u32,
    pub events: Vec<InventoryEvent>,
}

impl Receipt {
    pub(crate) fn from_plan(plan: &StorePlan, applied: Applied) -> Self {
        Self {
            destinations: plan.destinations(),
            unplaceable: plan.unplaceable,
            events: applied.events,
        }
    }

    pub(crate) fn from_events(applied: Applied) -> Self {
        Self {
            events: applied.events,
            ..Default::default()
        }
    }
}

/// Allocation engine for one character
pub struct InventoryEngine {
    pub(crate) inventory: Inventory,
    pub(crate) catalog: Arc<dyn ItemCatalog>,
    pub(crate) allocator: Arc<InstanceIdAllocator>,
    pub(crate) collaborators: Collaborators,
}

impl InventoryEngine {
    pub fn new(inventory: Inventory, catalog: Arc<dyn ItemCatalog>, allocator: Arc<InstanceIdAllocator>) -> Self {
        Self {
            inventory,
            catalog,
            allocator,
            collaborators: Collaborators::default(),
        }
    }

    /// Create an engine with an empty inventory laid out by `config`
    pub fn from_config(
        owner: OwnerId,
        config: &InventoryConfig,
        catalog: Arc<dyn ItemCatalog>,
        allocator: Arc<InstanceIdAllocator>,
    ) -> Self {
        Self::new(Inventory::new(owner, config.layout), catalog, allocator)
    }

    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = collaborators;
        self
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn catalog(&self) -> &dyn ItemCatalog {
        self.catalog.as_ref()
    }

    pub fn allocator(&self) -> &Arc<InstanceIdAllocator> {
        &self.allocator
    }

    pub fn collaborators_mut(&mut self) -> &mut Collaborators {
        &mut self.collaborators
    }

    /// Update level, dual wield or titan grip
    pub fn set_capabilities(&mut self, capabilities: Capabilities) {
        self.inventory.set_capabilities(capabilities);
    }

    /// Reset persistence flags after the storage layer saved
    pub fn mark_persisted(&mut self) {
        self.inventory.mark_persisted();
    }

    /// Hand the inventory back, e.g. on logout
    pub fn into_inventory(self) -> Inventory {
        self.inventory
    }

    pub fn planner(&self) -> PlacementPlanner<'_> {
        PlacementPlanner::new(&self.inventory, self.catalog.as_ref())
    }

    pub(crate) fn executor(&mut self) -> AllocationExecutor<'_> {
        AllocationExecutor::new(
            &mut self.inventory,
            self.catalog.as_ref(),
            self.allocator.as_ref(),
            &mut self.collaborators,
        )
    }

    pub(crate) fn item_type(&self, id: ItemTypeId) -> InventoryResult<Arc<ItemType>> {
        self.catalog.item_type(id).ok_or(InventoryError::UnknownItemType(id))
    }

    pub(crate) fn instance(&self, id: InstanceId) -> InventoryResult<&ItemInstance> {
        self.inventory.get(id).ok_or(InventoryError::UnknownInstance(id))
    }

    /// Occupant of a coordinate, cloned
    pub(crate) fn occupant_at(&self, coordinate: &Coordinate) -> InventoryResult<ItemInstance> {
        if !self.inventory.contains_coordinate(coordinate) {
            return Err(InventoryError::InvalidCoordinate { coordinate: *coordinate });
        }
        self.inventory
            .item_at(coordinate)
            .cloned()
            .ok_or(InventoryError::EmptySlot { coordinate: *coordinate })
    }

    pub(crate) fn mode_for(&self, coordinate: &Coordinate) -> StoreMode {
        StoreMode::for_coordinate(coordinate, self.inventory.domain(coordinate))
    }

    /// Plan a store without mutating anything
    pub fn plan_store(&self, request: &StoreRequest) -> InventoryResult<StorePlan> {
        self.planner().plan_store(request, &Probe::new())
    }

    /// Plan an equip without mutating anything
    pub fn plan_equip(&self, request: &EquipRequest) -> InventoryResult<EquipPlan> {
        self.planner().plan_equip(request, &Probe::new())
    }

    /// Apply a store plan produced by [`plan_store`](Self::plan_store)
    pub fn apply_store(&mut self, plan: &StorePlan, source: StoreSource) -> InventoryResult<Receipt> {
        let applied = self.executor().apply_store(plan, source)?;
        Ok(Receipt::from_plan(plan, applied))
    }

    /// Apply an equip plan produced by [`plan_equip`](Self::plan_equip)
    pub fn apply_equip(&mut self, plan: &EquipPlan) -> InventoryResult<Receipt> {
        let applied = self.executor().apply_equip(plan)?;
        Ok(Receipt::from_events(applied))
    }

    /// Take the item at `coordinate` out, destroying or releasing it
    pub fn apply_remove(&mut self, coordinate: &Coordinate, removal: Removal) -> InventoryResult<Applied> {
        self.executor().apply_remove(coordinate, removal)
    }
}

impl std::fmt::Debug for InventoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryEngine")
            .field("owner", &self.inventory.owner())
            .field("items", &self.inventory.len())
            .field("collaborators", &self.collaborators)
            .finish()
    }
}
