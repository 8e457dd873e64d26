//! Persistence rows and incremental save support
//!
//! The engine does not write anything itself. It tags instances with a
//! [`PersistenceState`] so the storage layer can save only what changed, and
//! rebuilds an [`Inventory`] from stored rows on login.

use crate::catalog::ItemCatalog;
use crate::container::{Container, Coordinate, Domain, SlotLayout};
use crate::error::{InventoryError, InventoryResult};
use crate::inventory::Inventory;
use crate::item::{InstanceId, InstanceIdAllocator, ItemInstance, ItemTypeId, OwnerId, PersistenceState};
use serde::{Deserialize, Serialize};

/// One stored item row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub instance_id: InstanceId,
    pub type_id: ItemTypeId,
    pub count: u32,
    /// 0 = player slot space, otherwise the containing bag's instance id
    pub container_id: u64,
    pub slot_index: u16,
    pub bound_to: Option<OwnerId>,
    pub persistence: PersistenceState,
}

impl ItemRecord {
    /// Build the row for a placed instance
    pub fn from_instance(instance: &ItemInstance, layout: &SlotLayout) -> Option<Self> {
        let coordinate = instance.coordinate?;
        Some(Self {
            instance_id: instance.id,
            type_id: instance.item_type,
            count: instance.count,
            container_id: coordinate.container.persisted_id(),
            slot_index: layout.flat_index(&coordinate)?,
            bound_to: instance.bound_to,
            persistence: instance.persistence,
        })
    }

    /// Row for an instance whose stored copy must be deleted
    pub fn destroyed(instance: &ItemInstance) -> Self {
        Self {
            instance_id: instance.id,
            type_id: instance.item_type,
            count: instance.count,
            container_id: 0,
            slot_index: 0,
            bound_to: instance.bound_to,
            persistence: PersistenceState::Destroyed,
        }
    }
}

impl Inventory {
    /// Rows that differ from storage: new and moved instances, then deletions
    pub fn pending_records(&self) -> Vec<ItemRecord> {
        let mut rows: Vec<ItemRecord> = self
            .items()
            .filter(|inst| inst.persistence != PersistenceState::Unmodified)
            .filter_map(|inst| ItemRecord::from_instance(inst, self.layout()))
            .collect();
        rows.extend(self.destroyed_records().iter().cloned());
        rows
    }

    /// Called by the storage layer after a successful write-back
    pub fn mark_persisted(&mut self) {
        let ids: Vec<InstanceId> = self.items().map(|i| i.id).collect();
        for id in ids {
            if let Some(inst) = self.get_mut(id) {
                inst.persistence = PersistenceState::Unmodified;
            }
        }
        self.clear_destroyed();
    }

    /// Rebuild a character inventory from stored rows.
    ///
    /// Bags are placed before their contents regardless of row order; a row
    /// pointing at a missing bag, an out-of-range slot, an occupied slot or an
    /// instance id already restored is rejected.
    pub fn restore(
        owner: OwnerId,
        layout: SlotLayout,
        records: &[ItemRecord],
        catalog: &dyn ItemCatalog,
        allocator: &InstanceIdAllocator,
    ) -> InventoryResult<Self> {
        let mut inventory = Inventory::new(owner, layout);
        let (top, nested): (Vec<&ItemRecord>, Vec<&ItemRecord>) =
            records.iter().partition(|r| r.container_id == 0);

        for record in top.into_iter().chain(nested) {
            if inventory.get(record.instance_id).is_some() {
                return Err(InventoryError::DuplicateInstance(record.instance_id));
            }
            let item_type = catalog
                .item_type(record.type_id)
                .ok_or(InventoryError::UnknownItemType(record.type_id))?;
            let coordinate = layout
                .locate(record.container_id, record.slot_index)
                .ok_or(InventoryError::InvalidCoordinate {
                    coordinate: Coordinate::new(Container::MainPack, record.slot_index),
                })?;

            if !inventory.contains_coordinate(&coordinate)
                || inventory.domain(&coordinate) == Domain::Inactive
            {
                return Err(InventoryError::InvalidCoordinate { coordinate });
            }
            if inventory.occupant(&coordinate).is_some() {
                return Err(InventoryError::SlotOccupied { coordinate });
            }
            if record.count == 0 || record.count > item_type.stack_limit {
                return Err(InventoryError::InvalidQuantity {
                    requested: record.count,
                    available: item_type.stack_limit,
                });
            }

            let mut instance = ItemInstance::new(record.instance_id, record.type_id, record.count);
            instance.bound_to = record.bound_to;
            let container_slots = if item_type.is_container() { item_type.container_slots } else { 0 };
            inventory.adopt(instance, container_slots);
            inventory.attach(record.instance_id, coordinate);
            allocator.observe(record.instance_id);
        }

        inventory.mark_persisted();
        log::debug!("Restored {} items for {}", inventory.len(), owner);
        Ok(inventory)
    }
}
