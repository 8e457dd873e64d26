//! Plan application
//!
//! Every mutation is buffered as a [`Batch`] of primitive ops, checked
//! against a shadow of the live inventory, and only then committed. A batch
//! that no longer matches live state is refused as a whole, so callers never
//! observe a half-applied plan.
//!
//! Detach ops run before everything else in a batch. This lets two instances
//! trade places without either slot being seen as double-occupied.

use crate::catalog::ItemCatalog;
use crate::container::{Container, Coordinate, Domain};
use crate::error::{ExecutorError, InventoryError, InventoryResult};
use crate::events::{Collaborators, InventoryEvent};
use crate::inventory::Inventory;
use crate::item::{InstanceId, InstanceIdAllocator, ItemInstance, ItemTypeId, OwnerId, PersistenceState};
use crate::persist::ItemRecord;
use crate::planner::{EquipPlan, SlotTarget, StorePlan};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Primitive mutation
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Clear an instance's slot, keeping it registered
    Detach { instance: InstanceId, from: Coordinate },
    /// Put a detached registered instance into an empty slot
    Attach { instance: InstanceId, to: Coordinate },
    /// Register an instance and place it
    Spawn { instance: ItemInstance, to: Coordinate },
    /// Add units to a stack
    Grow { instance: InstanceId, amount: u32 },
    /// Take units from a stack that stays in place
    Shrink { instance: InstanceId, amount: u32 },
    /// Drop a detached instance for good
    Destroy { instance: InstanceId },
    /// Hand a detached instance out of this inventory
    Release { instance: InstanceId },
    /// Delete a stored row for an instance that never entered this inventory
    Retire { record: ItemRecord },
    Bind { instance: InstanceId, owner: OwnerId },
    SetBroken { instance: InstanceId, broken: bool },
}

/// Ordered list of ops applied all-or-nothing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    ops: Vec<Op>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: Op) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Ops in commit order: detaches first, the rest as pushed
    fn ordered(&self) -> impl Iterator<Item = &Op> {
        let lifts = self.ops.iter().filter(|op| matches!(op, Op::Detach { .. }));
        let rest = self.ops.iter().filter(|op| !matches!(op, Op::Detach { .. }));
        lifts.chain(rest)
    }
}

/// Where the units of a store plan come from
#[derive(Debug, Clone, PartialEq)]
pub enum StoreSource {
    /// New units, created with the plan's binding and random property
    Fresh,
    /// An instance not registered in this inventory (trade, mail, buyback)
    Detached(ItemInstance),
    /// A placed instance of this inventory
    Existing(InstanceId),
}

/// Outcome of a committed batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Applied {
    pub events: Vec<InventoryEvent>,
    /// Instances handed out by `Release` ops
    pub released: Vec<ItemInstance>,
}

/// What happens to an instance taken out by `apply_remove`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Destroy,
    Release,
}

/// Applies plans to one inventory
pub struct AllocationExecutor<'a> {
    inventory: &'a mut Inventory,
    catalog: &'a dyn ItemCatalog,
    allocator: &'a InstanceIdAllocator,
    collaborators: &'a mut Collaborators,
}

impl<'a> AllocationExecutor<'a> {
    pub fn new(
        inventory: &'a mut Inventory,
        catalog: &'a dyn ItemCatalog,
        allocator: &'a InstanceIdAllocator,
        collaborators: &'a mut Collaborators,
    ) -> Self {
        Self {
            inventory,
            catalog,
            allocator,
            collaborators,
        }
    }

    pub fn inventory(&self) -> &Inventory {
        self.inventory
    }

    /// Apply a store plan
    pub fn apply_store(&mut self, plan: &StorePlan, source: StoreSource) -> InventoryResult<Applied> {
        let mut batch = Batch::new();
        self.stage_store(&mut batch, plan, source)?;
        self.commit(&batch)
    }

    /// Apply an equip plan, displacements included
    pub fn apply_equip(&mut self, plan: &EquipPlan) -> InventoryResult<Applied> {
        let mut batch = Batch::new();
        self.stage_equip(&mut batch, plan)?;
        self.commit(&batch)
    }

    /// Take the item at `coordinate` out of the inventory
    pub fn apply_remove(&mut self, coordinate: &Coordinate, removal: Removal) -> InventoryResult<Applied> {
        let mut batch = Batch::new();
        self.stage_remove(&mut batch, coordinate, removal)?;
        self.commit(&batch)
    }

    /// Append the ops realizing `plan` from `source`
    pub fn stage_store(&self, batch: &mut Batch, plan: &StorePlan, source: StoreSource) -> InventoryResult<()> {
        if let Some(occupant) = plan.displaced() {
            return Err(self.breach(ExecutorError::UnresolvedDisplacement { occupant }));
        }
        let planned = plan.planned();

        match source {
            StoreSource::Fresh => {
                for reservation in &plan.reservations {
                    match reservation.target {
                        SlotTarget::Merge(target) => batch.push(Op::Grow {
                            instance: target,
                            amount: reservation.count,
                        }),
                        _ => {
                            let mut instance = ItemInstance::new(self.allocator.next(), plan.item_type, reservation.count);
                            instance.bound_to = plan.bound_to;
                            instance.random_property = plan.random_property;
                            batch.push(Op::Spawn {
                                instance,
                                to: reservation.coordinate,
                            });
                        }
                    }
                }
            }
            StoreSource::Detached(instance) => {
                if planned != instance.count {
                    return Err(self.breach(ExecutorError::SourceMismatch {
                        planned,
                        available: instance.count,
                    }));
                }
                let Some((last, rest)) = plan.reservations.split_last() else {
                    return Ok(());
                };
                for reservation in rest {
                    self.stage_copy(batch, &instance, reservation.coordinate, reservation.count, reservation.target);
                }
                match last.target {
                    SlotTarget::Merge(target) => {
                        batch.push(Op::Grow {
                            instance: target,
                            amount: last.count,
                        });
                        if instance.persistence != PersistenceState::New {
                            batch.push(Op::Retire {
                                record: ItemRecord::destroyed(&instance),
                            });
                        }
                    }
                    _ => {
                        let mut instance = instance;
                        instance.count = last.count;
                        batch.push(Op::Spawn {
                            instance,
                            to: last.coordinate,
                        });
                    }
                }
            }
            StoreSource::Existing(id) => {
                let instance = self
                    .inventory
                    .get(id)
                    .ok_or_else(|| self.breach(ExecutorError::Missing { instance: id }))?;
                let from = instance
                    .coordinate
                    .ok_or_else(|| self.breach(ExecutorError::Missing { instance: id }))?;
                if planned > instance.count {
                    return Err(self.breach(ExecutorError::SourceMismatch {
                        planned,
                        available: instance.count,
                    }));
                }

                if planned < instance.count {
                    // the source stays put and gives up units
                    if planned > 0 {
                        batch.push(Op::Shrink { instance: id, amount: planned });
                    }
                    for reservation in &plan.reservations {
                        self.stage_copy(batch, instance, reservation.coordinate, reservation.count, reservation.target);
                    }
                    return Ok(());
                }

                let Some((last, rest)) = plan.reservations.split_last() else {
                    return Ok(());
                };
                let copied: u32 = rest.iter().map(|r| r.count).sum();
                if copied > 0 {
                    batch.push(Op::Shrink { instance: id, amount: copied });
                }
                for reservation in rest {
                    self.stage_copy(batch, instance, reservation.coordinate, reservation.count, reservation.target);
                }
                batch.push(Op::Detach { instance: id, from });
                match last.target {
                    SlotTarget::Merge(target) => {
                        batch.push(Op::Grow {
                            instance: target,
                            amount: last.count,
                        });
                        batch.push(Op::Destroy { instance: id });
                    }
                    _ => batch.push(Op::Attach {
                        instance: id,
                        to: last.coordinate,
                    }),
                }
            }
        }
        Ok(())
    }

    fn stage_copy(&self, batch: &mut Batch, source: &ItemInstance, to: Coordinate, count: u32, target: SlotTarget) {
        match target {
            SlotTarget::Merge(existing) => batch.push(Op::Grow {
                instance: existing,
                amount: count,
            }),
            _ => {
                let mut copy = ItemInstance::new(self.allocator.next(), source.item_type, count);
                copy.bound_to = source.bound_to;
                copy.random_property = source.random_property;
                batch.push(Op::Spawn { instance: copy, to });
            }
        }
    }

    /// Append the ops realizing an equip plan: displacements first
    pub fn stage_equip(&self, batch: &mut Batch, plan: &EquipPlan) -> InventoryResult<()> {
        for displacement in &plan.displaced {
            self.stage_store(batch, &displacement.plan, StoreSource::Existing(displacement.instance))?;
        }
        if let Some(from) = plan.from {
            batch.push(Op::Detach {
                instance: plan.instance,
                from,
            });
        }
        batch.push(Op::Attach {
            instance: plan.instance,
            to: plan.target,
        });
        if plan.binds {
            batch.push(Op::Bind {
                instance: plan.instance,
                owner: self.inventory.owner(),
            });
        }
        Ok(())
    }

    /// Append the ops taking the occupant of `coordinate` out
    pub fn stage_remove(&self, batch: &mut Batch, coordinate: &Coordinate, removal: Removal) -> InventoryResult<InstanceId> {
        let id = self
            .inventory
            .occupant(coordinate)
            .ok_or(InventoryError::EmptySlot { coordinate: *coordinate })?;
        if self.inventory.bag_has_contents(id) {
            return Err(InventoryError::BagNotEmpty { bag: id });
        }
        batch.push(Op::Detach {
            instance: id,
            from: *coordinate,
        });
        batch.push(match removal {
            Removal::Destroy => Op::Destroy { instance: id },
            Removal::Release => Op::Release { instance: id },
        });
        Ok(id)
    }

    fn breach(&self, err: ExecutorError) -> InventoryError {
        log::error!("Refusing plan for {}: {}", self.inventory.owner(), err);
        InventoryError::StalePlan(err)
    }

    /// Validate a batch against live state, then apply it
    pub fn commit(&mut self, batch: &Batch) -> InventoryResult<Applied> {
        let touched = Shadow::new(self.inventory, self.catalog)
            .check(batch)
            .map_err(|err| self.breach(err))?;

        let before: Vec<(ItemTypeId, u32)> = touched
            .iter()
            .map(|t| (*t, self.inventory.count_of(*t, false)))
            .collect();

        let mut applied = Applied::default();
        let mut lifted: HashMap<InstanceId, Coordinate> = HashMap::new();
        for op in batch.ordered() {
            self.apply(op, &mut lifted, &mut applied);
        }

        for (item_type, count) in before {
            let now = self.inventory.count_of(item_type, false);
            if now != count {
                self.collaborators.count_changed(item_type, now);
            }
        }
        self.collaborators.dispatch(&applied.events);
        log::debug!(
            "Committed {} ops for {} ({} events)",
            batch.len(),
            self.inventory.owner(),
            applied.events.len()
        );
        Ok(applied)
    }

    fn apply(&mut self, op: &Op, lifted: &mut HashMap<InstanceId, Coordinate>, applied: &mut Applied) {
        let events = &mut applied.events;
        match op {
            Op::Detach { instance, from } => {
                if let Some(slot) = from.equip_slot() {
                    if let Some(item) = self.inventory.get(*instance) {
                        self.collaborators.unequipped(item);
                    }
                    events.push(InventoryEvent::ItemUnequipped {
                        instance: *instance,
                        slot,
                    });
                }
                self.inventory.detach(*instance);
                lifted.insert(*instance, *from);
            }
            Op::Attach { instance, to } => {
                self.inventory.attach(*instance, *to);
                match lifted.remove(instance) {
                    Some(from) => events.push(InventoryEvent::ItemMoved {
                        instance: *instance,
                        from,
                        to: *to,
                    }),
                    None => {
                        if let Some(item) = self.inventory.get(*instance) {
                            events.push(InventoryEvent::ItemPlaced {
                                instance: *instance,
                                item_type: item.item_type,
                                coordinate: *to,
                                count: item.count,
                            });
                        }
                    }
                }
                self.equipped_at(*instance, to, events);
            }
            Op::Spawn { instance, to } => {
                let slots = self
                    .catalog
                    .item_type(instance.item_type)
                    .filter(|t| t.is_container())
                    .map(|t| t.container_slots)
                    .unwrap_or(0);
                let id = instance.id;
                events.push(InventoryEvent::ItemPlaced {
                    instance: id,
                    item_type: instance.item_type,
                    coordinate: *to,
                    count: instance.count,
                });
                self.inventory.adopt(instance.clone(), slots);
                self.inventory.attach(id, *to);
                self.equipped_at(id, to, events);
            }
            Op::Grow { instance, amount } => {
                if let Some(item) = self.inventory.get_mut(*instance) {
                    item.count += amount;
                    item.persistence = item.persistence.touched();
                    if let Some(coordinate) = item.coordinate {
                        events.push(InventoryEvent::ItemMerged {
                            instance: *instance,
                            coordinate,
                            added: *amount,
                            count: item.count,
                        });
                    }
                }
            }
            Op::Shrink { instance, amount } => {
                if let Some(item) = self.inventory.get_mut(*instance) {
                    item.count -= amount;
                    item.persistence = item.persistence.touched();
                    if let Some(coordinate) = item.coordinate {
                        events.push(InventoryEvent::ItemReduced {
                            instance: *instance,
                            coordinate,
                            removed: *amount,
                            count: item.count,
                        });
                    }
                }
            }
            Op::Destroy { instance } => {
                if let Some(item) = self.inventory.release(*instance) {
                    if item.persistence != PersistenceState::New {
                        self.inventory.record_destroyed(ItemRecord::destroyed(&item));
                    }
                    if let Some(coordinate) = lifted.remove(instance) {
                        events.push(InventoryEvent::ItemRemoved {
                            instance: *instance,
                            item_type: item.item_type,
                            coordinate,
                            count: item.count,
                        });
                    }
                }
            }
            Op::Release { instance } => {
                if let Some(item) = self.inventory.release(*instance) {
                    if let Some(coordinate) = lifted.remove(instance) {
                        events.push(InventoryEvent::ItemRemoved {
                            instance: *instance,
                            item_type: item.item_type,
                            coordinate,
                            count: item.count,
                        });
                    }
                    applied.released.push(item);
                }
            }
            Op::Retire { record } => self.inventory.record_destroyed(record.clone()),
            Op::Bind { instance, owner } => {
                if let Some(item) = self.inventory.get_mut(*instance) {
                    item.bound_to = Some(*owner);
                    item.persistence = item.persistence.touched();
                    events.push(InventoryEvent::ItemBound {
                        instance: *instance,
                        owner: *owner,
                    });
                }
            }
            Op::SetBroken { instance, broken } => {
                let equipped = self
                    .inventory
                    .get(*instance)
                    .and_then(|i| i.coordinate)
                    .map(|c| c.is_equipment())
                    .unwrap_or(false);
                let was = self.inventory.get(*instance).map(|i| i.broken);
                if was == Some(*broken) {
                    return;
                }
                if equipped && *broken {
                    if let Some(item) = self.inventory.get(*instance) {
                        self.collaborators.unequipped(item);
                    }
                }
                if let Some(item) = self.inventory.get_mut(*instance) {
                    item.broken = *broken;
                }
                if equipped && !*broken {
                    if let Some(item) = self.inventory.get(*instance) {
                        self.collaborators.equipped(item);
                    }
                }
            }
        }
    }

    fn equipped_at(&mut self, instance: InstanceId, to: &Coordinate, events: &mut Vec<InventoryEvent>) {
        let Some(slot) = to.equip_slot() else {
            return;
        };
        if let Some(item) = self.inventory.get(instance) {
            self.collaborators.equipped(item);
        }
        events.push(InventoryEvent::ItemEquipped { instance, slot });
    }
}

/// Simulated slot and count state used to validate a batch
struct Shadow<'a> {
    inventory: &'a Inventory,
    catalog: &'a dyn ItemCatalog,
    slots: HashMap<Coordinate, Option<InstanceId>>,
    placed: HashMap<InstanceId, Option<Coordinate>>,
    counts: HashMap<InstanceId, u32>,
    types: HashMap<InstanceId, ItemTypeId>,
    gone: HashSet<InstanceId>,
}

impl<'a> Shadow<'a> {
    fn new(inventory: &'a Inventory, catalog: &'a dyn ItemCatalog) -> Self {
        Self {
            inventory,
            catalog,
            slots: HashMap::new(),
            placed: HashMap::new(),
            counts: HashMap::new(),
            types: HashMap::new(),
            gone: HashSet::new(),
        }
    }

    fn occupant(&self, coordinate: &Coordinate) -> Option<InstanceId> {
        match self.slots.get(coordinate) {
            Some(occupant) => *occupant,
            None => self.inventory.occupant(coordinate),
        }
    }

    /// `None` when the instance is unknown, otherwise its coordinate
    fn coordinate(&self, id: InstanceId) -> Option<Option<Coordinate>> {
        if self.gone.contains(&id) {
            return None;
        }
        if let Some(placed) = self.placed.get(&id) {
            return Some(*placed);
        }
        self.inventory.get(id).map(|i| i.coordinate)
    }

    fn count(&self, id: InstanceId) -> u32 {
        self.counts
            .get(&id)
            .copied()
            .or_else(|| self.inventory.get(id).map(|i| i.count))
            .unwrap_or(0)
    }

    fn item_type(&self, id: InstanceId) -> Option<ItemTypeId> {
        self.types
            .get(&id)
            .copied()
            .or_else(|| self.inventory.get(id).map(|i| i.item_type))
    }

    fn stack_limit(&self, item_type: ItemTypeId) -> Result<u32, ExecutorError> {
        self.catalog
            .item_type(item_type)
            .map(|t| t.stack_limit)
            .ok_or(ExecutorError::UnknownItemType(item_type))
    }

    fn addressable(&self, coordinate: &Coordinate) -> bool {
        if !self.inventory.contains_coordinate(coordinate) {
            return false;
        }
        match coordinate.container {
            Container::Bag(bag) => matches!(
                self.coordinate(bag).flatten().map(|c| c.container),
                Some(Container::BagSlots | Container::BankBagSlots)
            ),
            _ => self.inventory.domain(coordinate) != Domain::Inactive,
        }
    }

    fn require_empty(&self, coordinate: &Coordinate) -> Result<(), ExecutorError> {
        if !self.addressable(coordinate) {
            return Err(ExecutorError::Unaddressable { coordinate: *coordinate });
        }
        if let Some(occupant) = self.occupant(coordinate) {
            return Err(ExecutorError::SlotOccupied {
                coordinate: *coordinate,
                occupant,
            });
        }
        Ok(())
    }

    fn require_detached(&self, id: InstanceId) -> Result<(), ExecutorError> {
        match self.coordinate(id) {
            None => Err(ExecutorError::Missing { instance: id }),
            Some(Some(_)) => Err(ExecutorError::NotDetached { instance: id }),
            Some(None) => Ok(()),
        }
    }

    /// Walk the batch in commit order; returns every item type it touches
    fn check(mut self, batch: &Batch) -> Result<BTreeSet<ItemTypeId>, ExecutorError> {
        let mut touched = BTreeSet::new();

        for op in batch.ordered() {
            match op {
                Op::Detach { instance, from } => {
                    match self.coordinate(*instance) {
                        None => return Err(ExecutorError::Missing { instance: *instance }),
                        Some(at) if at != Some(*from) => {
                            return Err(ExecutorError::Misplaced {
                                instance: *instance,
                                expected: *from,
                            })
                        }
                        _ => {}
                    }
                    self.slots.insert(*from, None);
                    self.placed.insert(*instance, None);
                }
                Op::Attach { instance, to } => {
                    self.require_detached(*instance)?;
                    self.require_empty(to)?;
                    self.slots.insert(*to, Some(*instance));
                    self.placed.insert(*instance, Some(*to));
                }
                Op::Spawn { instance, to } => {
                    if self.coordinate(instance.id).is_some() {
                        return Err(ExecutorError::NotDetached { instance: instance.id });
                    }
                    let limit = self.stack_limit(instance.item_type)?;
                    if instance.count == 0 || instance.count > limit {
                        return Err(ExecutorError::StackOverflow {
                            instance: instance.id,
                            amount: instance.count,
                            limit,
                        });
                    }
                    self.require_empty(to)?;
                    self.slots.insert(*to, Some(instance.id));
                    self.placed.insert(instance.id, Some(*to));
                    self.counts.insert(instance.id, instance.count);
                    self.types.insert(instance.id, instance.item_type);
                }
                Op::Grow { instance, amount } => {
                    let item_type = self
                        .item_type(*instance)
                        .filter(|_| self.coordinate(*instance).is_some())
                        .ok_or(ExecutorError::Missing { instance: *instance })?;
                    let limit = self.stack_limit(item_type)?;
                    let count = self.count(*instance);
                    if count + amount > limit {
                        return Err(ExecutorError::StackOverflow {
                            instance: *instance,
                            amount: *amount,
                            limit,
                        });
                    }
                    self.counts.insert(*instance, count + amount);
                }
                Op::Shrink { instance, amount } => {
                    if self.coordinate(*instance).is_none() {
                        return Err(ExecutorError::Missing { instance: *instance });
                    }
                    let count = self.count(*instance);
                    if *amount == 0 || *amount >= count {
                        return Err(ExecutorError::Underflow {
                            instance: *instance,
                            amount: *amount,
                        });
                    }
                    self.counts.insert(*instance, count - amount);
                }
                Op::Destroy { instance } | Op::Release { instance } => {
                    self.require_detached(*instance)?;
                    self.gone.insert(*instance);
                }
                Op::Bind { instance, .. } | Op::SetBroken { instance, .. } => {
                    if self.coordinate(*instance).is_none() {
                        return Err(ExecutorError::Missing { instance: *instance });
                    }
                }
                Op::Retire { .. } => {}
            }

            match op {
                Op::Spawn { instance, .. } => {
                    touched.insert(instance.item_type);
                }
                Op::Retire { .. } => {}
                Op::Detach { instance, .. } | Op::Attach { instance, .. } => {
                    if let Some(item_type) = self.item_type(*instance) {
                        touched.insert(item_type);
                    }
                    // a moving bag carries its contents across domains
                    touched.extend(self.inventory.bag_contents(*instance).iter().map(|i| i.item_type));
                }
                Op::Grow { instance, .. }
                | Op::Shrink { instance, .. }
                | Op::Destroy { instance }
                | Op::Release { instance }
                | Op::Bind { instance, .. }
                | Op::SetBroken { instance, .. } => {
                    if let Some(item_type) = self.item_type(*instance) {
                        touched.insert(item_type);
                    }
                }
            }
        }
        Ok(touched)
    }
}
