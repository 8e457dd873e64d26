//! Compound operations
//!
//! Moves, splits, swaps and equips that need more than one plan. Every leg is
//! planned against a shared [`Probe`] before anything is applied, and all legs
//! go to the executor as one batch, so a rejected operation leaves the
//! inventory exactly as it was.

use crate::container::{Container, Coordinate, Domain, StoreMode};
use crate::engine::{InventoryEngine, Receipt};
use crate::equipment::EquipSlot;
use crate::error::{InventoryError, InventoryResult};
use crate::executor::{Batch, Op, Removal, StoreSource};
use crate::item::{BindingPolicy, InstanceId, ItemInstance, ItemTypeId};
use crate::planner::{EquipRequest, Probe, StorePlan, StoreRequest};

impl InventoryEngine {
    /// Store newly created units (loot, vendor purchase, quest reward)
    pub fn store_new(
        &mut self,
        item_type: ItemTypeId,
        quantity: u32,
        preferred: Option<Coordinate>,
        mode: StoreMode,
    ) -> InventoryResult<Receipt> {
        let ty = self.item_type(item_type)?;
        let planner = self.planner();
        let mut bound_to = planner.binding_for_new(&ty);
        if matches!(mode, StoreMode::Equip(_)) && ty.binding == BindingPolicy::OnEquip {
            bound_to = Some(self.inventory.owner());
        }

        let request = StoreRequest::new(item_type, quantity, mode)
            .with_preferred(preferred)
            .with_bound_to(bound_to);
        let plan = planner.plan_store(&request, &Probe::new())?;
        let receipt = self.apply_store(&plan, StoreSource::Fresh)?;
        log::debug!(
            "Stored {} x{} for {} ({} unplaceable)",
            item_type,
            plan.planned(),
            self.inventory.owner(),
            plan.unplaceable
        );
        Ok(receipt)
    }

    /// Receive a detached instance (trade, mail)
    pub fn store_detached(
        &mut self,
        mut instance: ItemInstance,
        preferred: Option<Coordinate>,
        mode: StoreMode,
    ) -> InventoryResult<Receipt> {
        let owner = self.inventory.owner();
        if !instance.usable_by(owner) {
            return Err(InventoryError::NotOwnedOrBound { instance: instance.id });
        }
        let ty = self.item_type(instance.item_type)?;
        let binds_now = ty.binding.binds_on_store()
            || matches!(mode, StoreMode::Equip(_)) && ty.binding == BindingPolicy::OnEquip;
        if binds_now {
            instance.bound_to = Some(owner);
        }
        instance.coordinate = None;

        let mut request = StoreRequest::new(instance.item_type, instance.count, mode)
            .with_preferred(preferred)
            .with_bound_to(instance.bound_to)
            .with_random_property(instance.random_property)
            .with_gems(&instance.gems);
        if !instance.gems.is_empty() {
            request = request.without_merge();
        }
        let plan = self.planner().plan_store(&request, &Probe::new())?;
        if plan.unplaceable > 0 {
            return Err(InventoryError::OwnershipCapExceeded {
                item_type: instance.item_type,
                placeable: plan.planned(),
            });
        }
        self.apply_store(&plan, StoreSource::Detached(instance))
    }

    /// Store several new items at once; nothing is stored unless all fit
    pub fn store_bulk(&mut self, items: &[(ItemTypeId, u32)], mode: StoreMode) -> InventoryResult<Receipt> {
        let plans = self.planner().plan_bulk(items, mode, false)?;
        if let Some(capped) = plans.iter().find(|p| p.unplaceable > 0) {
            return Err(InventoryError::OwnershipCapExceeded {
                item_type: capped.item_type,
                placeable: capped.planned(),
            });
        }

        let mut executor = self.executor();
        let mut batch = Batch::new();
        for plan in &plans {
            executor.stage_store(&mut batch, plan, StoreSource::Fresh)?;
        }
        let applied = executor.commit(&batch)?;
        Ok(Receipt {
            destinations: plans.iter().flat_map(|p| p.destinations()).collect(),
            unplaceable: 0,
            events: applied.events,
        })
    }

    /// Plan several new items without storing them
    pub fn check_bulk(
        &self,
        items: &[(ItemTypeId, u32)],
        mode: StoreMode,
        best_effort: bool,
    ) -> InventoryResult<Vec<StorePlan>> {
        self.planner().plan_bulk(items, mode, best_effort)
    }

    /// Move the item at `from` to `to`.
    ///
    /// A compatible partial stack at `to` is topped up and the rest stays at
    /// `from`; any other occupant is swapped.
    pub fn move_item(&mut self, from: Coordinate, to: Coordinate) -> InventoryResult<Receipt> {
        if from == to {
            return Ok(Receipt::default());
        }
        let item = self.occupant_at(&from)?;
        if from.container == Container::Buyback {
            return Err(InventoryError::IncompatibleContainer { coordinate: from });
        }
        if !self.inventory.contains_coordinate(&to) {
            return Err(InventoryError::InvalidCoordinate { coordinate: to });
        }

        let occupant = self.inventory.item_at(&to).cloned();
        if to.is_equipment() {
            if occupant.is_some() {
                return self.swap(from, to);
            }
            let request = EquipRequest::new(item.id).with_preferred(Some(to)).exact();
            return self.equip_with(request);
        }

        let tops_up = match &occupant {
            Some(target) => self.tops_up(&item, target)?,
            None => false,
        };
        match occupant {
            None => {
                let request = StoreRequest::for_instance(&item, self.mode_for(&to))
                    .with_preferred(Some(to))
                    .exact();
                let plan = self.planner().plan_store(&request, &Probe::new())?;
                self.apply_store(&plan, StoreSource::Existing(item.id))
            }
            Some(_) if tops_up => {
                let request = StoreRequest::for_instance(&item, self.mode_for(&to))
                    .with_preferred(Some(to))
                    .exact()
                    .best_effort();
                let plan = self.planner().plan_store(&request, &Probe::new())?;
                self.apply_store(&plan, StoreSource::Existing(item.id))
            }
            Some(_) => self.swap(from, to),
        }
    }

    fn tops_up(&self, item: &ItemInstance, target: &ItemInstance) -> InventoryResult<bool> {
        let ty = self.item_type(item.item_type)?;
        Ok(ty.is_stackable()
            && item.gems.is_empty()
            && target.can_merge(item)
            && target.count < ty.stack_limit)
    }

    /// Split `count` units off the stack at `from`.
    ///
    /// With a destination the new stack goes exactly there (merging into a
    /// compatible stack if one is present); otherwise it takes the first empty
    /// slot of the source's storage domain.
    pub fn split(&mut self, from: Coordinate, count: u32, to: Option<Coordinate>) -> InventoryResult<Receipt> {
        let item = self.occupant_at(&from)?;
        if from.container == Container::Buyback {
            return Err(InventoryError::IncompatibleContainer { coordinate: from });
        }
        if count == 0 || count >= item.count {
            return Err(InventoryError::InvalidQuantity {
                requested: count,
                available: item.count,
            });
        }

        let mut probe = Probe::new();
        probe.claim(from);
        let mode = self.mode_for(&to.unwrap_or(from));
        let mut request = StoreRequest::for_instance(&item, mode)
            .with_quantity(count)
            .with_already_owned(count);
        request = match to {
            Some(to) => request.with_preferred(Some(to)).exact(),
            None => request.without_merge(),
        };

        let plan = self.planner().plan_store(&request, &probe)?;
        log::debug!("Split {} x{} off {}", item.id, count, from);
        self.apply_store(&plan, StoreSource::Existing(item.id))
    }

    /// Exchange the contents of two coordinates.
    ///
    /// An empty side turns this into a move. Both legs are planned as if
    /// both slots were already empty; if either is refused nothing changes.
    pub fn swap(&mut self, a: Coordinate, b: Coordinate) -> InventoryResult<Receipt> {
        if a == b {
            return Ok(Receipt::default());
        }
        for coordinate in [a, b] {
            if !self.inventory.contains_coordinate(&coordinate) {
                return Err(InventoryError::InvalidCoordinate { coordinate });
            }
            if coordinate.container == Container::Buyback {
                return Err(InventoryError::IncompatibleContainer { coordinate });
            }
        }

        let x = self.inventory.item_at(&a).cloned();
        let y = self.inventory.item_at(&b).cloned();
        let (x, y) = match (x, y) {
            (None, None) => return Err(InventoryError::EmptySlot { coordinate: a }),
            (Some(_), None) => return self.move_item(a, b),
            (None, Some(_)) => return self.move_item(b, a),
            (Some(x), Some(y)) => (x, y),
        };

        let result = if a.is_equipment() {
            self.equip_with(
                EquipRequest::new(y.id)
                    .with_preferred(Some(a))
                    .with_allow_swap(true)
                    .exact()
                    .displace_to(b),
            )
        } else if b.is_equipment() {
            self.equip_with(
                EquipRequest::new(x.id)
                    .with_preferred(Some(b))
                    .with_allow_swap(true)
                    .exact()
                    .displace_to(a),
            )
        } else if a.is_bag_reference() != b.is_bag_reference() && (self.holds_items(&x) || self.holds_items(&y)) {
            self.swap_bag_contents(a, b, &x, &y)
        } else {
            self.swap_plain(a, b, &x, &y)
        };

        if let Err(err) = &result {
            log::warn!("Swap {} <-> {} refused: {}", a, b, err);
        }
        result
    }

    fn holds_items(&self, item: &ItemInstance) -> bool {
        self.inventory.bag_has_contents(item.id)
    }

    fn swap_plain(&mut self, a: Coordinate, b: Coordinate, x: &ItemInstance, y: &ItemInstance) -> InventoryResult<Receipt> {
        let mut probe = Probe::new();
        probe.vacate(a);
        probe.vacate(b);

        let planner = self.planner();
        let leg_x = planner.plan_store(
            &StoreRequest::for_instance(x, self.mode_for(&b))
                .with_preferred(Some(b))
                .exact()
                .without_merge(),
            &probe,
        )?;
        probe.absorb(&leg_x, &*self.item_type(x.item_type)?, 0);
        let leg_y = planner.plan_store(
            &StoreRequest::for_instance(y, self.mode_for(&a))
                .with_preferred(Some(a))
                .exact()
                .without_merge(),
            &probe,
        )?;

        let mut executor = self.executor();
        let mut batch = Batch::new();
        executor.stage_store(&mut batch, &leg_x, StoreSource::Existing(x.id))?;
        executor.stage_store(&mut batch, &leg_y, StoreSource::Existing(y.id))?;
        let applied = executor.commit(&batch)?;
        log::debug!("Swapped {} <-> {}", a, b);
        Ok(Receipt {
            destinations: vec![(b, x.count), (a, y.count)],
            unplaceable: 0,
            events: applied.events,
        })
    }

    /// Swap an equipped bag with one stored elsewhere: the equipped bag's
    /// contents move into the incoming bag, which must hold all of them.
    fn swap_bag_contents(
        &mut self,
        a: Coordinate,
        b: Coordinate,
        x: &ItemInstance,
        y: &ItemInstance,
    ) -> InventoryResult<Receipt> {
        // `slot` holds `equipped`; `outer` holds `incoming`
        let (slot, equipped, outer, incoming) = if a.is_bag_reference() { (a, x, b, y) } else { (b, y, a, x) };

        if self.holds_items(incoming) {
            return Err(InventoryError::BagNotEmpty { bag: incoming.id });
        }
        if outer.container == Container::Bag(equipped.id) {
            return Err(InventoryError::IncompatibleContainer { coordinate: outer });
        }

        let incoming_type = self.item_type(incoming.item_type)?;
        let equipped_type = self.item_type(equipped.item_type)?;
        let mut probe = Probe::new();
        probe.vacate(slot);
        probe.vacate(outer);

        let planner = self.planner();
        planner.accepts(&slot, &incoming_type, Some(incoming.id), &probe)?;
        // the equipped bag leaves empty, so accept it as such
        planner.accepts(&outer, &equipped_type, None, &probe)?;

        let contents: Vec<(u16, ItemInstance)> = self
            .inventory
            .slots(Container::Bag(equipped.id))
            .unwrap_or_default()
            .iter()
            .enumerate()
            .filter_map(|(i, id)| {
                let id = (*id)?;
                Some((i as u16, self.inventory.get(id)?.clone()))
            })
            .collect();
        let capacity = incoming_type.container_slots;
        if contents.len() > capacity as usize {
            return Err(InventoryError::IncompatibleContainer {
                coordinate: Coordinate::bag(incoming.id, capacity.saturating_sub(1)),
            });
        }
        let keep_slots = capacity as usize >= self.inventory.capacity(Container::Bag(equipped.id)).unwrap_or(0) as usize;

        let mut moves = Vec::with_capacity(contents.len());
        for (next, (index, item)) in contents.iter().enumerate() {
            let to = Coordinate::bag(incoming.id, if keep_slots { *index } else { next as u16 });
            let item_type = self.item_type(item.item_type)?;
            if !incoming_type.bag_accepts(&item_type)
                || item_type.is_container() && !incoming_type.container_family.is_empty()
            {
                return Err(InventoryError::IncompatibleContainer { coordinate: to });
            }
            moves.push((item.id, Coordinate::bag(equipped.id, *index), to));
        }

        let mut batch = Batch::new();
        for (id, from, _) in &moves {
            batch.push(Op::Detach { instance: *id, from: *from });
        }
        batch.push(Op::Detach { instance: equipped.id, from: slot });
        batch.push(Op::Detach { instance: incoming.id, from: outer });
        batch.push(Op::Attach { instance: incoming.id, to: slot });
        for (id, _, to) in &moves {
            batch.push(Op::Attach { instance: *id, to: *to });
        }
        batch.push(Op::Attach { instance: equipped.id, to: outer });

        let applied = self.executor().commit(&batch)?;
        log::debug!(
            "Swapped bag {} for {} moving {} items",
            equipped.id,
            incoming.id,
            moves.len()
        );
        Ok(Receipt::from_events(applied))
    }

    /// Equip an instance, displacing occupants as needed
    pub fn equip(&mut self, instance: InstanceId, preferred: Option<Coordinate>) -> InventoryResult<Receipt> {
        let item = self.instance(instance)?.clone();
        let ty = self.item_type(item.item_type)?;

        if let (Some(from), Some(target)) = (item.coordinate, preferred) {
            if ty.is_container() && target.is_bag_reference() && self.inventory.occupant(&target).is_some() {
                return self.swap(from, target);
            }
        }

        let request = EquipRequest::new(instance)
            .with_preferred(preferred)
            .with_allow_swap(!ty.is_container());
        self.equip_with(request)
    }

    fn equip_with(&mut self, request: EquipRequest) -> InventoryResult<Receipt> {
        let plan = self.plan_equip(&request)?;
        let receipt = self.apply_equip(&plan)?;
        log::debug!(
            "Equipped {} at {} ({} displaced)",
            plan.instance,
            plan.target,
            plan.displaced.len()
        );
        Ok(receipt)
    }

    /// Move an equipped item into carried storage, or to `destination`
    pub fn unequip(&mut self, slot: EquipSlot, destination: Option<Coordinate>) -> InventoryResult<Receipt> {
        let from = Coordinate::equipment(slot);
        let item = self.occupant_at(&from)?;
        if let Some(destination) = destination {
            return self.move_item(from, destination);
        }
        let request = StoreRequest::for_instance(&item, StoreMode::CarriedAndBags);
        let plan = self.plan_store(&request)?;
        self.apply_store(&plan, StoreSource::Existing(item.id))
    }

    /// Destroy the item at `coordinate`
    pub fn destroy(&mut self, coordinate: Coordinate) -> InventoryResult<Receipt> {
        self.occupant_at(&coordinate)?;
        let applied = self.apply_remove(&coordinate, Removal::Destroy)?;
        Ok(Receipt::from_events(applied))
    }

    /// Consume `count` carried or equipped units of a type, in scan order
    pub fn destroy_count(&mut self, item_type: ItemTypeId, count: u32) -> InventoryResult<Receipt> {
        let available = self.inventory.count_of(item_type, false);
        if count == 0 || count > available {
            return Err(InventoryError::InvalidQuantity {
                requested: count,
                available,
            });
        }

        let mut batch = Batch::new();
        let mut remaining = count;
        for item in self.inventory.placed_in_order() {
            if remaining == 0 {
                break;
            }
            let Some(coordinate) = item.coordinate else {
                continue;
            };
            let carried = matches!(self.inventory.domain(&coordinate), Domain::Equipped | Domain::Carried);
            if item.item_type != item_type || !carried {
                continue;
            }
            if item.count <= remaining {
                if self.inventory.bag_has_contents(item.id) {
                    return Err(InventoryError::BagNotEmpty { bag: item.id });
                }
                batch.push(Op::Detach { instance: item.id, from: coordinate });
                batch.push(Op::Destroy { instance: item.id });
                remaining -= item.count;
            } else {
                batch.push(Op::Shrink {
                    instance: item.id,
                    amount: remaining,
                });
                remaining = 0;
            }
        }

        let applied = self.executor().commit(&batch)?;
        log::debug!("Consumed {} x{} for {}", item_type, count, self.inventory.owner());
        Ok(Receipt::from_events(applied))
    }

    /// Remove an item for a cross-character transfer.
    ///
    /// Bound items cannot change hands. The returned instance is detached
    /// and can be handed to another engine with
    /// [`store_detached`](Self::store_detached).
    pub fn detach_for_transfer(&mut self, coordinate: Coordinate) -> InventoryResult<ItemInstance> {
        let item = self.occupant_at(&coordinate)?;
        if item.bound_to.is_some() || item.temporary {
            return Err(InventoryError::NotOwnedOrBound { instance: item.id });
        }
        let mut applied = self.apply_remove(&coordinate, Removal::Release)?;
        let mut released = applied
            .released
            .pop()
            .ok_or(InventoryError::UnknownInstance(item.id))?;
        released.coordinate = None;
        released.bound_to = None;
        log::debug!("Released {} from {} for transfer", released.id, self.inventory.owner());
        Ok(released)
    }

    /// Sell the item at `coordinate` into the buyback list.
    ///
    /// Buyback entries stay in sale order; when the list is full the oldest
    /// entry is destroyed.
    pub fn sell(&mut self, coordinate: Coordinate) -> InventoryResult<Receipt> {
        let item = self.occupant_at(&coordinate)?;
        if coordinate.container == Container::Buyback {
            return Err(InventoryError::IncompatibleContainer { coordinate });
        }
        if self.holds_items(&item) {
            return Err(InventoryError::BagNotEmpty { bag: item.id });
        }
        let entries: Vec<Option<InstanceId>> = self
            .inventory
            .slots(Container::Buyback)
            .map(|s| s.to_vec())
            .unwrap_or_default();
        if entries.is_empty() {
            return Err(InventoryError::IncompatibleContainer {
                coordinate: Coordinate::buyback(0),
            });
        }

        let mut batch = Batch::new();
        batch.push(Op::Detach {
            instance: item.id,
            from: coordinate,
        });
        let target = match entries.iter().position(Option::is_none) {
            Some(free) => free,
            None => {
                if let Some(oldest) = entries[0] {
                    batch.push(Op::Detach {
                        instance: oldest,
                        from: Coordinate::buyback(0),
                    });
                    batch.push(Op::Destroy { instance: oldest });
                }
                self.shift_buyback(&mut batch, &entries, 1);
                entries.len() - 1
            }
        };
        batch.push(Op::Attach {
            instance: item.id,
            to: Coordinate::buyback(target as u16),
        });

        let applied = self.executor().commit(&batch)?;
        log::debug!("Sold {} into buyback slot {}", item.id, target);
        Ok(Receipt {
            destinations: vec![(Coordinate::buyback(target as u16), item.count)],
            unplaceable: 0,
            events: applied.events,
        })
    }

    /// Move buyback entries from `start` on one slot towards the front
    fn shift_buyback(&self, batch: &mut Batch, entries: &[Option<InstanceId>], start: usize) {
        for (index, entry) in entries.iter().enumerate().skip(start) {
            if let Some(id) = entry {
                batch.push(Op::Detach {
                    instance: *id,
                    from: Coordinate::buyback(index as u16),
                });
                batch.push(Op::Attach {
                    instance: *id,
                    to: Coordinate::buyback(index as u16 - 1),
                });
            }
        }
    }

    /// Buy an item back into carried storage; ownership caps apply again
    pub fn buy_back(&mut self, slot: u16) -> InventoryResult<Receipt> {
        let coordinate = Coordinate::buyback(slot);
        let item = self.occupant_at(&coordinate)?;
        let request = StoreRequest::for_instance(&item, StoreMode::CarriedAndBags).with_already_owned(0);
        let plan = self.plan_store(&request)?;
        if plan.unplaceable > 0 {
            return Err(InventoryError::OwnershipCapExceeded {
                item_type: item.item_type,
                placeable: plan.planned(),
            });
        }

        let entries: Vec<Option<InstanceId>> = self
            .inventory
            .slots(Container::Buyback)
            .map(|s| s.to_vec())
            .unwrap_or_default();
        let executor = self.executor();
        let mut batch = Batch::new();
        executor.stage_store(&mut batch, &plan, StoreSource::Existing(item.id))?;
        drop(executor);
        self.shift_buyback(&mut batch, &entries, slot as usize + 1);

        let applied = self.executor().commit(&batch)?;
        Ok(Receipt::from_plan(&plan, applied))
    }

    /// Toggle the durability-zero flag; equipped items get stat callbacks
    pub fn set_broken(&mut self, instance: InstanceId, broken: bool) -> InventoryResult<()> {
        self.instance(instance)?;
        let mut batch = Batch::new();
        batch.push(Op::SetBroken { instance, broken });
        self.executor().commit(&batch)?;
        Ok(())
    }
}
