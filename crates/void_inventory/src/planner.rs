//! Placement planning
//!
//! [`PlacementPlanner`] answers "can this be placed, and where" without
//! touching the inventory. Plans are lists of per-slot reservations that the
//! executor later applies. Compound operations plan several legs against one
//! [`Probe`], an overlay describing slots about to be vacated or already
//! claimed by an earlier leg, so legs never collide.
//!
//! Scan order is fixed so identical state yields identical plans: preferred
//! slot, then merge into existing stacks (main pack or bank first, then bags
//! in bag-slot order), then empty slots (matching special bags first, then the
//! main pack or bank, then generic bags).

use crate::catalog::{ItemCatalog, LimitMode};
use crate::container::{Container, Coordinate, Domain, StoreMode};
use crate::equipment::{candidate_slots, fits_slot, EquipSlot};
use crate::error::{InventoryError, InventoryResult};
use crate::inventory::Inventory;
use crate::item::{InstanceId, ItemInstance, ItemType, ItemTypeId, OwnerId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Hypothetical state layered over the live inventory during planning
#[derive(Debug, Clone, Default)]
pub struct Probe {
    vacated: HashSet<Coordinate>,
    claimed: HashSet<Coordinate>,
    merged: HashMap<Coordinate, u32>,
    pending: HashMap<ItemTypeId, u32>,
    pending_category: HashMap<u32, u32>,
}

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat a coordinate as empty
    pub fn vacate(&mut self, coordinate: Coordinate) {
        self.vacated.insert(coordinate);
    }

    /// Reserve a coordinate so later legs skip it
    pub fn claim(&mut self, coordinate: Coordinate) {
        self.claimed.insert(coordinate);
    }

    pub fn is_vacated(&self, coordinate: &Coordinate) -> bool {
        self.vacated.contains(coordinate)
    }

    pub fn is_claimed(&self, coordinate: &Coordinate) -> bool {
        self.claimed.contains(coordinate)
    }

    /// Record a plan so later legs see its slots and units
    pub fn absorb(&mut self, plan: &StorePlan, item_type: &ItemType, new_units: u32) {
        for reservation in &plan.reservations {
            match reservation.target {
                SlotTarget::Merge(_) => {
                    *self.merged.entry(reservation.coordinate).or_insert(0) += reservation.count;
                }
                SlotTarget::Empty | SlotTarget::Displace(_) => self.claim(reservation.coordinate),
            }
        }
        if new_units > 0 {
            *self.pending.entry(item_type.id).or_insert(0) += new_units;
            if item_type.limit_category != 0 {
                *self.pending_category.entry(item_type.limit_category).or_insert(0) += new_units;
            }
        }
    }

    fn merged_into(&self, coordinate: &Coordinate) -> u32 {
        self.merged.get(coordinate).copied().unwrap_or(0)
    }
}

/// What a reservation expects to find at its coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotTarget {
    /// Slot is empty (or vacated by an earlier leg)
    Empty,
    /// Slot holds a compatible stack with room
    Merge(InstanceId),
    /// Slot holds an item that must be moved away first
    Displace(InstanceId),
}

/// Units reserved at one coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub coordinate: Coordinate,
    pub count: u32,
    pub target: SlotTarget,
}

/// Result of store planning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePlan {
    pub item_type: ItemTypeId,
    pub reservations: Vec<Reservation>,
    /// Units refused by ownership caps
    pub unplaceable: u32,
    /// Units without room (best-effort plans only)
    pub shortfall: u32,
    /// Binding the stored units carry
    pub bound_to: Option<OwnerId>,
    pub random_property: i32,
}

impl StorePlan {
    fn empty(item_type: ItemTypeId, bound_to: Option<OwnerId>, random_property: i32) -> Self {
        Self {
            item_type,
            reservations: Vec::new(),
            unplaceable: 0,
            shortfall: 0,
            bound_to,
            random_property,
        }
    }

    /// Units this plan places
    pub fn planned(&self) -> u32 {
        self.reservations.iter().map(|r| r.count).sum()
    }

    /// Destinations in plan order
    pub fn destinations(&self) -> Vec<(Coordinate, u32)> {
        self.reservations.iter().map(|r| (r.coordinate, r.count)).collect()
    }

    /// Occupant the plan needs moved away, if any
    pub fn displaced(&self) -> Option<InstanceId> {
        self.reservations.iter().find_map(|r| match r.target {
            SlotTarget::Displace(id) => Some(id),
            _ => None,
        })
    }
}

/// Store planning input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRequest {
    pub item_type: ItemTypeId,
    pub quantity: u32,
    pub mode: StoreMode,
    pub preferred: Option<Coordinate>,
    /// An occupied preferred slot may be displaced
    pub allow_swap: bool,
    /// Only the preferred slot may be used
    pub exact: bool,
    /// Existing stacks may be topped up
    pub merge: bool,
    /// Return a partial plan instead of failing when room runs out
    pub best_effort: bool,
    /// Units of `quantity` already counted in the owned totals
    pub already_owned: u32,
    pub bound_to: Option<OwnerId>,
    pub random_property: i32,
    /// Instance being moved, if any
    pub instance: Option<InstanceId>,
    /// Gems socketed in the incoming item
    pub gems: Vec<ItemTypeId>,
}

impl StoreRequest {
    pub fn new(item_type: ItemTypeId, quantity: u32, mode: StoreMode) -> Self {
        Self {
            item_type,
            quantity,
            mode,
            preferred: None,
            allow_swap: false,
            exact: false,
            merge: true,
            best_effort: false,
            already_owned: 0,
            bound_to: None,
            random_property: 0,
            instance: None,
            gems: Vec::new(),
        }
    }

    /// Request relocation of an existing instance (already owned)
    pub fn for_instance(instance: &ItemInstance, mode: StoreMode) -> Self {
        Self {
            already_owned: instance.count,
            bound_to: instance.bound_to,
            random_property: instance.random_property,
            instance: Some(instance.id),
            gems: instance.gems.clone(),
            ..Self::new(instance.item_type, instance.count, mode)
        }
    }

    /// Try this coordinate first
    pub fn with_preferred(mut self, coordinate: Option<Coordinate>) -> Self {
        self.preferred = coordinate;
        self
    }

    pub fn with_allow_swap(mut self, allow: bool) -> Self {
        self.allow_swap = allow;
        self
    }

    /// Place only at the preferred coordinate
    pub fn exact(mut self) -> Self {
        self.exact = true;
        self
    }

    /// Skip the merge pass
    pub fn without_merge(mut self) -> Self {
        self.merge = false;
        self
    }

    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_already_owned(mut self, units: u32) -> Self {
        self.already_owned = units;
        self
    }

    pub fn with_bound_to(mut self, owner: Option<OwnerId>) -> Self {
        self.bound_to = owner;
        self
    }

    pub fn with_random_property(mut self, id: i32) -> Self {
        self.random_property = id;
        self
    }

    pub fn with_gems(mut self, gems: &[ItemTypeId]) -> Self {
        self.gems = gems.to_vec();
        self
    }
}

/// Equip planning input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipRequest {
    pub instance: InstanceId,
    /// Equipment or bag-reference slot to try first
    pub preferred: Option<Coordinate>,
    pub allow_swap: bool,
    /// Only the preferred slot may be used
    pub exact: bool,
    /// Exact destination for the occupant of the chosen slot
    pub displace_to: Option<Coordinate>,
}

impl EquipRequest {
    pub fn new(instance: InstanceId) -> Self {
        Self {
            instance,
            preferred: None,
            allow_swap: false,
            exact: false,
            displace_to: None,
        }
    }

    pub fn with_preferred(mut self, coordinate: Option<Coordinate>) -> Self {
        self.preferred = coordinate;
        self
    }

    pub fn with_allow_swap(mut self, allow: bool) -> Self {
        self.allow_swap = allow;
        self
    }

    pub fn exact(mut self) -> Self {
        self.exact = true;
        self
    }

    pub fn displace_to(mut self, coordinate: Coordinate) -> Self {
        self.displace_to = Some(coordinate);
        self
    }
}

/// An occupant moved out of the way by an equip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Displacement {
    pub instance: InstanceId,
    pub from: Coordinate,
    pub plan: StorePlan,
}

/// Result of equip planning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipPlan {
    pub instance: InstanceId,
    pub from: Option<Coordinate>,
    pub target: Coordinate,
    /// Occupants to relocate, applied before the equip itself
    pub displaced: Vec<Displacement>,
    /// Equipping binds the item to the owner
    pub binds: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DisplaceReason {
    Target,
    OffHand,
    MainHand,
}

/// Read-only placement decisions over one inventory
pub struct PlacementPlanner<'a> {
    inventory: &'a Inventory,
    catalog: &'a dyn ItemCatalog,
}

impl<'a> PlacementPlanner<'a> {
    pub fn new(inventory: &'a Inventory, catalog: &'a dyn ItemCatalog) -> Self {
        Self { inventory, catalog }
    }

    fn item_type(&self, id: ItemTypeId) -> InventoryResult<Arc<ItemType>> {
        self.catalog.item_type(id).ok_or(InventoryError::UnknownItemType(id))
    }

    fn instance(&self, id: InstanceId) -> InventoryResult<&'a ItemInstance> {
        self.inventory.get(id).ok_or(InventoryError::UnknownInstance(id))
    }

    fn occupant(&self, coordinate: &Coordinate, probe: &Probe) -> Option<&'a ItemInstance> {
        if probe.is_vacated(coordinate) {
            return None;
        }
        self.inventory.item_at(coordinate)
    }

    /// Binding a newly created unit of `item_type` receives when stored
    pub fn binding_for_new(&self, item_type: &ItemType) -> Option<OwnerId> {
        item_type
            .binding
            .binds_on_store()
            .then(|| self.inventory.owner())
    }

    /// Units of `item_type` that may still be owned
    pub fn ownership_room(&self, item_type: &ItemType, already_owned: u32, probe: &Probe) -> u32 {
        let mut room = u32::MAX;

        if item_type.max_owned_count > 0 {
            let owned = self.inventory.owned_count(item_type.id)
                + probe.pending.get(&item_type.id).copied().unwrap_or(0);
            let owned = owned.saturating_sub(already_owned);
            room = room.min(item_type.max_owned_count.saturating_sub(owned));
        }

        if let Some(category) = self.owned_category(item_type.limit_category) {
            let owned = self
                .inventory
                .category_owned_count(self.catalog, category.id)
                + probe.pending_category.get(&category.id).copied().unwrap_or(0);
            let owned = owned.saturating_sub(already_owned);
            room = room.min(category.cap.saturating_sub(owned));
        }

        room
    }

    fn owned_category(&self, id: u32) -> Option<crate::catalog::LimitCategory> {
        if id == 0 {
            return None;
        }
        self.catalog
            .limit_category(id)
            .filter(|c| c.mode == LimitMode::Owned)
    }

    /// Check whether `item_type` may sit at `coordinate`.
    ///
    /// `instance` is the instance being moved, used for bag containment
    /// rules. Occupancy is not checked here.
    pub fn accepts(
        &self,
        coordinate: &Coordinate,
        item_type: &ItemType,
        instance: Option<InstanceId>,
        probe: &Probe,
    ) -> InventoryResult<()> {
        let inv = self.inventory;
        if !inv.contains_coordinate(coordinate) {
            return Err(InventoryError::InvalidCoordinate { coordinate: *coordinate });
        }
        let incompatible = Err(InventoryError::IncompatibleContainer { coordinate: *coordinate });
        let moving_bag_with_contents = instance.filter(|id| inv.bag_has_contents(*id));

        match coordinate.container {
            Container::Equipment => {
                let slot = coordinate
                    .equip_slot()
                    .ok_or(InventoryError::InvalidCoordinate { coordinate: *coordinate })?;
                if !fits_slot(item_type.inventory_type, slot, inv.capabilities()) {
                    return incompatible;
                }
            }
            Container::Buyback => return incompatible,
            Container::BagSlots | Container::BankBagSlots => {
                if !item_type.is_container() {
                    return incompatible;
                }
                if coordinate.container == Container::BagSlots && item_type.is_ranged_container() {
                    self.check_quiver(coordinate, instance, probe)?;
                }
            }
            Container::MainPack | Container::Bank => {
                if let Some(bag) = moving_bag_with_contents {
                    return Err(InventoryError::BagNotEmpty { bag });
                }
            }
            Container::Bag(bag) => {
                if inv.domain(coordinate) == Domain::Inactive {
                    return Err(InventoryError::InvalidCoordinate { coordinate: *coordinate });
                }
                if instance == Some(bag) {
                    return incompatible;
                }
                if let Some(inner) = moving_bag_with_contents {
                    return Err(InventoryError::BagNotEmpty { bag: inner });
                }
                let bag_type = self.bag_type(bag)?;
                if item_type.is_container() && !bag_type.container_family.is_empty() {
                    return incompatible;
                }
                if !bag_type.bag_accepts(item_type) {
                    return incompatible;
                }
            }
        }
        Ok(())
    }

    fn bag_type(&self, bag: InstanceId) -> InventoryResult<Arc<ItemType>> {
        let bag = self.instance(bag)?;
        self.item_type(bag.item_type)
    }

    /// Only one ranged container may be equipped in the carried bag slots
    fn check_quiver(&self, target: &Coordinate, instance: Option<InstanceId>, probe: &Probe) -> InventoryResult<()> {
        let slots = self.inventory.capacity(Container::BagSlots).unwrap_or(0);
        for slot in 0..slots {
            let coordinate = Coordinate::bag_slot(slot);
            if coordinate == *target {
                continue;
            }
            let Some(other) = self.occupant(&coordinate, probe) else {
                continue;
            };
            if Some(other.id) == instance {
                continue;
            }
            if self.item_type(other.item_type)?.is_ranged_container() {
                return Err(InventoryError::QuiverConflict);
            }
        }
        Ok(())
    }

    fn in_mode_domain(&self, coordinate: &Coordinate, mode: StoreMode) -> bool {
        let domain = self.inventory.domain(coordinate);
        match mode {
            StoreMode::CarriedAndBags => {
                matches!(coordinate.container, Container::MainPack | Container::BagSlots)
                    || matches!(coordinate.container, Container::Bag(_)) && domain == Domain::Carried
            }
            StoreMode::BankAndBankBags => {
                matches!(coordinate.container, Container::Bank | Container::BankBagSlots)
                    || matches!(coordinate.container, Container::Bag(_)) && domain == Domain::Bank
            }
            StoreMode::Equip(_) => {
                matches!(coordinate.container, Container::Equipment | Container::BagSlots)
            }
        }
    }

    fn domain_containers(&self, mode: StoreMode) -> (Container, Vec<InstanceId>) {
        match mode {
            StoreMode::BankAndBankBags => (
                Container::Bank,
                self.inventory.equipped_bags(Container::BankBagSlots),
            ),
            _ => (Container::MainPack, self.inventory.equipped_bags(Container::BagSlots)),
        }
    }

    fn coordinates(&self, container: Container) -> impl Iterator<Item = Coordinate> {
        let len = self.inventory.capacity(container).unwrap_or(0);
        (0..len).map(move |slot| Coordinate::new(container, slot))
    }

    fn merge_order(&self, mode: StoreMode) -> Vec<Coordinate> {
        let (flat, bags) = self.domain_containers(mode);
        let mut order: Vec<Coordinate> = self.coordinates(flat).collect();
        for bag in bags {
            order.extend(self.coordinates(Container::Bag(bag)));
        }
        order
    }

    fn empty_order(&self, item_type: &ItemType, mode: StoreMode) -> Vec<Coordinate> {
        let (flat, bags) = self.domain_containers(mode);
        let mut special = Vec::new();
        let mut generic = Vec::new();
        for bag in bags {
            let Ok(bag_type) = self.bag_type(bag) else {
                continue;
            };
            if bag_type.container_family.is_empty() {
                generic.extend(self.coordinates(Container::Bag(bag)));
            } else if bag_type.bag_accepts(item_type) {
                special.extend(self.coordinates(Container::Bag(bag)));
            }
        }
        special
            .into_iter()
            .chain(self.coordinates(flat))
            .chain(generic)
            .collect()
    }

    fn full_error(item_type: ItemTypeId, mode: StoreMode, unplaced: u32) -> InventoryError {
        if mode.is_bank() {
            InventoryError::BankFull { item_type, unplaced }
        } else {
            InventoryError::InventoryFull { item_type, unplaced }
        }
    }

    /// Plan storing `request.quantity` units of a type
    pub fn plan_store(&self, request: &StoreRequest, probe: &Probe) -> InventoryResult<StorePlan> {
        let item_type = self.item_type(request.item_type)?;
        if request.quantity == 0 {
            return Err(InventoryError::InvalidQuantity {
                requested: 0,
                available: item_type.stack_limit,
            });
        }
        if let StoreMode::Equip(hint) = request.mode {
            return self.plan_store_equip(&item_type, request, hint, probe);
        }

        let room = self.ownership_room(&item_type, request.already_owned, probe);
        let placeable = request.quantity.min(room);
        if placeable == 0 {
            return Err(InventoryError::OwnershipCapExceeded {
                item_type: item_type.id,
                placeable: 0,
            });
        }

        let mut plan = StorePlan::empty(item_type.id, request.bound_to, request.random_property);
        plan.unplaceable = request.quantity - placeable;
        let mut remaining = placeable;
        let mut taken: HashSet<Coordinate> = HashSet::new();
        let own_coordinate = request
            .instance
            .and_then(|id| self.inventory.get(id))
            .and_then(|inst| inst.coordinate);

        if let Some(preferred) = request.preferred {
            match self.reserve_preferred(&item_type, request, &preferred, remaining, probe) {
                Ok(Some(reservation)) => {
                    log::trace!("reserve {} x{} at preferred {}", item_type.id, reservation.count, preferred);
                    remaining -= reservation.count;
                    taken.insert(preferred);
                    plan.reservations.push(reservation);
                }
                Ok(None) => {}
                Err(err @ InventoryError::InvalidCoordinate { .. }) => return Err(err),
                Err(err) if request.exact => return Err(err),
                Err(err) => log::trace!("preferred {} skipped: {}", preferred, err),
            }

            if request.exact {
                return self.finish(plan, remaining, request);
            }
        }

        let usable = |coordinate: &Coordinate, taken: &HashSet<Coordinate>| {
            !taken.contains(coordinate) && !probe.is_claimed(coordinate) && Some(*coordinate) != own_coordinate
        };

        if request.merge && item_type.is_stackable() && remaining > 0 {
            for coordinate in self.merge_order(request.mode) {
                if remaining == 0 {
                    break;
                }
                if !usable(&coordinate, &taken) {
                    continue;
                }
                let Some(existing) = self.occupant(&coordinate, probe) else {
                    continue;
                };
                if Some(existing.id) == request.instance
                    || !existing.stacks_with(item_type.id, request.bound_to, request.random_property)
                {
                    continue;
                }
                let used = existing.count + probe.merged_into(&coordinate);
                let space = item_type.stack_limit.saturating_sub(used);
                if space == 0 {
                    continue;
                }
                let count = remaining.min(space);
                log::trace!("merge {} x{} into {}", item_type.id, count, coordinate);
                plan.reservations.push(Reservation {
                    coordinate,
                    count,
                    target: SlotTarget::Merge(existing.id),
                });
                taken.insert(coordinate);
                remaining -= count;
            }
        }

        if remaining > 0 {
            for coordinate in self.empty_order(&item_type, request.mode) {
                if remaining == 0 {
                    break;
                }
                if !usable(&coordinate, &taken) || self.occupant(&coordinate, probe).is_some() {
                    continue;
                }
                if self.accepts(&coordinate, &item_type, request.instance, probe).is_err() {
                    continue;
                }
                let count = remaining.min(item_type.stack_limit);
                log::trace!("reserve {} x{} at empty {}", item_type.id, count, coordinate);
                plan.reservations.push(Reservation {
                    coordinate,
                    count,
                    target: SlotTarget::Empty,
                });
                taken.insert(coordinate);
                remaining -= count;
            }
        }

        self.finish(plan, remaining, request)
    }

    fn finish(&self, mut plan: StorePlan, remaining: u32, request: &StoreRequest) -> InventoryResult<StorePlan> {
        if remaining == 0 {
            return Ok(plan);
        }
        if request.best_effort {
            plan.shortfall = remaining;
            return Ok(plan);
        }
        Err(Self::full_error(request.item_type, request.mode, remaining))
    }

    fn reserve_preferred(
        &self,
        item_type: &ItemType,
        request: &StoreRequest,
        coordinate: &Coordinate,
        remaining: u32,
        probe: &Probe,
    ) -> InventoryResult<Option<Reservation>> {
        if !self.inventory.contains_coordinate(coordinate) {
            return Err(InventoryError::InvalidCoordinate { coordinate: *coordinate });
        }
        if !self.in_mode_domain(coordinate, request.mode) {
            return Err(InventoryError::IncompatibleContainer { coordinate: *coordinate });
        }
        if probe.is_claimed(coordinate) {
            return Err(InventoryError::SlotOccupied { coordinate: *coordinate });
        }

        let Some(existing) = self.occupant(coordinate, probe) else {
            self.accepts(coordinate, item_type, request.instance, probe)?;
            return Ok(Some(Reservation {
                coordinate: *coordinate,
                count: remaining.min(item_type.stack_limit),
                target: SlotTarget::Empty,
            }));
        };

        if Some(existing.id) == request.instance {
            return Ok(None);
        }

        if item_type.is_stackable()
            && request.merge
            && existing.stacks_with(item_type.id, request.bound_to, request.random_property)
        {
            let used = existing.count + probe.merged_into(coordinate);
            let space = item_type.stack_limit.saturating_sub(used);
            if space > 0 {
                return Ok(Some(Reservation {
                    coordinate: *coordinate,
                    count: remaining.min(space),
                    target: SlotTarget::Merge(existing.id),
                }));
            }
        }

        if request.allow_swap {
            self.accepts(coordinate, item_type, request.instance, probe)?;
            return Ok(Some(Reservation {
                coordinate: *coordinate,
                count: remaining.min(item_type.stack_limit),
                target: SlotTarget::Displace(existing.id),
            }));
        }

        Err(InventoryError::SlotOccupied { coordinate: *coordinate })
    }

    /// Store planning in equip mode: a single unit into one equipment slot
    fn plan_store_equip(
        &self,
        item_type: &ItemType,
        request: &StoreRequest,
        hint: Option<EquipSlot>,
        probe: &Probe,
    ) -> InventoryResult<StorePlan> {
        if request.quantity != 1 {
            return Err(InventoryError::InvalidQuantity {
                requested: request.quantity,
                available: 1,
            });
        }
        self.check_requirements(item_type)?;
        if self.ownership_room(item_type, request.already_owned, probe) == 0 {
            return Err(InventoryError::OwnershipCapExceeded {
                item_type: item_type.id,
                placeable: 0,
            });
        }

        let candidates = self.equip_candidates(item_type, None);
        if candidates.is_empty() {
            return Err(InventoryError::NotEquippable { item_type: item_type.id });
        }
        let preferred = hint.map(Coordinate::equipment).or(request.preferred);
        let target = self.select_slot(&candidates, preferred, request.allow_swap, request.exact, probe)?;
        let occupant = self.occupant(&target, probe);
        let caps = self.inventory.capabilities();

        if target.is_bag_reference() && item_type.is_ranged_container() {
            self.check_quiver(&target, request.instance, probe)?;
        }
        if target.equip_slot() == Some(EquipSlot::MainHand) && item_type.two_handed() && !caps.titan_grip {
            if self.occupant(&Coordinate::equipment(EquipSlot::OffHand), probe).is_some() {
                return Err(InventoryError::CannotDisplaceOffhand);
            }
        }
        if target.equip_slot() == Some(EquipSlot::OffHand) && !caps.titan_grip {
            if let Some(main) = self.occupant(&Coordinate::equipment(EquipSlot::MainHand), probe) {
                if self.item_type(main.item_type)?.two_handed() {
                    return Err(InventoryError::CannotDisplaceMainhand);
                }
            }
        }
        let mut excluded: Vec<InstanceId> = occupant.iter().map(|o| o.id).collect();
        excluded.extend(request.instance);
        if target.is_equipment() {
            let mut incoming = vec![item_type.id];
            incoming.extend(request.gems.iter().copied());
            self.check_equip_limits(&incoming, &excluded, probe)?;
        }

        let mut plan = StorePlan::empty(item_type.id, request.bound_to, request.random_property);
        plan.reservations.push(Reservation {
            coordinate: target,
            count: 1,
            target: match occupant {
                Some(o) => SlotTarget::Displace(o.id),
                None => SlotTarget::Empty,
            },
        });
        Ok(plan)
    }

    fn check_requirements(&self, item_type: &ItemType) -> InventoryResult<()> {
        if !item_type.inventory_type.is_equippable() {
            return Err(InventoryError::NotEquippable { item_type: item_type.id });
        }
        let level = self.inventory.capabilities().level;
        if item_type.required_level > level {
            return Err(InventoryError::RequirementsNotMet {
                required: item_type.required_level,
                actual: level,
            });
        }
        Ok(())
    }

    /// Candidate coordinates for equipping a type, excluding `from`
    pub fn equip_candidates(&self, item_type: &ItemType, from: Option<Coordinate>) -> Vec<Coordinate> {
        let mut candidates: Vec<Coordinate> = if item_type.is_container() {
            self.coordinates(Container::BagSlots).collect()
        } else {
            candidate_slots(item_type.inventory_type, self.inventory.capabilities())
                .into_iter()
                .map(Coordinate::equipment)
                .collect()
        };
        candidates.retain(|c| Some(*c) != from);
        candidates
    }

    fn select_slot(
        &self,
        candidates: &[Coordinate],
        preferred: Option<Coordinate>,
        allow_swap: bool,
        exact: bool,
        probe: &Probe,
    ) -> InventoryResult<Coordinate> {
        let free = |c: &Coordinate| !probe.is_claimed(c) && self.occupant(c, probe).is_none();

        if let Some(preferred) = preferred {
            let is_candidate = candidates.contains(&preferred) && !probe.is_claimed(&preferred);
            if is_candidate && (free(&preferred) || allow_swap) {
                return Ok(preferred);
            }
            if exact {
                return Err(if is_candidate {
                    InventoryError::SlotOccupied { coordinate: preferred }
                } else {
                    InventoryError::IncompatibleContainer { coordinate: preferred }
                });
            }
        }

        if let Some(empty) = candidates.iter().find(|c| free(c)) {
            return Ok(*empty);
        }
        if allow_swap {
            if let Some(occupied) = candidates.iter().find(|c| !probe.is_claimed(c)) {
                return Ok(*occupied);
            }
        }
        Err(InventoryError::SlotOccupied { coordinate: candidates[0] })
    }

    /// Unique-equipped and equip-mode limit categories against equipped items
    /// only. `incoming` lists the item type followed by its socketed gems.
    fn check_equip_limits(&self, incoming: &[ItemTypeId], excluded: &[InstanceId], probe: &Probe) -> InventoryResult<()> {
        let mut equipped: Vec<ItemTypeId> = Vec::new();
        for slot in EquipSlot::ALL {
            let Some(item) = self.occupant(&Coordinate::equipment(slot), probe) else {
                continue;
            };
            if excluded.contains(&item.id) {
                continue;
            }
            equipped.push(item.item_type);
            equipped.extend(item.gems.iter().copied());
        }

        for type_id in incoming {
            let item_type = self.item_type(*type_id)?;
            if item_type.unique_equipped {
                let existing = equipped.iter().filter(|t| *t == type_id).count();
                let adding = incoming.iter().filter(|t| *t == type_id).count();
                if existing + adding > 1 {
                    return Err(InventoryError::AlreadyEquippedUnique { item_type: *type_id });
                }
            }

            if item_type.limit_category == 0 {
                continue;
            }
            let Some(category) = self
                .catalog
                .limit_category(item_type.limit_category)
                .filter(|c| c.mode == LimitMode::Equipped)
            else {
                continue;
            };
            let in_category = |t: &ItemTypeId| {
                self.catalog
                    .item_type(*t)
                    .map(|ty| ty.limit_category == category.id)
                    .unwrap_or(false)
            };
            let existing = equipped.iter().filter(|t| in_category(t)).count() as u32;
            let adding = incoming.iter().filter(|t| in_category(t)).count() as u32;
            if existing + adding > category.cap {
                return Err(InventoryError::AlreadyEquippedUnique { item_type: *type_id });
            }
        }
        Ok(())
    }

    /// Plan equipping an owned or detached-and-registered instance
    pub fn plan_equip(&self, request: &EquipRequest, probe: &Probe) -> InventoryResult<EquipPlan> {
        let inv = self.inventory;
        let instance = self.instance(request.instance)?;
        if !instance.usable_by(inv.owner()) {
            return Err(InventoryError::NotOwnedOrBound { instance: instance.id });
        }
        let item_type = self.item_type(instance.item_type)?;
        self.check_requirements(&item_type)?;
        if instance.count != 1 {
            return Err(InventoryError::InvalidQuantity {
                requested: instance.count,
                available: 1,
            });
        }

        let from = instance.coordinate;
        if let Some(from) = from {
            match inv.domain(&from) {
                Domain::Equipped | Domain::Carried => {}
                _ => return Err(InventoryError::IncompatibleContainer { coordinate: from }),
            }
        }

        let mut probe = probe.clone();
        if let Some(from) = from {
            probe.vacate(from);
        }

        let candidates = self.equip_candidates(&item_type, from);
        if candidates.is_empty() {
            return Err(InventoryError::NotEquippable { item_type: item_type.id });
        }
        let target = self.select_slot(&candidates, request.preferred, request.allow_swap, request.exact, &probe)?;
        let caps = *inv.capabilities();

        if target.is_bag_reference() && item_type.is_ranged_container() {
            self.check_quiver(&target, Some(instance.id), &probe)?;
        }

        let mut displaced: Vec<(&ItemInstance, Coordinate, DisplaceReason)> = Vec::new();
        if let Some(occupant) = self.occupant(&target, &probe) {
            displaced.push((occupant, target, DisplaceReason::Target));
        }
        match target.equip_slot() {
            Some(EquipSlot::MainHand) if item_type.two_handed() && !caps.titan_grip => {
                let off = Coordinate::equipment(EquipSlot::OffHand);
                if let Some(occupant) = self.occupant(&off, &probe) {
                    displaced.push((occupant, off, DisplaceReason::OffHand));
                }
            }
            Some(EquipSlot::OffHand) if !caps.titan_grip => {
                let main = Coordinate::equipment(EquipSlot::MainHand);
                if let Some(occupant) = self.occupant(&main, &probe) {
                    if self.item_type(occupant.item_type)?.two_handed() {
                        displaced.push((occupant, main, DisplaceReason::MainHand));
                    }
                }
            }
            _ => {}
        }

        if target.is_equipment() {
            let mut incoming = vec![instance.item_type];
            incoming.extend(instance.gems.iter().copied());
            let mut excluded: Vec<InstanceId> = displaced.iter().map(|(o, _, _)| o.id).collect();
            excluded.push(instance.id);
            self.check_equip_limits(&incoming, &excluded, &probe)?;
        }

        let mut leg_probe = probe.clone();
        leg_probe.claim(target);
        for (_, at, _) in &displaced {
            leg_probe.vacate(*at);
        }

        let mut legs = Vec::with_capacity(displaced.len());
        for (occupant, at, reason) in displaced {
            let plan = self
                .plan_displacement(occupant, reason, from, request.displace_to, &leg_probe)
                .map_err(|err| match reason {
                    DisplaceReason::OffHand => InventoryError::CannotDisplaceOffhand,
                    DisplaceReason::MainHand => InventoryError::CannotDisplaceMainhand,
                    DisplaceReason::Target => err,
                })?;
            let occupant_type = self.item_type(occupant.item_type)?;
            leg_probe.absorb(&plan, &occupant_type, 0);
            legs.push(Displacement {
                instance: occupant.id,
                from: at,
                plan,
            });
        }

        Ok(EquipPlan {
            instance: instance.id,
            from,
            target,
            displaced: legs,
            binds: item_type.binding == crate::item::BindingPolicy::OnEquip && instance.bound_to.is_none(),
        })
    }

    /// Where an occupant evicted by an equip goes
    fn plan_displacement(
        &self,
        occupant: &ItemInstance,
        reason: DisplaceReason,
        from: Option<Coordinate>,
        displace_to: Option<Coordinate>,
        probe: &Probe,
    ) -> InventoryResult<StorePlan> {
        let occupant_type = self.item_type(occupant.item_type)?;

        if reason == DisplaceReason::Target {
            if let Some(to) = displace_to {
                return self.plan_relocation(occupant, &occupant_type, to, true, probe);
            }
            if let Some(from) = from {
                // an equip swap between two equipment slots keeps both equipped
                if from.is_equipment() || from.is_bag_reference() {
                    if let Ok(plan) = self.plan_relocation(occupant, &occupant_type, from, true, probe) {
                        return Ok(plan);
                    }
                } else {
                    return self.plan_relocation(occupant, &occupant_type, from, false, probe);
                }
            }
        }

        let request = StoreRequest::for_instance(occupant, StoreMode::CarriedAndBags);
        self.plan_store(&request, probe)
    }

    fn plan_relocation(
        &self,
        occupant: &ItemInstance,
        occupant_type: &ItemType,
        to: Coordinate,
        exact: bool,
        probe: &Probe,
    ) -> InventoryResult<StorePlan> {
        if to.is_equipment() || to.is_bag_reference() && exact {
            if probe.is_claimed(&to) || self.occupant(&to, probe).is_some() {
                return Err(InventoryError::SlotOccupied { coordinate: to });
            }
            self.accepts(&to, occupant_type, Some(occupant.id), probe)?;
            let mut plan = StorePlan::empty(occupant.item_type, occupant.bound_to, occupant.random_property);
            plan.reservations.push(Reservation {
                coordinate: to,
                count: occupant.count,
                target: SlotTarget::Empty,
            });
            return Ok(plan);
        }

        let mode = StoreMode::for_coordinate(&to, self.inventory.domain(&to));
        let mut request = StoreRequest::for_instance(occupant, mode).with_preferred(Some(to));
        if exact {
            request = request.exact();
        }
        self.plan_store(&request, probe)
    }

    /// Plan several new items at once against a shared probe.
    ///
    /// With `best_effort`, items that do not fit report their shortfall instead
    /// of failing the whole check.
    pub fn plan_bulk(
        &self,
        items: &[(ItemTypeId, u32)],
        mode: StoreMode,
        best_effort: bool,
    ) -> InventoryResult<Vec<StorePlan>> {
        let mut probe = Probe::new();
        let mut plans = Vec::with_capacity(items.len());

        for (type_id, quantity) in items {
            let item_type = self.item_type(*type_id)?;
            let bound_to = self.binding_for_new(&item_type);
            let mut request = StoreRequest::new(*type_id, *quantity, mode).with_bound_to(bound_to);
            if best_effort {
                request = request.best_effort();
            }

            let plan = match self.plan_store(&request, &probe) {
                Ok(plan) => plan,
                Err(InventoryError::OwnershipCapExceeded { .. }) if best_effort => {
                    let mut plan = StorePlan::empty(*type_id, bound_to, 0);
                    plan.unplaceable = *quantity;
                    plan
                }
                Err(err) => return Err(err),
            };
            probe.absorb(&plan, &item_type, plan.planned());
            plans.push(plan);
        }
        Ok(plans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{LimitCategory, StaticCatalog};
    use crate::container::SlotLayout;
    use crate::equipment::Capabilities;
    use crate::item::{BagFamily, InventoryType};

    const CLOTH: u32 = 1;
    const RELIC: u32 = 2;
    const SHARD: u32 = 3;
    const POUCH: u32 = 4;
    const BAG: u32 = 5;
    const RING: u32 = 6;
    const GREATSWORD: u32 = 7;
    const SHIELD: u32 = 8;
    const TRINKET: u32 = 9;

    fn catalog() -> StaticCatalog {
        StaticCatalog::new()
            .with_item(ItemType::new(CLOTH, "Linen Cloth").with_stack_limit(20))
            .with_item(ItemType::new(RELIC, "Relic").with_max_owned(1))
            .with_item(ItemType::new(SHARD, "Soul Shard").with_bag_family(BagFamily::SOUL_SHARDS))
            .with_item(ItemType::new(POUCH, "Soul Pouch").as_bag(4, BagFamily::SOUL_SHARDS))
            .with_item(ItemType::new(BAG, "Linen Bag").as_bag(4, BagFamily::NONE))
            .with_item(ItemType::new(RING, "Band").with_inventory_type(InventoryType::Finger).unique_equipped())
            .with_item(ItemType::new(GREATSWORD, "Greatsword").with_inventory_type(InventoryType::TwoHandWeapon))
            .with_item(ItemType::new(SHIELD, "Buckler").with_inventory_type(InventoryType::Shield))
            .with_item(
                ItemType::new(TRINKET, "Medallion")
                    .with_inventory_type(InventoryType::Trinket)
                    .with_limit_category(3),
            )
            .with_limit_category(LimitCategory::new(3, 1, LimitMode::Equipped))
    }

    fn small_layout() -> SlotLayout {
        SlotLayout {
            bag_slots: 2,
            main_pack_slots: 2,
            bank_slots: 2,
            bank_bag_slots: 1,
            buyback_slots: 2,
        }
    }

    fn place(inv: &mut Inventory, catalog: &StaticCatalog, id: u64, item_type: u32, count: u32, at: Coordinate) {
        let slots = catalog.item_type(ItemTypeId(item_type)).unwrap().container_slots;
        inv.adopt(ItemInstance::new(InstanceId(id), ItemTypeId(item_type), count), slots);
        inv.attach(InstanceId(id), at);
    }

    #[test]
    fn test_spill_across_empty_slots() {
        let catalog = catalog();
        let inv = Inventory::new(OwnerId(1), small_layout());
        let planner = PlacementPlanner::new(&inv, &catalog);

        let request = StoreRequest::new(ItemTypeId(CLOTH), 25, StoreMode::CarriedAndBags);
        let plan = planner.plan_store(&request, &Probe::new()).unwrap();

        assert_eq!(
            plan.destinations(),
            vec![(Coordinate::pack(0), 20), (Coordinate::pack(1), 5)]
        );
        assert_eq!(plan.unplaceable, 0);
    }

    #[test]
    fn test_merge_before_empty() {
        let catalog = catalog();
        let mut inv = Inventory::new(OwnerId(1), small_layout());
        place(&mut inv, &catalog, 1, CLOTH, 15, Coordinate::pack(1));
        let planner = PlacementPlanner::new(&inv, &catalog);

        let request = StoreRequest::new(ItemTypeId(CLOTH), 8, StoreMode::CarriedAndBags);
        let plan = planner.plan_store(&request, &Probe::new()).unwrap();

        assert_eq!(plan.reservations[0].target, SlotTarget::Merge(InstanceId(1)));
        assert_eq!(
            plan.destinations(),
            vec![(Coordinate::pack(1), 5), (Coordinate::pack(0), 3)]
        );
    }

    #[test]
    fn test_full_is_all_or_nothing() {
        let catalog = catalog();
        let inv = Inventory::new(OwnerId(1), small_layout());
        let planner = PlacementPlanner::new(&inv, &catalog);

        let request = StoreRequest::new(ItemTypeId(CLOTH), 41, StoreMode::CarriedAndBags);
        assert_eq!(
            planner.plan_store(&request, &Probe::new()),
            Err(InventoryError::InventoryFull {
                item_type: ItemTypeId(CLOTH),
                unplaced: 1
            })
        );

        let partial = planner
            .plan_store(&request.clone().best_effort(), &Probe::new())
            .unwrap();
        assert_eq!(partial.planned(), 40);
        assert_eq!(partial.shortfall, 1);
    }

    #[test]
    fn test_owned_cap_counts_bank() {
        let catalog = catalog();
        let mut inv = Inventory::new(OwnerId(1), small_layout());
        place(&mut inv, &catalog, 1, RELIC, 1, Coordinate::bank(0));
        let planner = PlacementPlanner::new(&inv, &catalog);

        let request = StoreRequest::new(ItemTypeId(RELIC), 1, StoreMode::CarriedAndBags);
        assert_eq!(
            planner.plan_store(&request, &Probe::new()),
            Err(InventoryError::OwnershipCapExceeded {
                item_type: ItemTypeId(RELIC),
                placeable: 0
            })
        );
    }

    #[test]
    fn test_cap_shortfall_reported_as_unplaceable() {
        let catalog = StaticCatalog::new().with_item(ItemType::new(40, "Token").with_stack_limit(10).with_max_owned(5));
        let mut inv = Inventory::new(OwnerId(1), small_layout());
        place(&mut inv, &catalog, 1, 40, 2, Coordinate::pack(0));
        let planner = PlacementPlanner::new(&inv, &catalog);

        let plan = planner
            .plan_store(&StoreRequest::new(ItemTypeId(40), 6, StoreMode::CarriedAndBags), &Probe::new())
            .unwrap();
        assert_eq!(plan.planned(), 3);
        assert_eq!(plan.unplaceable, 3);
    }

    #[test]
    fn test_special_bag_preferred_for_empty_slots() {
        let catalog = catalog();
        let mut inv = Inventory::new(OwnerId(1), small_layout());
        place(&mut inv, &catalog, 10, BAG, 1, Coordinate::bag_slot(0));
        place(&mut inv, &catalog, 11, POUCH, 1, Coordinate::bag_slot(1));
        let planner = PlacementPlanner::new(&inv, &catalog);

        let shard = planner
            .plan_store(&StoreRequest::new(ItemTypeId(SHARD), 1, StoreMode::CarriedAndBags), &Probe::new())
            .unwrap();
        assert_eq!(shard.destinations(), vec![(Coordinate::bag(InstanceId(11), 0), 1)]);

        let cloth = planner
            .plan_store(&StoreRequest::new(ItemTypeId(CLOTH), 60, StoreMode::CarriedAndBags), &Probe::new())
            .unwrap();
        assert_eq!(cloth.reservations[0].coordinate, Coordinate::pack(0));
        assert_eq!(cloth.reservations[2].coordinate, Coordinate::bag(InstanceId(10), 0));
        assert!(cloth
            .reservations
            .iter()
            .all(|r| r.coordinate.container != Container::Bag(InstanceId(11))));
    }

    #[test]
    fn test_preferred_incompatible_falls_through() {
        let catalog = catalog();
        let mut inv = Inventory::new(OwnerId(1), small_layout());
        place(&mut inv, &catalog, 11, POUCH, 1, Coordinate::bag_slot(0));
        let planner = PlacementPlanner::new(&inv, &catalog);

        let request = StoreRequest::new(ItemTypeId(CLOTH), 1, StoreMode::CarriedAndBags)
            .with_preferred(Some(Coordinate::bag(InstanceId(11), 0)));
        let plan = planner.plan_store(&request, &Probe::new()).unwrap();
        assert_eq!(plan.destinations(), vec![(Coordinate::pack(0), 1)]);

        let exact = request.exact();
        assert_eq!(
            planner.plan_store(&exact, &Probe::new()),
            Err(InventoryError::IncompatibleContainer {
                coordinate: Coordinate::bag(InstanceId(11), 0)
            })
        );
    }

    #[test]
    fn test_preferred_occupied_with_swap_reports_displacement() {
        let catalog = catalog();
        let mut inv = Inventory::new(OwnerId(1), small_layout());
        place(&mut inv, &catalog, 1, RELIC, 1, Coordinate::pack(0));
        let planner = PlacementPlanner::new(&inv, &catalog);

        let request = StoreRequest::new(ItemTypeId(CLOTH), 3, StoreMode::CarriedAndBags)
            .with_preferred(Some(Coordinate::pack(0)))
            .with_allow_swap(true)
            .exact();
        let plan = planner.plan_store(&request, &Probe::new()).unwrap();
        assert_eq!(plan.displaced(), Some(InstanceId(1)));
    }

    #[test]
    fn test_probe_claims_separate_legs() {
        let catalog = catalog();
        let inv = Inventory::new(OwnerId(1), small_layout());
        let planner = PlacementPlanner::new(&inv, &catalog);

        let plans = planner
            .plan_bulk(
                &[(ItemTypeId(CLOTH), 20), (ItemTypeId(SHARD), 1), (ItemTypeId(SHARD), 1)],
                StoreMode::CarriedAndBags,
                true,
            )
            .unwrap();

        assert_eq!(plans[0].destinations(), vec![(Coordinate::pack(0), 20)]);
        assert_eq!(plans[1].destinations(), vec![(Coordinate::pack(1), 1)]);
        assert_eq!(plans[2].shortfall, 1);
    }

    #[test]
    fn test_bulk_respects_cap_across_entries() {
        let catalog = catalog();
        let inv = Inventory::new(OwnerId(1), small_layout());
        let planner = PlacementPlanner::new(&inv, &catalog);

        let result = planner.plan_bulk(
            &[(ItemTypeId(RELIC), 1), (ItemTypeId(RELIC), 1)],
            StoreMode::CarriedAndBags,
            false,
        );
        assert!(matches!(result, Err(InventoryError::OwnershipCapExceeded { .. })));
    }

    #[test]
    fn test_equip_prefers_empty_ring_slot() {
        let catalog = catalog();
        let mut inv = Inventory::new(OwnerId(1), small_layout());
        place(&mut inv, &catalog, 1, RING, 1, Coordinate::pack(0));
        let planner = PlacementPlanner::new(&inv, &catalog);

        let plan = planner.plan_equip(&EquipRequest::new(InstanceId(1)), &Probe::new()).unwrap();
        assert_eq!(plan.target, Coordinate::equipment(EquipSlot::Finger1));
        assert!(plan.displaced.is_empty());
    }

    #[test]
    fn test_unique_equipped_rejected() {
        let catalog = catalog();
        let mut inv = Inventory::new(OwnerId(1), small_layout());
        place(&mut inv, &catalog, 1, RING, 1, Coordinate::equipment(EquipSlot::Finger1));
        place(&mut inv, &catalog, 2, RING, 1, Coordinate::pack(0));
        let planner = PlacementPlanner::new(&inv, &catalog);

        assert_eq!(
            planner.plan_equip(&EquipRequest::new(InstanceId(2)), &Probe::new()),
            Err(InventoryError::AlreadyEquippedUnique { item_type: ItemTypeId(RING) })
        );

        // replacing the equipped copy is fine
        let swap = EquipRequest::new(InstanceId(2))
            .with_preferred(Some(Coordinate::equipment(EquipSlot::Finger1)))
            .with_allow_swap(true);
        let plan = planner.plan_equip(&swap, &Probe::new()).unwrap();
        assert_eq!(plan.displaced[0].plan.destinations(), vec![(Coordinate::pack(0), 1)]);
    }

    #[test]
    fn test_unique_gem_counts_as_occupant() {
        let catalog = catalog()
            .with_item(ItemType::new(50, "Prismatic Gem").unique_equipped())
            .with_item(ItemType::new(51, "Helm").with_inventory_type(InventoryType::Head))
            .with_item(ItemType::new(52, "Boots").with_inventory_type(InventoryType::Feet));
        let mut inv = Inventory::new(OwnerId(1), small_layout());
        inv.adopt(ItemInstance::new(InstanceId(1), ItemTypeId(51), 1).with_gem(ItemTypeId(50)), 0);
        inv.attach(InstanceId(1), Coordinate::equipment(EquipSlot::Head));
        inv.adopt(ItemInstance::new(InstanceId(2), ItemTypeId(52), 1).with_gem(ItemTypeId(50)), 0);
        inv.attach(InstanceId(2), Coordinate::pack(0));
        let planner = PlacementPlanner::new(&inv, &catalog);

        assert_eq!(
            planner.plan_equip(&EquipRequest::new(InstanceId(2)), &Probe::new()),
            Err(InventoryError::AlreadyEquippedUnique { item_type: ItemTypeId(50) })
        );
    }

    #[test]
    fn test_equip_limit_category() {
        let catalog = catalog().with_item(
            ItemType::new(60, "Other Medallion")
                .with_inventory_type(InventoryType::Trinket)
                .with_limit_category(3),
        );
        let mut inv = Inventory::new(OwnerId(1), small_layout());
        place(&mut inv, &catalog, 1, TRINKET, 1, Coordinate::equipment(EquipSlot::Trinket1));
        place(&mut inv, &catalog, 2, 60, 1, Coordinate::pack(0));
        let planner = PlacementPlanner::new(&inv, &catalog);

        assert_eq!(
            planner.plan_equip(&EquipRequest::new(InstanceId(2)), &Probe::new()),
            Err(InventoryError::AlreadyEquippedUnique { item_type: ItemTypeId(60) })
        );
    }

    #[test]
    fn test_two_hander_displaces_offhand() {
        let catalog = catalog();
        let mut inv = Inventory::new(OwnerId(1), small_layout());
        place(&mut inv, &catalog, 1, SHIELD, 1, Coordinate::equipment(EquipSlot::OffHand));
        place(&mut inv, &catalog, 2, GREATSWORD, 1, Coordinate::pack(0));
        let planner = PlacementPlanner::new(&inv, &catalog);

        let plan = planner.plan_equip(&EquipRequest::new(InstanceId(2)), &Probe::new()).unwrap();
        assert_eq!(plan.target, Coordinate::equipment(EquipSlot::MainHand));
        assert_eq!(plan.displaced.len(), 1);
        assert_eq!(plan.displaced[0].instance, InstanceId(1));
        // the greatsword's old slot is free for the shield
        assert_eq!(plan.displaced[0].plan.destinations(), vec![(Coordinate::pack(0), 1)]);
    }

    #[test]
    fn test_two_hander_blocked_when_offhand_cannot_move() {
        let catalog = catalog();
        let mut inv = Inventory::new(OwnerId(1), small_layout());
        place(&mut inv, &catalog, 1, SHIELD, 1, Coordinate::equipment(EquipSlot::OffHand));
        place(&mut inv, &catalog, 2, CLOTH, 20, Coordinate::pack(0));
        place(&mut inv, &catalog, 3, CLOTH, 20, Coordinate::pack(1));
        inv.adopt(ItemInstance::new(InstanceId(4), ItemTypeId(GREATSWORD), 1), 0);
        let planner = PlacementPlanner::new(&inv, &catalog);

        assert_eq!(
            planner.plan_equip(&EquipRequest::new(InstanceId(4)), &Probe::new()),
            Err(InventoryError::CannotDisplaceOffhand)
        );
    }

    #[test]
    fn test_titan_grip_keeps_offhand() {
        let catalog = catalog();
        let mut inv = Inventory::new(OwnerId(1), small_layout())
            .with_capabilities(Capabilities::default().with_titan_grip());
        place(&mut inv, &catalog, 1, SHIELD, 1, Coordinate::equipment(EquipSlot::OffHand));
        place(&mut inv, &catalog, 2, GREATSWORD, 1, Coordinate::pack(0));
        let planner = PlacementPlanner::new(&inv, &catalog);

        let plan = planner.plan_equip(&EquipRequest::new(InstanceId(2)), &Probe::new()).unwrap();
        assert!(plan.displaced.is_empty());
    }

    #[test]
    fn test_offhand_blocked_when_two_hander_cannot_move() {
        let catalog = catalog();
        let mut inv = Inventory::new(OwnerId(1), small_layout());
        place(&mut inv, &catalog, 1, GREATSWORD, 1, Coordinate::equipment(EquipSlot::MainHand));
        place(&mut inv, &catalog, 2, CLOTH, 20, Coordinate::pack(0));
        place(&mut inv, &catalog, 3, CLOTH, 20, Coordinate::pack(1));
        inv.adopt(ItemInstance::new(InstanceId(4), ItemTypeId(SHIELD), 1), 0);
        let planner = PlacementPlanner::new(&inv, &catalog);

        assert_eq!(
            planner.plan_equip(&EquipRequest::new(InstanceId(4)), &Probe::new()),
            Err(InventoryError::CannotDisplaceMainhand)
        );
    }

    #[test]
    fn test_temporary_loot_not_equippable() {
        let catalog = catalog();
        let mut inv = Inventory::new(OwnerId(1), small_layout());
        inv.adopt(ItemInstance::new(InstanceId(1), ItemTypeId(SHIELD), 1).temporary(), 0);
        let planner = PlacementPlanner::new(&inv, &catalog);

        assert_eq!(
            planner.plan_equip(&EquipRequest::new(InstanceId(1)), &Probe::new()),
            Err(InventoryError::NotOwnedOrBound { instance: InstanceId(1) })
        );
    }

    #[test]
    fn test_quiver_singularity() {
        let catalog = catalog()
            .with_item(
                ItemType::new(70, "Quiver")
                    .with_inventory_type(InventoryType::Quiver)
                    .as_bag(4, BagFamily::ARROWS),
            )
            .with_item(
                ItemType::new(71, "Ammo Pouch")
                    .with_inventory_type(InventoryType::Quiver)
                    .as_bag(4, BagFamily::BULLETS),
            );
        let mut inv = Inventory::new(OwnerId(1), small_layout());
        place(&mut inv, &catalog, 1, 70, 1, Coordinate::bag_slot(0));
        place(&mut inv, &catalog, 2, 71, 1, Coordinate::pack(0));
        let planner = PlacementPlanner::new(&inv, &catalog);

        assert_eq!(
            planner.plan_equip(&EquipRequest::new(InstanceId(2)), &Probe::new()),
            Err(InventoryError::QuiverConflict)
        );

        // replacing the equipped quiver itself is allowed
        let replace = EquipRequest::new(InstanceId(2))
            .with_preferred(Some(Coordinate::bag_slot(0)))
            .with_allow_swap(true)
            .exact();
        let plan = planner.plan_equip(&replace, &Probe::new()).unwrap();
        assert_eq!(plan.target, Coordinate::bag_slot(0));
    }

    #[test]
    fn test_bag_cannot_enter_itself() {
        let catalog = catalog();
        let mut inv = Inventory::new(OwnerId(1), small_layout());
        place(&mut inv, &catalog, 10, BAG, 1, Coordinate::bag_slot(0));
        let planner = PlacementPlanner::new(&inv, &catalog);
        let bag_type = catalog.item_type(ItemTypeId(BAG)).unwrap();

        assert_eq!(
            planner.accepts(&Coordinate::bag(InstanceId(10), 0), &bag_type, Some(InstanceId(10)), &Probe::new()),
            Err(InventoryError::IncompatibleContainer {
                coordinate: Coordinate::bag(InstanceId(10), 0)
            })
        );
    }
}
