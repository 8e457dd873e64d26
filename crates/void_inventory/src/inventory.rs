//! Character inventory state
//!
//! [`Inventory`] owns every [`ItemInstance`] a character holds and the slot
//! maps of each container. It only exposes read access publicly; mutation goes
//! through the allocation executor, which keeps the instance coordinate and
//! the container slot map in step.

use crate::catalog::{ItemCatalog, LimitMode};
use crate::container::{Container, Coordinate, Domain, SlotLayout};
use crate::equipment::{Capabilities, EquipSlot};
use crate::item::{InstanceId, ItemInstance, ItemTypeId, OwnerId};
use crate::persist::ItemRecord;
use std::collections::BTreeMap;

/// All items of one character
#[derive(Debug, Clone)]
pub struct Inventory {
    owner: OwnerId,
    layout: SlotLayout,
    capabilities: Capabilities,
    instances: BTreeMap<InstanceId, ItemInstance>,
    equipment: Vec<Option<InstanceId>>,
    bag_slots: Vec<Option<InstanceId>>,
    main_pack: Vec<Option<InstanceId>>,
    bank: Vec<Option<InstanceId>>,
    bank_bag_slots: Vec<Option<InstanceId>>,
    buyback: Vec<Option<InstanceId>>,
    /// Contents of every bag instance, keyed by the bag's id
    bags: BTreeMap<InstanceId, Vec<Option<InstanceId>>>,
    /// Rows to delete on the next save
    destroyed: Vec<ItemRecord>,
}

impl Inventory {
    /// Create an empty inventory
    pub fn new(owner: OwnerId, layout: SlotLayout) -> Self {
        Self {
            owner,
            layout,
            capabilities: Capabilities::default(),
            instances: BTreeMap::new(),
            equipment: vec![None; EquipSlot::COUNT],
            bag_slots: vec![None; layout.bag_slots as usize],
            main_pack: vec![None; layout.main_pack_slots as usize],
            bank: vec![None; layout.bank_slots as usize],
            bank_bag_slots: vec![None; layout.bank_bag_slots as usize],
            buyback: vec![None; layout.buyback_slots as usize],
            bags: BTreeMap::new(),
            destroyed: Vec::new(),
        }
    }

    /// Set character capabilities
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn set_capabilities(&mut self, capabilities: Capabilities) {
        self.capabilities = capabilities;
    }

    /// Look up an instance
    pub fn get(&self, id: InstanceId) -> Option<&ItemInstance> {
        self.instances.get(&id)
    }

    /// Number of instances held
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// All instances, ordered by id
    pub fn items(&self) -> impl Iterator<Item = &ItemInstance> {
        self.instances.values()
    }

    /// Slot map of a container
    pub fn slots(&self, container: Container) -> Option<&[Option<InstanceId>]> {
        match container {
            Container::Equipment => Some(&self.equipment),
            Container::BagSlots => Some(&self.bag_slots),
            Container::MainPack => Some(&self.main_pack),
            Container::Bank => Some(&self.bank),
            Container::BankBagSlots => Some(&self.bank_bag_slots),
            Container::Buyback => Some(&self.buyback),
            Container::Bag(id) => self.bags.get(&id).map(|v| v.as_slice()),
        }
    }

    /// Number of slots in a container
    pub fn capacity(&self, container: Container) -> Option<u16> {
        self.slots(container).map(|s| s.len() as u16)
    }

    /// Instance id at a coordinate
    pub fn occupant(&self, coordinate: &Coordinate) -> Option<InstanceId> {
        self.slots(coordinate.container)?
            .get(coordinate.slot as usize)
            .copied()
            .flatten()
    }

    /// Instance at a coordinate
    pub fn item_at(&self, coordinate: &Coordinate) -> Option<&ItemInstance> {
        self.occupant(coordinate).and_then(|id| self.instances.get(&id))
    }

    /// Equipped item in a slot
    pub fn equipped(&self, slot: EquipSlot) -> Option<&ItemInstance> {
        self.item_at(&Coordinate::equipment(slot))
    }

    /// Check if a coordinate exists in this inventory
    pub fn contains_coordinate(&self, coordinate: &Coordinate) -> bool {
        self.slots(coordinate.container)
            .map(|s| (coordinate.slot as usize) < s.len())
            .unwrap_or(false)
    }

    /// Where a bag instance currently sits, if it is a known bag
    pub fn bag_location(&self, bag: InstanceId) -> Option<Coordinate> {
        if !self.bags.contains_key(&bag) {
            return None;
        }
        self.instances.get(&bag)?.coordinate
    }

    /// Domain a coordinate belongs to
    pub fn domain(&self, coordinate: &Coordinate) -> Domain {
        match coordinate.container {
            Container::Equipment => Domain::Equipped,
            Container::BagSlots | Container::MainPack => Domain::Carried,
            Container::Bank | Container::BankBagSlots => Domain::Bank,
            Container::Buyback => Domain::Buyback,
            Container::Bag(bag) => match self.bag_location(bag).map(|c| c.container) {
                Some(Container::BagSlots) => Domain::Carried,
                Some(Container::BankBagSlots) => Domain::Bank,
                _ => Domain::Inactive,
            },
        }
    }

    /// Check if `bag` is a bag instance with at least one item inside
    pub fn bag_has_contents(&self, bag: InstanceId) -> bool {
        self.bags
            .get(&bag)
            .map(|slots| slots.iter().any(Option::is_some))
            .unwrap_or(false)
    }

    /// Items inside a bag, in slot order
    pub fn bag_contents(&self, bag: InstanceId) -> Vec<&ItemInstance> {
        self.bags
            .get(&bag)
            .map(|slots| {
                slots
                    .iter()
                    .flatten()
                    .filter_map(|id| self.instances.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Bags equipped in a bag-reference container, in slot order
    pub fn equipped_bags(&self, reference: Container) -> Vec<InstanceId> {
        let slots = match reference {
            Container::BagSlots => &self.bag_slots,
            Container::BankBagSlots => &self.bank_bag_slots,
            _ => return Vec::new(),
        };
        slots
            .iter()
            .flatten()
            .filter(|id| self.bags.contains_key(id))
            .copied()
            .collect()
    }

    /// Every coordinate in canonical scan order: equipment, bag slots, main
    /// pack, carried bags in slot order, bank, bank bag slots, bank bags,
    /// buyback.
    pub fn scan_order(&self) -> Vec<Coordinate> {
        let mut containers = vec![Container::Equipment, Container::BagSlots, Container::MainPack];
        containers.extend(self.equipped_bags(Container::BagSlots).into_iter().map(Container::Bag));
        containers.push(Container::Bank);
        containers.push(Container::BankBagSlots);
        containers.extend(self.equipped_bags(Container::BankBagSlots).into_iter().map(Container::Bag));
        containers.push(Container::Buyback);

        containers
            .into_iter()
            .flat_map(|container| {
                let len = self.capacity(container).unwrap_or(0);
                (0..len).map(move |slot| Coordinate::new(container, slot))
            })
            .collect()
    }

    /// Placed instances in canonical scan order
    pub fn placed_in_order(&self) -> Vec<&ItemInstance> {
        self.scan_order()
            .iter()
            .filter_map(|c| self.item_at(c))
            .collect()
    }

    /// Units of a type owned (equipped, carried and bank; buyback excluded)
    pub fn owned_count(&self, item_type: ItemTypeId) -> u32 {
        self.sum_where(|inst, domain| inst.item_type == item_type && domain.is_owned())
    }

    /// Units of a type carried or equipped, optionally including the bank
    pub fn count_of(&self, item_type: ItemTypeId, include_bank: bool) -> u32 {
        self.sum_where(|inst, domain| {
            inst.item_type == item_type
                && match domain {
                    Domain::Equipped | Domain::Carried => true,
                    Domain::Bank => include_bank,
                    _ => false,
                }
        })
    }

    /// Units owned across every type sharing an owned-mode limit category
    pub fn category_owned_count(&self, catalog: &dyn ItemCatalog, category: u32) -> u32 {
        self.sum_where(|inst, domain| {
            domain.is_owned()
                && catalog
                    .item_type(inst.item_type)
                    .map(|t| t.limit_category == category)
                    .unwrap_or(false)
        })
    }

    fn sum_where(&self, mut pred: impl FnMut(&ItemInstance, Domain) -> bool) -> u32 {
        self.instances
            .values()
            .filter_map(|inst| {
                let domain = self.domain(&inst.coordinate?);
                pred(inst, domain).then_some(inst.count)
            })
            .sum()
    }

    /// Check an owned-mode limit category exists for `category`
    pub fn is_owned_category(catalog: &dyn ItemCatalog, category: u32) -> bool {
        category != 0
            && catalog
                .limit_category(category)
                .map(|c| c.mode == LimitMode::Owned)
                .unwrap_or(false)
    }

    /// Rows to delete on the next save
    pub fn destroyed_records(&self) -> &[ItemRecord] {
        &self.destroyed
    }

    // ---- mutation primitives used by the executor ----

    pub(crate) fn slot_mut(&mut self, coordinate: &Coordinate) -> Option<&mut Option<InstanceId>> {
        let slots = match coordinate.container {
            Container::Equipment => &mut self.equipment,
            Container::BagSlots => &mut self.bag_slots,
            Container::MainPack => &mut self.main_pack,
            Container::Bank => &mut self.bank,
            Container::BankBagSlots => &mut self.bank_bag_slots,
            Container::Buyback => &mut self.buyback,
            Container::Bag(id) => self.bags.get_mut(&id)?,
        };
        slots.get_mut(coordinate.slot as usize)
    }

    pub(crate) fn get_mut(&mut self, id: InstanceId) -> Option<&mut ItemInstance> {
        self.instances.get_mut(&id)
    }

    /// Register a detached instance
    pub(crate) fn adopt(&mut self, mut instance: ItemInstance, container_slots: u16) {
        instance.coordinate = None;
        if container_slots > 0 {
            self.bags
                .entry(instance.id)
                .or_insert_with(|| vec![None; container_slots as usize]);
        }
        self.instances.insert(instance.id, instance);
    }

    /// Place a registered, detached instance into an empty slot
    pub(crate) fn attach(&mut self, id: InstanceId, coordinate: Coordinate) {
        if let Some(slot) = self.slot_mut(&coordinate) {
            *slot = Some(id);
        }
        if let Some(inst) = self.instances.get_mut(&id) {
            inst.coordinate = Some(coordinate);
            inst.persistence = inst.persistence.touched();
        }
    }

    /// Clear an instance's slot, keeping it registered
    pub(crate) fn detach(&mut self, id: InstanceId) {
        let coordinate = self.instances.get(&id).and_then(|i| i.coordinate);
        if let Some(coordinate) = coordinate {
            if let Some(slot) = self.slot_mut(&coordinate) {
                if *slot == Some(id) {
                    *slot = None;
                }
            }
        }
        if let Some(inst) = self.instances.get_mut(&id) {
            inst.coordinate = None;
        }
    }

    /// Unregister a detached instance and hand it back
    pub(crate) fn release(&mut self, id: InstanceId) -> Option<ItemInstance> {
        self.bags.remove(&id);
        self.instances.remove(&id)
    }

    pub(crate) fn record_destroyed(&mut self, record: ItemRecord) {
        self.destroyed.push(record);
    }

    pub(crate) fn clear_destroyed(&mut self) {
        self.destroyed.clear();
    }
}
