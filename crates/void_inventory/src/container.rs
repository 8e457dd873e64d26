//! Containers, coordinates and the player slot layout

use crate::equipment::EquipSlot;
use crate::item::InstanceId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A slot space an item can be placed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Container {
    /// Equipped items
    Equipment,
    /// Equipped carried bags
    BagSlots,
    /// Backpack
    MainPack,
    /// Contents of a bag instance
    Bag(InstanceId),
    /// Bank item slots
    Bank,
    /// Equipped bank bags
    BankBagSlots,
    /// Recently sold items
    Buyback,
}

impl Container {
    /// Check if items here hold bags whose contents are addressable
    pub fn is_bag_reference(&self) -> bool {
        matches!(self, Self::BagSlots | Self::BankBagSlots)
    }

    /// Persisted container id (0 = player slot space)
    pub fn persisted_id(&self) -> u64 {
        match self {
            Self::Bag(id) => id.0,
            _ => 0,
        }
    }
}

/// Placement of an item: container plus slot index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    pub container: Container,
    pub slot: u16,
}

impl Coordinate {
    pub const fn new(container: Container, slot: u16) -> Self {
        Self { container, slot }
    }

    pub fn equipment(slot: EquipSlot) -> Self {
        Self::new(Container::Equipment, slot.index())
    }

    pub const fn bag_slot(slot: u16) -> Self {
        Self::new(Container::BagSlots, slot)
    }

    pub const fn pack(slot: u16) -> Self {
        Self::new(Container::MainPack, slot)
    }

    pub const fn bag(bag: InstanceId, slot: u16) -> Self {
        Self::new(Container::Bag(bag), slot)
    }

    pub const fn bank(slot: u16) -> Self {
        Self::new(Container::Bank, slot)
    }

    pub const fn bank_bag_slot(slot: u16) -> Self {
        Self::new(Container::BankBagSlots, slot)
    }

    pub const fn buyback(slot: u16) -> Self {
        Self::new(Container::Buyback, slot)
    }

    /// Equipment slot, if this is an equipment coordinate
    pub fn equip_slot(&self) -> Option<EquipSlot> {
        match self.container {
            Container::Equipment => EquipSlot::from_index(self.slot),
            _ => None,
        }
    }

    pub fn is_equipment(&self) -> bool {
        self.container == Container::Equipment
    }

    /// Check if this is a bag-reference slot (carried or bank)
    pub fn is_bag_reference(&self) -> bool {
        self.container.is_bag_reference()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.container {
            Container::Equipment => match EquipSlot::from_index(self.slot) {
                Some(slot) => write!(f, "equip:{}", slot),
                None => write!(f, "equip:{}", self.slot),
            },
            Container::BagSlots => write!(f, "bagslot:{}", self.slot),
            Container::MainPack => write!(f, "pack:{}", self.slot),
            Container::Bag(id) => write!(f, "bag#{}:{}", id.0, self.slot),
            Container::Bank => write!(f, "bank:{}", self.slot),
            Container::BankBagSlots => write!(f, "bankbagslot:{}", self.slot),
            Container::Buyback => write!(f, "buyback:{}", self.slot),
        }
    }
}

/// Which part of the character's possessions a coordinate belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Equipped,
    Carried,
    Bank,
    Buyback,
    /// Contents of a bag that is not itself in a bag slot
    Inactive,
}

impl Domain {
    /// Check if items in this domain count as owned
    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Equipped | Self::Carried | Self::Bank)
    }
}

/// Destination domain for store planning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreMode {
    /// Main pack and equipped bags
    CarriedAndBags,
    /// Bank slots and bank bags
    BankAndBankBags,
    /// Equipment, optionally hinting a slot
    Equip(Option<EquipSlot>),
}

impl StoreMode {
    /// Mode whose domain contains `coordinate`
    pub fn for_coordinate(coordinate: &Coordinate, domain: Domain) -> Self {
        match coordinate.container {
            Container::Equipment => Self::Equip(coordinate.equip_slot()),
            Container::Bank | Container::BankBagSlots => Self::BankAndBankBags,
            Container::Bag(_) if domain == Domain::Bank => Self::BankAndBankBags,
            _ => Self::CarriedAndBags,
        }
    }

    /// Check if this mode targets the bank
    pub fn is_bank(&self) -> bool {
        matches!(self, Self::BankAndBankBags)
    }
}

/// Sizes of the player's fixed slot ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotLayout {
    pub bag_slots: u16,
    pub main_pack_slots: u16,
    pub bank_slots: u16,
    pub bank_bag_slots: u16,
    pub buyback_slots: u16,
}

impl SlotLayout {
    /// Capacity of a fixed container (bags are sized by their item type)
    pub fn capacity(&self, container: Container) -> Option<u16> {
        match container {
            Container::Equipment => Some(EquipSlot::COUNT as u16),
            Container::BagSlots => Some(self.bag_slots),
            Container::MainPack => Some(self.main_pack_slots),
            Container::Bank => Some(self.bank_slots),
            Container::BankBagSlots => Some(self.bank_bag_slots),
            Container::Buyback => Some(self.buyback_slots),
            Container::Bag(_) => None,
        }
    }

    /// Total number of flat player slots
    pub fn total_slots(&self) -> u32 {
        EquipSlot::COUNT as u32
            + self.bag_slots as u32
            + self.main_pack_slots as u32
            + self.bank_slots as u32
            + self.bank_bag_slots as u32
            + self.buyback_slots as u32
    }

    fn ranges(&self) -> [(Container, u16); 6] {
        [
            (Container::Equipment, EquipSlot::COUNT as u16),
            (Container::BagSlots, self.bag_slots),
            (Container::MainPack, self.main_pack_slots),
            (Container::Bank, self.bank_slots),
            (Container::BankBagSlots, self.bank_bag_slots),
            (Container::Buyback, self.buyback_slots),
        ]
    }

    /// Flat persisted slot index of a player-space coordinate
    pub fn flat_index(&self, coordinate: &Coordinate) -> Option<u16> {
        if let Container::Bag(_) = coordinate.container {
            return Some(coordinate.slot);
        }
        let mut base = 0u16;
        for (container, len) in self.ranges() {
            if container == coordinate.container {
                return (coordinate.slot < len).then(|| base + coordinate.slot);
            }
            base += len;
        }
        None
    }

    /// Coordinate for a persisted `(container_id, slot_index)` pair
    pub fn locate(&self, container_id: u64, slot_index: u16) -> Option<Coordinate> {
        if container_id != 0 {
            return Some(Coordinate::bag(InstanceId(container_id), slot_index));
        }
        let mut base = 0u16;
        for (container, len) in self.ranges() {
            if slot_index < base + len {
                return Some(Coordinate::new(container, slot_index - base));
            }
            base += len;
        }
        None
    }
}

impl Default for SlotLayout {
    fn default() -> Self {
        Self {
            bag_slots: 4,
            main_pack_slots: 16,
            bank_slots: 28,
            bank_bag_slots: 7,
            buyback_slots: 12,
        }
    }
}
