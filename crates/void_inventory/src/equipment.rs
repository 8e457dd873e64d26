//! Equipment slots and candidate slot resolution

use crate::item::InventoryType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Equipment slot types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipSlot {
    Head,
    Neck,
    Shoulders,
    /// Shirt
    Body,
    Chest,
    Waist,
    Legs,
    Feet,
    Wrists,
    Hands,
    Finger1,
    Finger2,
    Trinket1,
    Trinket2,
    /// Cloak
    Back,
    MainHand,
    OffHand,
    Ranged,
    Tabard,
}

impl EquipSlot {
    /// Number of equipment slots
    pub const COUNT: usize = 19;

    /// All slots in index order
    pub const ALL: [EquipSlot; Self::COUNT] = [
        Self::Head,
        Self::Neck,
        Self::Shoulders,
        Self::Body,
        Self::Chest,
        Self::Waist,
        Self::Legs,
        Self::Feet,
        Self::Wrists,
        Self::Hands,
        Self::Finger1,
        Self::Finger2,
        Self::Trinket1,
        Self::Trinket2,
        Self::Back,
        Self::MainHand,
        Self::OffHand,
        Self::Ranged,
        Self::Tabard,
    ];

    /// Slot index inside the equipment container
    pub fn index(&self) -> u16 {
        *self as u16
    }

    /// Slot for an equipment container index
    pub fn from_index(index: u16) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Check if this is a weapon slot
    pub fn is_weapon(&self) -> bool {
        matches!(self, Self::MainHand | Self::OffHand | Self::Ranged)
    }
}

impl fmt::Display for EquipSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Character capabilities that widen candidate slot sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// One-handed weapons may go into the off-hand
    #[serde(default)]
    pub dual_wield: bool,
    /// Two-handed weapons may go into the off-hand and do not block it
    #[serde(default)]
    pub titan_grip: bool,
    #[serde(default)]
    pub level: u32,
}

impl Capabilities {
    pub fn new(level: u32) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Enable dual wield
    pub fn with_dual_wield(mut self) -> Self {
        self.dual_wield = true;
        self
    }

    /// Enable titan grip (implies dual wield)
    pub fn with_titan_grip(mut self) -> Self {
        self.dual_wield = true;
        self.titan_grip = true;
        self
    }
}

/// Equipment slots an item classification may occupy, in preference order.
///
/// Bags and quivers go into bag-reference slots, which are not equipment
/// slots; they resolve to an empty list here.
pub fn candidate_slots(inventory_type: InventoryType, caps: &Capabilities) -> Vec<EquipSlot> {
    use EquipSlot as S;
    use InventoryType as T;

    match inventory_type {
        T::NonEquip | T::Bag | T::Quiver => Vec::new(),
        T::Head => vec![S::Head],
        T::Neck => vec![S::Neck],
        T::Shoulders => vec![S::Shoulders],
        T::Body => vec![S::Body],
        T::Chest | T::Robe => vec![S::Chest],
        T::Waist => vec![S::Waist],
        T::Legs => vec![S::Legs],
        T::Feet => vec![S::Feet],
        T::Wrists => vec![S::Wrists],
        T::Hands => vec![S::Hands],
        T::Finger => vec![S::Finger1, S::Finger2],
        T::Trinket => vec![S::Trinket1, S::Trinket2],
        T::Cloak => vec![S::Back],
        T::Weapon => {
            if caps.dual_wield {
                vec![S::MainHand, S::OffHand]
            } else {
                vec![S::MainHand]
            }
        }
        T::MainHandWeapon => vec![S::MainHand],
        T::OffHandWeapon => {
            if caps.dual_wield {
                vec![S::OffHand]
            } else {
                Vec::new()
            }
        }
        T::Shield | T::Holdable => vec![S::OffHand],
        T::TwoHandWeapon => {
            if caps.titan_grip {
                vec![S::MainHand, S::OffHand]
            } else {
                vec![S::MainHand]
            }
        }
        T::Ranged => vec![S::Ranged],
        T::Tabard => vec![S::Tabard],
    }
}

/// Check whether a classification may occupy `slot`
pub fn fits_slot(inventory_type: InventoryType, slot: EquipSlot, caps: &Capabilities) -> bool {
    candidate_slots(inventory_type, caps).contains(&slot)
}
