//! Item types and owned item instances

use crate::container::Coordinate;
use crate::equipment::{candidate_slots, Capabilities};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of a static item type in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemTypeId(pub u32);

impl fmt::Display for ItemTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type#{}", self.0)
    }
}

/// Identifier of a single owned item instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

/// Identifier of the character owning an inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub u64);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner#{}", self.0)
    }
}

/// Thread-safe allocator for instance ids.
///
/// Shared by every character so ids stay unique when items change hands.
#[derive(Debug)]
pub struct InstanceIdAllocator {
    next: AtomicU64,
}

impl InstanceIdAllocator {
    /// Create an allocator handing out ids starting at 1
    pub const fn new() -> Self {
        Self::starting_at(1)
    }

    /// Create an allocator continuing after ids already in use
    pub const fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Allocate the next id
    pub fn next(&self) -> InstanceId {
        InstanceId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Make sure future ids are greater than `id`
    pub fn observe(&self, id: InstanceId) {
        self.next.fetch_max(id.0.saturating_add(1), Ordering::Relaxed);
    }
}

impl Default for InstanceIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Equip classification of an item type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryType {
    /// Cannot be equipped
    #[default]
    NonEquip,
    Head,
    Neck,
    Shoulders,
    /// Shirt
    Body,
    Chest,
    /// Chest piece variant, same slot as `Chest`
    Robe,
    Waist,
    Legs,
    Feet,
    Wrists,
    Hands,
    Finger,
    Trinket,
    Cloak,
    /// One-handed weapon
    Weapon,
    Shield,
    TwoHandWeapon,
    MainHandWeapon,
    OffHandWeapon,
    /// Held in off-hand (orbs, tomes)
    Holdable,
    Ranged,
    Tabard,
    /// Carried bag
    Bag,
    /// Ranged container (quiver, ammo pouch)
    Quiver,
}

impl InventoryType {
    /// Whether items of this classification can be equipped anywhere
    pub fn is_equippable(&self) -> bool {
        !matches!(self, Self::NonEquip)
    }

    /// Whether this classification occupies both hands
    pub fn is_two_handed(&self) -> bool {
        matches!(self, Self::TwoHandWeapon)
    }

    /// Whether this classification goes into a bag-reference slot
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Bag | Self::Quiver)
    }
}

/// When an item becomes bound to its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingPolicy {
    #[default]
    None,
    /// Bound as soon as it is stored
    OnPickup,
    /// Bound the first time it is equipped
    OnEquip,
    /// Quest item, bound on pickup
    Quest,
}

impl BindingPolicy {
    /// Whether storing the item binds it
    pub fn binds_on_store(&self) -> bool {
        matches!(self, Self::OnPickup | Self::Quest)
    }
}

/// Bag family bit set.
///
/// On an item type it names the families the item belongs to; on a bag it
/// names the families the bag accepts (empty = generic bag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BagFamily(pub u32);

impl BagFamily {
    pub const NONE: Self = Self(0);
    pub const ARROWS: Self = Self(1 << 0);
    pub const BULLETS: Self = Self(1 << 1);
    pub const SOUL_SHARDS: Self = Self(1 << 2);
    pub const LEATHERWORKING: Self = Self(1 << 3);
    pub const HERBS: Self = Self(1 << 5);
    pub const ENCHANTING: Self = Self(1 << 6);
    pub const ENGINEERING: Self = Self(1 << 7);
    pub const KEYS: Self = Self(1 << 8);
    pub const GEMS: Self = Self(1 << 9);
    pub const MINING: Self = Self(1 << 10);

    /// Check if no family bit is set
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Check if any bit is shared
    pub fn intersects(&self, other: BagFamily) -> bool {
        self.0 & other.0 != 0
    }
}

impl std::ops::BitOr for BagFamily {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Static, shared properties of an item type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemType {
    pub id: ItemTypeId,
    #[serde(default)]
    pub name: String,
    /// Maximum units per stack (1 = not stackable)
    #[serde(default = "default_stack_limit")]
    pub stack_limit: u32,
    /// Maximum units one character may own (0 = unlimited)
    #[serde(default)]
    pub max_owned_count: u32,
    /// Shared limit category (0 = none)
    #[serde(default)]
    pub limit_category: u32,
    #[serde(default)]
    pub inventory_type: InventoryType,
    /// Families this item belongs to
    #[serde(default)]
    pub bag_family: BagFamily,
    /// Slot count when the type is a bag (0 = not a container)
    #[serde(default)]
    pub container_slots: u16,
    /// Families a bag of this type accepts (empty = generic)
    #[serde(default)]
    pub container_family: BagFamily,
    #[serde(default)]
    pub binding: BindingPolicy,
    /// At most one may be equipped at a time
    #[serde(default)]
    pub unique_equipped: bool,
    #[serde(default)]
    pub required_level: u32,
}

fn default_stack_limit() -> u32 {
    1
}

impl ItemType {
    /// Create a non-stackable, non-equippable type
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id: ItemTypeId(id),
            name: name.into(),
            stack_limit: 1,
            max_owned_count: 0,
            limit_category: 0,
            inventory_type: InventoryType::NonEquip,
            bag_family: BagFamily::NONE,
            container_slots: 0,
            container_family: BagFamily::NONE,
            binding: BindingPolicy::None,
            unique_equipped: false,
            required_level: 0,
        }
    }

    /// Set stack limit
    pub fn with_stack_limit(mut self, limit: u32) -> Self {
        self.stack_limit = limit.max(1);
        self
    }

    /// Set per-character max owned count
    pub fn with_max_owned(mut self, max: u32) -> Self {
        self.max_owned_count = max;
        self
    }

    /// Set limit category
    pub fn with_limit_category(mut self, category: u32) -> Self {
        self.limit_category = category;
        self
    }

    /// Set equip classification
    pub fn with_inventory_type(mut self, inventory_type: InventoryType) -> Self {
        self.inventory_type = inventory_type;
        self
    }

    /// Set the families this item belongs to
    pub fn with_bag_family(mut self, family: BagFamily) -> Self {
        self.bag_family = family;
        self
    }

    /// Make this type a bag with the given slot count and accepted families
    pub fn as_bag(mut self, slots: u16, accepts: BagFamily) -> Self {
        if !self.inventory_type.is_container() {
            self.inventory_type = InventoryType::Bag;
        }
        self.container_slots = slots;
        self.container_family = accepts;
        self
    }

    /// Set binding policy
    pub fn with_binding(mut self, binding: BindingPolicy) -> Self {
        self.binding = binding;
        self
    }

    /// Mark unique-equipped
    pub fn unique_equipped(mut self) -> Self {
        self.unique_equipped = true;
        self
    }

    /// Set required level
    pub fn with_required_level(mut self, level: u32) -> Self {
        self.required_level = level;
        self
    }

    /// Check if stackable
    pub fn is_stackable(&self) -> bool {
        self.stack_limit > 1
    }

    /// Check if this type is a container
    pub fn is_container(&self) -> bool {
        self.inventory_type.is_container() && self.container_slots > 0
    }

    /// Check if this type is a ranged container (quiver, ammo pouch)
    pub fn is_ranged_container(&self) -> bool {
        matches!(self.inventory_type, InventoryType::Quiver)
    }

    pub fn two_handed(&self) -> bool {
        self.inventory_type.is_two_handed()
    }

    /// Equip slots accepting this type, one bit per [`EquipSlot::index`](crate::equipment::EquipSlot::index)
    pub fn equip_slot_mask(&self, caps: &Capabilities) -> u32 {
        candidate_slots(self.inventory_type, caps)
            .iter()
            .fold(0, |mask, slot| mask | 1 << slot.index())
    }

    /// Check whether a bag of this type may hold items of `item`
    pub fn bag_accepts(&self, item: &ItemType) -> bool {
        if self.container_family.is_empty() {
            return true;
        }
        item.bag_family.intersects(self.container_family)
    }
}

/// Persistence bookkeeping tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PersistenceState {
    /// Matches the stored row
    Unmodified,
    /// Not yet stored
    #[default]
    New,
    /// Stored row needs rewriting
    Moved,
    /// Stored row needs deleting
    Destroyed,
}

impl PersistenceState {
    /// Transition applied on any coordinate or count change
    pub fn touched(self) -> Self {
        match self {
            Self::Unmodified => Self::Moved,
            other => other,
        }
    }
}

/// A single owned unit or stack of an item type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemInstance {
    pub id: InstanceId,
    pub item_type: ItemTypeId,
    /// Units in this stack (1..=stack_limit)
    pub count: u32,
    /// Current placement (None = detached)
    pub coordinate: Option<Coordinate>,
    pub bound_to: Option<OwnerId>,
    /// Durability reached zero
    pub broken: bool,
    /// Carried, not interpreted
    pub random_property: i32,
    /// Socketed gem types
    pub gems: Vec<ItemTypeId>,
    /// Loot still being generated
    pub temporary: bool,
    #[serde(skip)]
    pub persistence: PersistenceState,
}

impl ItemInstance {
    /// Create a detached instance
    pub fn new(id: InstanceId, item_type: ItemTypeId, count: u32) -> Self {
        Self {
            id,
            item_type,
            count: count.max(1),
            coordinate: None,
            bound_to: None,
            broken: false,
            random_property: 0,
            gems: Vec::new(),
            temporary: false,
            persistence: PersistenceState::New,
        }
    }

    /// Bind to an owner
    pub fn with_bound_to(mut self, owner: OwnerId) -> Self {
        self.bound_to = Some(owner);
        self
    }

    /// Set random property id
    pub fn with_random_property(mut self, id: i32) -> Self {
        self.random_property = id;
        self
    }

    /// Socket a gem
    pub fn with_gem(mut self, gem: ItemTypeId) -> Self {
        self.gems.push(gem);
        self
    }

    /// Mark as temporary loot
    pub fn temporary(mut self) -> Self {
        self.temporary = true;
        self
    }

    /// Check if this instance is not placed anywhere
    pub fn is_detached(&self) -> bool {
        self.coordinate.is_none()
    }

    /// Check if stacks can be merged (same type, binding and random property)
    pub fn can_merge(&self, other: &ItemInstance) -> bool {
        self.stacks_with(other.item_type, other.bound_to, other.random_property)
    }

    /// Check stack compatibility against loose attributes
    pub fn stacks_with(&self, item_type: ItemTypeId, bound_to: Option<OwnerId>, random_property: i32) -> bool {
        self.item_type == item_type
            && self.bound_to == bound_to
            && self.random_property == random_property
            && self.gems.is_empty()
    }

    /// Check if a character may hold this instance
    pub fn usable_by(&self, owner: OwnerId) -> bool {
        !self.temporary && self.bound_to.map(|b| b == owner).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equipment::EquipSlot;

    #[test]
    fn test_item_type_builder() {
        let arrows = ItemType::new(10, "Rough Arrow")
            .with_stack_limit(200)
            .with_bag_family(BagFamily::ARROWS);

        assert!(arrows.is_stackable());
        assert!(!arrows.is_container());
        assert!(!arrows.two_handed());
    }

    #[test]
    fn test_bag_accepts() {
        let arrows = ItemType::new(10, "Rough Arrow").with_bag_family(BagFamily::ARROWS);
        let shard = ItemType::new(11, "Soul Shard").with_bag_family(BagFamily::SOUL_SHARDS);
        let quiver = ItemType::new(20, "Light Quiver")
            .with_inventory_type(InventoryType::Quiver)
            .as_bag(8, BagFamily::ARROWS);
        let pouch = ItemType::new(21, "Linen Bag").as_bag(6, BagFamily::NONE);

        assert!(quiver.is_container());
        assert!(quiver.is_ranged_container());
        assert!(quiver.bag_accepts(&arrows));
        assert!(!quiver.bag_accepts(&shard));
        assert!(pouch.bag_accepts(&shard));
        assert!(!pouch.is_ranged_container());
    }

    #[test]
    fn test_persistence_touch() {
        assert_eq!(PersistenceState::Unmodified.touched(), PersistenceState::Moved);
        assert_eq!(PersistenceState::New.touched(), PersistenceState::New);
        assert_eq!(PersistenceState::Moved.touched(), PersistenceState::Moved);
    }

    #[test]
    fn test_merge_compatibility() {
        let owner = OwnerId(7);
        let a = ItemInstance::new(InstanceId(1), ItemTypeId(5), 3);
        let b = ItemInstance::new(InstanceId(2), ItemTypeId(5), 4);
        let bound = ItemInstance::new(InstanceId(3), ItemTypeId(5), 1).with_bound_to(owner);

        assert!(a.can_merge(&b));
        assert!(!a.can_merge(&bound));
        assert!(bound.usable_by(owner));
        assert!(!bound.usable_by(OwnerId(8)));
        assert!(!a.clone().temporary().usable_by(owner));
    }

    #[test]
    fn test_allocator_observe() {
        let alloc = InstanceIdAllocator::new();
        assert_eq!(alloc.next(), InstanceId(1));
        alloc.observe(InstanceId(40));
        assert_eq!(alloc.next(), InstanceId(41));
    }

    #[test]
    fn test_equip_slot_mask() {
        let ring = ItemType::new(1, "Band").with_inventory_type(InventoryType::Finger);
        let expected = 1 << EquipSlot::Finger1.index() | 1 << EquipSlot::Finger2.index();
        assert_eq!(ring.equip_slot_mask(&Capabilities::new(1)), expected);

        let cloth = ItemType::new(2, "Linen Cloth");
        assert_eq!(cloth.equip_slot_mask(&Capabilities::new(1)), 0);
    }

    #[test]
    fn test_allocator_observe_max_id() {
        let alloc = InstanceIdAllocator::new();
        alloc.observe(InstanceId(u64::MAX));
        assert_eq!(alloc.next(), InstanceId(u64::MAX));
    }
}
