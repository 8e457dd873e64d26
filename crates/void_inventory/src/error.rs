//! Allocation failures

use crate::container::Coordinate;
use crate::item::{InstanceId, ItemTypeId};
use thiserror::Error;

/// Reasons a placement, equip or transfer is refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// Per-character max count or owned limit category would be exceeded
    #[error("Ownership cap exceeded for {item_type}: {placeable} placeable")]
    OwnershipCapExceeded { item_type: ItemTypeId, placeable: u32 },

    #[error("Inventory full: {unplaced} of {item_type} left over")]
    InventoryFull { item_type: ItemTypeId, unplaced: u32 },

    #[error("Bank full: {unplaced} of {item_type} left over")]
    BankFull { item_type: ItemTypeId, unplaced: u32 },

    /// Bag family mismatch, wrong slot kind or self-containment
    #[error("Item does not fit container at {coordinate}")]
    IncompatibleContainer { coordinate: Coordinate },

    #[error("{item_type} is unique-equipped or its equip limit is reached")]
    AlreadyEquippedUnique { item_type: ItemTypeId },

    #[error("Off-hand item has nowhere to go")]
    CannotDisplaceOffhand,

    #[error("Two-handed main-hand item has nowhere to go")]
    CannotDisplaceMainhand,

    #[error("Another ranged container is already equipped")]
    QuiverConflict,

    #[error("{instance} is bound to another character or not finalized")]
    NotOwnedOrBound { instance: InstanceId },

    #[error("Invalid quantity {requested} (available {available})")]
    InvalidQuantity { requested: u32, available: u32 },

    #[error("{item_type} cannot be equipped")]
    NotEquippable { item_type: ItemTypeId },

    #[error("Requires level {required}, character is level {actual}")]
    RequirementsNotMet { required: u32, actual: u32 },

    /// No free candidate and swapping was not allowed
    #[error("Slot {coordinate} is occupied")]
    SlotOccupied { coordinate: Coordinate },

    /// Bags with contents only live in bag slots
    #[error("Bag {bag} is not empty")]
    BagNotEmpty { bag: InstanceId },

    #[error("Nothing at {coordinate}")]
    EmptySlot { coordinate: Coordinate },

    #[error("Invalid coordinate {coordinate}")]
    InvalidCoordinate { coordinate: Coordinate },

    #[error("Unknown item type {0}")]
    UnknownItemType(ItemTypeId),

    #[error("Unknown item instance {0}")]
    UnknownInstance(InstanceId),

    #[error("Instance {0} appears more than once")]
    DuplicateInstance(InstanceId),

    /// Executor found live state inconsistent with the plan
    #[error("Stale plan: {0}")]
    StalePlan(#[from] ExecutorError),
}

/// Result type for allocation operations
pub type InventoryResult<T> = Result<T, InventoryError>;

/// Invariant breaches caught while validating a buffered batch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    #[error("{coordinate} expected empty but holds {occupant}")]
    SlotOccupied { coordinate: Coordinate, occupant: InstanceId },

    #[error("{instance} expected at {expected}")]
    Misplaced { instance: InstanceId, expected: Coordinate },

    #[error("{instance} is not detached")]
    NotDetached { instance: InstanceId },

    #[error("{instance} is not present")]
    Missing { instance: InstanceId },

    #[error("Merging {amount} into {instance} would exceed stack limit {limit}")]
    StackOverflow { instance: InstanceId, amount: u32, limit: u32 },

    #[error("Cannot reduce {instance} by {amount}")]
    Underflow { instance: InstanceId, amount: u32 },

    #[error("{coordinate} is not addressable")]
    Unaddressable { coordinate: Coordinate },

    #[error("Plan still displaces {occupant}")]
    UnresolvedDisplacement { occupant: InstanceId },

    #[error("Plan places {planned} units but source holds {available}")]
    SourceMismatch { planned: u32, available: u32 },

    #[error("Unknown item type {0}")]
    UnknownItemType(ItemTypeId),
}
