//! Notifications raised by committed mutations

use crate::container::Coordinate;
use crate::equipment::EquipSlot;
use crate::item::{InstanceId, ItemInstance, ItemTypeId, OwnerId};

/// Inventory events, one per real mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryEvent {
    /// A new or received instance took a slot
    ItemPlaced {
        instance: InstanceId,
        item_type: ItemTypeId,
        coordinate: Coordinate,
        count: u32,
    },
    /// An instance changed slot
    ItemMoved {
        instance: InstanceId,
        from: Coordinate,
        to: Coordinate,
    },
    /// Units were added to an existing stack
    ItemMerged {
        instance: InstanceId,
        coordinate: Coordinate,
        added: u32,
        count: u32,
    },
    /// Units were taken from a stack that stays in place
    ItemReduced {
        instance: InstanceId,
        coordinate: Coordinate,
        removed: u32,
        count: u32,
    },
    /// An instance left the inventory (destroyed, merged away or detached)
    ItemRemoved {
        instance: InstanceId,
        item_type: ItemTypeId,
        coordinate: Coordinate,
        count: u32,
    },
    ItemEquipped {
        instance: InstanceId,
        slot: EquipSlot,
    },
    ItemUnequipped {
        instance: InstanceId,
        slot: EquipSlot,
    },
    ItemBound {
        instance: InstanceId,
        owner: OwnerId,
    },
}

/// Reacts to items entering and leaving equipment slots
pub trait StatAndAuraSystem {
    fn on_equip(&mut self, item: &ItemInstance);

    /// Called while the item is still attached to its slot
    fn on_unequip(&mut self, item: &ItemInstance);
}

/// Tracks owned totals for quests and achievements
pub trait QuestTracker {
    /// `total` counts carried and equipped units (bank excluded)
    fn on_item_count_changed(&mut self, item_type: ItemTypeId, total: u32);
}

/// Receives every committed event
pub trait InventoryListener {
    fn on_event(&mut self, event: &InventoryEvent);
}

/// External collaborators notified by the executor
#[derive(Default)]
pub struct Collaborators {
    pub stats: Option<Box<dyn StatAndAuraSystem + Send>>,
    pub quests: Option<Box<dyn QuestTracker + Send>>,
    pub listeners: Vec<Box<dyn InventoryListener + Send>>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stat and aura system
    pub fn with_stats(mut self, stats: impl StatAndAuraSystem + Send + 'static) -> Self {
        self.stats = Some(Box::new(stats));
        self
    }

    /// Set the quest tracker
    pub fn with_quests(mut self, quests: impl QuestTracker + Send + 'static) -> Self {
        self.quests = Some(Box::new(quests));
        self
    }

    /// Add an event listener
    pub fn with_listener(mut self, listener: impl InventoryListener + Send + 'static) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    pub(crate) fn equipped(&mut self, item: &ItemInstance) {
        if item.broken {
            return;
        }
        if let Some(stats) = self.stats.as_mut() {
            stats.on_equip(item);
        }
    }

    pub(crate) fn unequipped(&mut self, item: &ItemInstance) {
        if item.broken {
            return;
        }
        if let Some(stats) = self.stats.as_mut() {
            stats.on_unequip(item);
        }
    }

    pub(crate) fn count_changed(&mut self, item_type: ItemTypeId, total: u32) {
        if let Some(quests) = self.quests.as_mut() {
            quests.on_item_count_changed(item_type, total);
        }
    }

    pub(crate) fn dispatch(&mut self, events: &[InventoryEvent]) {
        for listener in &mut self.listeners {
            for event in events {
                listener.on_event(event);
            }
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("stats", &self.stats.is_some())
            .field("quests", &self.quests.is_some())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
