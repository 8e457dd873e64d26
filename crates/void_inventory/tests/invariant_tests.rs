//! Invariant tests for void_inventory
//!
//! These tests verify allocation invariants that must hold after every
//! operation, successful or not.

use std::collections::BTreeMap;
use std::sync::Arc;
use void_inventory::*;

const CLOTH: u32 = 1;
const RELIC: u32 = 2;
const SHARD: u32 = 3;
const POUCH: u32 = 4;
const BAG: u32 = 5;
const GREATSWORD: u32 = 6;
const BUCKLER: u32 = 7;
const TOKEN: u32 = 8;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn catalog() -> StaticCatalog {
    StaticCatalog::new()
        .with_item(ItemType::new(CLOTH, "Linen Cloth").with_stack_limit(20))
        .with_item(ItemType::new(RELIC, "Ancient Relic").with_max_owned(1))
        .with_item(ItemType::new(SHARD, "Soul Shard").with_bag_family(BagFamily::SOUL_SHARDS))
        .with_item(ItemType::new(POUCH, "Soul Pouch").as_bag(4, BagFamily::SOUL_SHARDS))
        .with_item(ItemType::new(BAG, "Linen Bag").as_bag(4, BagFamily::NONE))
        .with_item(ItemType::new(GREATSWORD, "Greatsword").with_inventory_type(InventoryType::TwoHandWeapon))
        .with_item(ItemType::new(BUCKLER, "Buckler").with_inventory_type(InventoryType::Shield))
        .with_item(ItemType::new(TOKEN, "Marks of Honor").with_stack_limit(10).with_max_owned(5))
}

fn engine_with(layout: SlotLayout) -> InventoryEngine {
    init_logging();
    InventoryEngine::new(
        Inventory::new(OwnerId(1), layout),
        Arc::new(catalog()),
        Arc::new(InstanceIdAllocator::new()),
    )
}

fn engine() -> InventoryEngine {
    engine_with(SlotLayout::default())
}

fn totals(engine: &InventoryEngine) -> BTreeMap<ItemTypeId, u32> {
    let mut totals = BTreeMap::new();
    for item in engine.inventory().items() {
        *totals.entry(item.item_type).or_insert(0) += item.count;
    }
    totals
}

fn snapshot(engine: &InventoryEngine) -> Vec<ItemInstance> {
    engine.inventory().items().cloned().collect()
}

fn assert_consistent(engine: &InventoryEngine) {
    let inv = engine.inventory();
    for item in inv.items() {
        let coordinate = item.coordinate.expect("registered instances are placed");
        assert_eq!(inv.occupant(&coordinate), Some(item.id), "{} claims {}", item.id, coordinate);
        let limit = engine.catalog().item_type(item.item_type).unwrap().stack_limit;
        assert!(item.count >= 1 && item.count <= limit, "{} holds {}", item.id, item.count);
    }
}

/// INVARIANT: Internal shuffling never creates or destroys units
#[test]
fn invariant_no_loss_or_duplication() {
    let mut engine = engine();
    engine.store_new(ItemTypeId(CLOTH), 45, None, StoreMode::CarriedAndBags).unwrap();
    engine.store_new(ItemTypeId(RELIC), 1, None, StoreMode::CarriedAndBags).unwrap();
    engine.store_new(ItemTypeId(BAG), 1, Some(Coordinate::bag_slot(0)), StoreMode::CarriedAndBags).unwrap();
    let bag = engine.inventory().occupant(&Coordinate::bag_slot(0)).unwrap();
    let before = totals(&engine);

    engine.split(Coordinate::pack(0), 7, None).unwrap();
    engine.move_item(Coordinate::pack(2), Coordinate::bag(bag, 1)).unwrap();
    engine.move_item(Coordinate::pack(4), Coordinate::pack(1)).unwrap();
    engine.swap(Coordinate::pack(0), Coordinate::pack(3)).unwrap();
    engine.split(Coordinate::pack(3), 5, Some(Coordinate::bank(0))).unwrap();
    engine.move_item(Coordinate::bank(0), Coordinate::pack(3)).unwrap();
    let _ = engine.swap(Coordinate::pack(0), Coordinate::bag_slot(0));

    assert_eq!(totals(&engine), before);
    assert_consistent(&engine);
}

/// INVARIANT: No stack ever exceeds its type's limit
#[test]
fn invariant_stack_limit_respected() {
    let mut engine = engine_with(SlotLayout {
        main_pack_slots: 3,
        ..SlotLayout::default()
    });

    for quantity in [7, 13, 19, 4, 30] {
        let _ = engine.store_new(ItemTypeId(CLOTH), quantity, None, StoreMode::CarriedAndBags);
        assert_consistent(&engine);
    }
    let _ = engine.move_item(Coordinate::pack(2), Coordinate::pack(0));
    let _ = engine.split(Coordinate::pack(1), 3, Some(Coordinate::pack(0)));

    assert_consistent(&engine);
    assert!(engine.inventory().count_of(ItemTypeId(CLOTH), false) <= 60);
}

/// INVARIANT: Aggregate owned count never exceeds max_owned_count
#[test]
fn invariant_ownership_cap() {
    let mut engine = engine();

    let receipt = engine.store_new(ItemTypeId(TOKEN), 8, None, StoreMode::CarriedAndBags).unwrap();
    assert_eq!(receipt.unplaceable, 3);
    assert_eq!(engine.inventory().owned_count(ItemTypeId(TOKEN)), 5);

    engine.store_new(ItemTypeId(RELIC), 1, None, StoreMode::BankAndBankBags).unwrap();
    assert!(matches!(
        engine.store_new(ItemTypeId(RELIC), 1, None, StoreMode::CarriedAndBags),
        Err(InventoryError::OwnershipCapExceeded { placeable: 0, .. })
    ));

    // moving an owned item between domains is not a new acquisition
    engine.move_item(Coordinate::bank(0), Coordinate::pack(5)).unwrap();

    // buying back re-acquires, so the cap applies again
    engine.sell(Coordinate::pack(5)).unwrap();
    engine.store_new(ItemTypeId(RELIC), 1, None, StoreMode::CarriedAndBags).unwrap();
    assert!(matches!(
        engine.buy_back(0),
        Err(InventoryError::OwnershipCapExceeded { .. })
    ));

    assert_eq!(engine.inventory().owned_count(ItemTypeId(RELIC)), 1);
    assert_eq!(engine.inventory().owned_count(ItemTypeId(TOKEN)), 5);
}

/// INVARIANT: A refused swap leaves both coordinates untouched
#[test]
fn invariant_swap_atomicity() {
    let mut engine = engine();
    engine.store_new(ItemTypeId(POUCH), 1, Some(Coordinate::bag_slot(0)), StoreMode::CarriedAndBags).unwrap();
    let pouch = engine.inventory().occupant(&Coordinate::bag_slot(0)).unwrap();
    engine.store_new(ItemTypeId(SHARD), 1, None, StoreMode::CarriedAndBags).unwrap();
    engine.store_new(ItemTypeId(CLOTH), 4, Some(Coordinate::pack(0)), StoreMode::CarriedAndBags).unwrap();
    assert!(engine.inventory().occupant(&Coordinate::bag(pouch, 0)).is_some());

    let before = snapshot(&engine);
    let result = engine.swap(Coordinate::bag(pouch, 0), Coordinate::pack(0));

    assert_eq!(
        result,
        Err(InventoryError::IncompatibleContainer {
            coordinate: Coordinate::bag(pouch, 0)
        })
    );
    assert_eq!(snapshot(&engine), before);
}

/// INVARIANT: A two-hander and an off-hand item are never equipped together
#[test]
fn invariant_two_handed_exclusivity() {
    let mut engine = engine();
    engine.store_new(ItemTypeId(BUCKLER), 1, None, StoreMode::Equip(None)).unwrap();
    let buckler = engine.inventory().equipped(EquipSlot::OffHand).unwrap().id;

    // direct equip of a new two-hander cannot move the buckler
    let before = snapshot(&engine);
    assert_eq!(
        engine.store_new(ItemTypeId(GREATSWORD), 1, None, StoreMode::Equip(None)),
        Err(InventoryError::CannotDisplaceOffhand)
    );
    assert_eq!(snapshot(&engine), before);

    // from the pack the buckler takes the sword's place
    engine.store_new(ItemTypeId(GREATSWORD), 1, None, StoreMode::CarriedAndBags).unwrap();
    let sword = engine.inventory().occupant(&Coordinate::pack(0)).unwrap();
    engine.equip(sword, None).unwrap();

    let inv = engine.inventory();
    assert_eq!(inv.equipped(EquipSlot::MainHand).map(|i| i.id), Some(sword));
    assert!(inv.equipped(EquipSlot::OffHand).is_none());
    assert_eq!(inv.occupant(&Coordinate::pack(0)), Some(buckler));

    // equipping the buckler again sends the two-hander back to the pack
    engine.equip(buckler, None).unwrap();
    let inv = engine.inventory();
    assert!(inv.equipped(EquipSlot::MainHand).is_none());
    assert_eq!(inv.equipped(EquipSlot::OffHand).map(|i| i.id), Some(buckler));
    assert_eq!(inv.occupant(&Coordinate::pack(0)), Some(sword));
    assert_consistent(&engine);
}

/// INVARIANT: A bag never ends up inside itself
#[test]
fn invariant_bag_not_inside_itself() {
    let mut engine = engine();
    engine.store_new(ItemTypeId(BAG), 1, Some(Coordinate::bag_slot(0)), StoreMode::CarriedAndBags).unwrap();
    let bag = engine.inventory().occupant(&Coordinate::bag_slot(0)).unwrap();

    let before = snapshot(&engine);
    assert_eq!(
        engine.move_item(Coordinate::bag_slot(0), Coordinate::bag(bag, 0)),
        Err(InventoryError::IncompatibleContainer {
            coordinate: Coordinate::bag(bag, 0)
        })
    );
    assert_eq!(snapshot(&engine), before);
}

/// INVARIANT: Bags with contents only live in bag slots
#[test]
fn invariant_non_empty_bag_stays_in_bag_slot() {
    let mut engine = engine();
    engine.store_new(ItemTypeId(BAG), 1, Some(Coordinate::bag_slot(0)), StoreMode::CarriedAndBags).unwrap();
    let bag = engine.inventory().occupant(&Coordinate::bag_slot(0)).unwrap();
    engine
        .store_new(ItemTypeId(CLOTH), 3, Some(Coordinate::bag(bag, 0)), StoreMode::CarriedAndBags)
        .unwrap();

    assert_eq!(
        engine.move_item(Coordinate::bag_slot(0), Coordinate::pack(0)),
        Err(InventoryError::BagNotEmpty { bag })
    );
    assert_eq!(engine.destroy(Coordinate::bag_slot(0)), Err(InventoryError::BagNotEmpty { bag }));

    // moving to another bag slot keeps the contents with the bag
    engine.move_item(Coordinate::bag_slot(0), Coordinate::bag_slot(2)).unwrap();
    assert_eq!(engine.inventory().bag_location(bag), Some(Coordinate::bag_slot(2)));
    assert_eq!(engine.inventory().count_of(ItemTypeId(CLOTH), false), 3);
    assert_consistent(&engine);
}

/// INVARIANT: Failed operations report an error and change nothing
#[test]
fn invariant_failures_leave_state_unchanged() {
    let mut engine = engine_with(SlotLayout {
        main_pack_slots: 2,
        bag_slots: 1,
        ..SlotLayout::default()
    });
    engine.store_new(ItemTypeId(CLOTH), 40, None, StoreMode::CarriedAndBags).unwrap();
    let before = snapshot(&engine);

    assert!(matches!(
        engine.store_new(ItemTypeId(CLOTH), 11, None, StoreMode::CarriedAndBags),
        Err(InventoryError::InventoryFull { unplaced: 11, .. })
    ));
    assert!(matches!(
        engine.split(Coordinate::pack(0), 0, None),
        Err(InventoryError::InvalidQuantity { .. })
    ));
    assert!(matches!(
        engine.split(Coordinate::pack(0), 5, Some(Coordinate::pack(1))),
        Err(InventoryError::SlotOccupied { .. })
    ));
    assert!(matches!(
        engine.destroy_count(ItemTypeId(CLOTH), 41),
        Err(InventoryError::InvalidQuantity { .. })
    ));
    assert!(matches!(
        engine.move_item(Coordinate::pack(9), Coordinate::pack(0)),
        Err(InventoryError::InvalidCoordinate { .. })
    ));

    assert_eq!(snapshot(&engine), before);
}
