mod common;

use std::sync::{Arc, Mutex};

use flag_storefront::{
    cart::{CartError, CartEvent, CartLine, CartListener, CartStore, merge_lines},
    pricing::Numeric,
    storage::{CART_KEY, JsonFileStore, KeyValueStore, MemoryStore},
};
use rust_decimal::Decimal;

use common::{flag, product};

fn memory() -> Arc<dyn KeyValueStore> {
    Arc::new(MemoryStore::new())
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<(String, usize)>>,
}

impl CartListener for Recorder {
    fn cart_changed(&self, event: &CartEvent, lines: &[CartLine]) {
        let name = match event {
            CartEvent::ItemAdded { .. } => "added",
            CartEvent::ItemRemoved { .. } => "removed",
            CartEvent::QuantityChanged { .. } => "quantity",
            CartEvent::Cleared => "cleared",
        };
        self.events
            .lock()
            .unwrap()
            .push((name.to_string(), lines.len()));
    }
}

#[test]
fn variant_lines_are_priced_and_removed_independently() {
    let flag = flag();
    let mut cart = CartStore::load(memory());

    cart.add_item(&flag, 2, None).unwrap();
    cart.add_item(&flag, 1, flag.variants.first()).unwrap();

    assert_eq!(cart.total().unwrap(), Decimal::from(3500));
    assert_eq!(cart.item_count(), 3);
    assert_eq!(cart.lines().len(), 2);

    cart.update_quantity("P1", 0, None).unwrap();

    assert_eq!(cart.total().unwrap(), Decimal::from(1500));
    assert!(cart.contains("P1", None));
    assert!(cart.contains("P1", Some("V1")));
    assert!(!cart.contains("P1", Some("V2")));
}

#[test]
fn adding_the_same_line_accumulates() {
    let flag = flag();
    let mut cart = CartStore::load(memory());

    cart.add_item(&flag, 1, None).unwrap();
    cart.add_item(&flag, 3, None).unwrap();

    assert_eq!(cart.lines().len(), 1);
    assert_eq!(cart.lines()[0].quantity, 4);
}

#[test]
fn zero_quantity_is_rejected() {
    let mut cart = CartStore::load(memory());
    assert_eq!(cart.add_item(&flag(), 0, None), Err(CartError::InvalidQuantity));
    assert!(cart.is_empty());
}

#[test]
fn updating_a_missing_line_changes_nothing() {
    let recorder = Arc::new(Recorder::default());
    let mut cart = CartStore::load(memory());
    cart.subscribe(recorder.clone());

    cart.update_quantity("missing", 3, None).unwrap();
    cart.remove_item("missing", None);

    assert!(cart.is_empty());
    assert!(recorder.events.lock().unwrap().is_empty());
}

#[test]
fn known_stock_caps_quantities() {
    let scarce = product("P2", "Banderín", Numeric::from(500_i64), Some(Numeric::from("3")));
    let mut cart = CartStore::load(memory());

    cart.add_item(&scarce, 2, None).unwrap();
    let err = cart.add_item(&scarce, 2, None).unwrap_err();
    assert_eq!(
        err,
        CartError::StockExceeded {
            product_id: "P2".to_string(),
            available: 3
        }
    );
    assert_eq!(cart.lines()[0].quantity, 2);

    assert!(cart.update_quantity("P2", 5, None).is_err());
    cart.update_quantity("P2", 3, None).unwrap();
    assert_eq!(cart.item_count(), 3);
}

#[test]
fn re_adding_checks_the_latest_stock() {
    let mut cart = CartStore::load(memory());
    let plenty = product("P2", "Banderín", Numeric::from(500_i64), Some(Numeric::from("10")));
    cart.add_item(&plenty, 2, None).unwrap();

    let scarce = product("P2", "Banderín", Numeric::from(500_i64), Some(Numeric::from("3")));
    let err = cart.add_item(&scarce, 2, None).unwrap_err();
    assert_eq!(
        err,
        CartError::StockExceeded {
            product_id: "P2".to_string(),
            available: 3
        }
    );
    assert_eq!(cart.item_count(), 2);

    cart.add_item(&scarce, 1, None).unwrap();
    assert_eq!(cart.lines()[0].product.stock, Some(Numeric::from("3")));
    assert!(cart.update_quantity("P2", 4, None).is_err());
}

#[test]
fn merging_folds_repeated_lines_and_rejects_empty_ones() {
    let flag = flag();
    let line = |quantity: u32, variant: bool| CartLine {
        product: flag.clone(),
        quantity,
        selected_variant: if variant { flag.variants.first().cloned() } else { None },
    };

    let merged = merge_lines(&[line(1, false), line(1, true), line(2, false)]).unwrap();
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].quantity, 3);
    assert_eq!(merged[0].variant_id(), None);
    assert_eq!(merged[1].variant_id(), Some("V1"));

    assert_eq!(merge_lines(&[line(0, false)]), Err(CartError::InvalidQuantity));
}

#[test]
fn unreadable_stock_does_not_cap() {
    let odd = product("P3", "Mástil", Numeric::from(100_i64), Some(Numeric::from("a pedido")));
    let mut cart = CartStore::load(memory());
    cart.add_item(&odd, 50, None).unwrap();
    assert_eq!(cart.item_count(), 50);
}

#[test]
fn non_numeric_price_is_an_error_not_zero() {
    let quoted = product("P4", "Bandera a medida", Numeric::from("consultar"), None);
    let mut cart = CartStore::load(memory());
    cart.add_item(&quoted, 1, None).unwrap();

    assert!(matches!(cart.total(), Err(CartError::InvalidPrice { .. })));
    assert!(cart.snapshot_items().is_err());
}

#[test]
fn listeners_see_every_applied_mutation() {
    let recorder = Arc::new(Recorder::default());
    let flag = flag();
    let mut cart = CartStore::load(memory());
    cart.subscribe(recorder.clone());

    cart.add_item(&flag, 1, None).unwrap();
    cart.update_quantity("P1", 4, None).unwrap();
    cart.update_quantity("P1", 4, None).unwrap();
    cart.remove_item("P1", None);
    cart.clear();

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            ("added".to_string(), 1),
            ("quantity".to_string(), 1),
            ("removed".to_string(), 0),
            ("cleared".to_string(), 0),
        ]
    );
}

#[test]
fn cart_survives_a_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local.json");
    let flag = flag();

    {
        let local: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(&path).unwrap());
        let mut cart = CartStore::load(local);
        cart.add_item(&flag, 2, flag.variants.first()).unwrap();
    }

    let local: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(&path).unwrap());
    let cart = CartStore::load(local);
    assert_eq!(cart.lines().len(), 1);
    assert_eq!(cart.lines()[0].variant_id(), Some("V1"));
    assert_eq!(cart.total().unwrap(), Decimal::from(3000));
}

#[test]
fn corrupt_payload_starts_an_empty_cart() {
    let local = memory();
    local.set(CART_KEY, "{not json").unwrap();

    let cart = CartStore::load(local);
    assert!(cart.is_empty());
}
