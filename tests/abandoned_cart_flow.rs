mod common;

use std::{sync::Arc, time::Duration};

use flag_storefront::{
    customer::{CustomerField, CustomerForm},
    device::RequestContext,
    error::AppError,
    models::{CartMirrorWrite, CartRecordStatus, SessionMetadata},
    repository::{AbandonedCartRepository, MirrorOutcome},
    services::abandoned_cart_service::{self, RecoveryError},
    shopper::ShopperSession,
    storage::{ABANDONED_CART_ID_KEY, KeyValueStore, MemoryStore},
};
use rust_decimal::Decimal;
use tokio::time::sleep;

use common::{TestApp, customer_form, flag, test_app};

fn open(app: &TestApp) -> (ShopperSession, Arc<dyn KeyValueStore>) {
    let local: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let tab = MemoryStore::new();
    let context = RequestContext {
        user_agent: Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0) Mobile Safari".to_string()),
        referrer: None,
        page_url: Some("/tienda?utm_source=instagram".to_string()),
    };
    let shopper = ShopperSession::open(app.state.clone(), local.clone(), &tab, context);
    (shopper, local)
}

/// Lets the mirror task drain its queue without moving the clock.
async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

fn write(revision: i64, quantity: u32) -> CartMirrorWrite {
    let mut store = flag_storefront::cart::CartStore::load(Arc::new(MemoryStore::new()));
    store.add_item(&flag(), quantity, None).unwrap();
    let items = store.snapshot_items().unwrap();
    CartMirrorWrite {
        items_count: quantity,
        total: store.total().unwrap(),
        items,
        customer: None,
        metadata: SessionMetadata::default(),
        revision,
    }
}

#[tokio::test(start_paused = true)]
async fn rapid_edits_collapse_into_one_write() {
    let app = test_app();
    let (mut shopper, local) = open(&app);
    let flag = flag();

    for _ in 0..5 {
        shopper.cart_mut().add_item(&flag, 1, None).unwrap();
        sleep(Duration::from_millis(500)).await;
    }
    assert_eq!(app.carts.mirror_writes(), 0);

    sleep(Duration::from_millis(2100)).await;
    assert_eq!(app.carts.mirror_writes(), 1);

    let record = app
        .carts
        .find_by_session(shopper.session_id().as_str())
        .await
        .unwrap()
        .expect("mirrored record");
    assert_eq!(record.items_count, 5);
    assert_eq!(record.total, Decimal::from(5000));
    assert_eq!(record.status, CartRecordStatus::Active);
    assert_eq!(record.metadata.utm_source.as_deref(), Some("instagram"));
    assert_eq!(local.get(ABANDONED_CART_ID_KEY), Some(record.id.to_string()));
}

#[tokio::test(start_paused = true)]
async fn empty_cart_is_never_mirrored() {
    let app = test_app();
    let (mut shopper, _) = open(&app);

    shopper.cart_mut().add_item(&flag(), 1, None).unwrap();
    shopper.cart_mut().clear();
    sleep(Duration::from_millis(2500)).await;

    assert_eq!(app.carts.mirror_writes(), 0);
}

#[tokio::test(start_paused = true)]
async fn page_unload_flushes_then_marks_abandoned() {
    let app = test_app();
    let (mut shopper, _) = open(&app);

    shopper.cart_mut().add_item(&flag(), 2, None).unwrap();
    shopper.page_unload();
    settle().await;

    let record = app
        .carts
        .find_by_session(shopper.session_id().as_str())
        .await
        .unwrap()
        .expect("flushed on unload");
    assert_eq!(record.status, CartRecordStatus::Abandoned);
    assert!(record.abandoned_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn converted_cart_ignores_later_writes() {
    let app = test_app();
    let (mut shopper, _) = open(&app);
    let flag = flag();

    shopper.cart_mut().add_item(&flag, 1, None).unwrap();
    shopper.provide_customer_info(&customer_form()).await.unwrap();
    let receipt = shopper.checkout(RequestContext::default()).await.unwrap();

    shopper.cart_mut().add_item(&flag, 3, None).unwrap();
    sleep(Duration::from_millis(2500)).await;
    shopper.page_unload();
    settle().await;

    let record = app
        .carts
        .find_by_session(shopper.session_id().as_str())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, CartRecordStatus::Converted);
    assert_eq!(record.converted_order_id, Some(receipt.order.id));
    assert_eq!(record.items_count, 1);
    assert_eq!(app.carts.mirror_writes(), 1);
}

#[tokio::test(start_paused = true)]
async fn new_tab_mirrors_its_loaded_cart_under_its_own_session() {
    let app = test_app();
    let local: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

    let first_tab = MemoryStore::new();
    let mut first =
        ShopperSession::open(app.state.clone(), local.clone(), &first_tab, RequestContext::default());
    first.cart_mut().add_item(&flag(), 2, None).unwrap();
    sleep(Duration::from_millis(2500)).await;
    let earlier = app
        .carts
        .find_by_session(first.session_id().as_str())
        .await
        .unwrap()
        .expect("first tab mirrored");
    drop(first);

    let second_tab = MemoryStore::new();
    let second =
        ShopperSession::open(app.state.clone(), local.clone(), &second_tab, RequestContext::default());
    assert_eq!(second.cart().item_count(), 2);
    assert_eq!(local.get(ABANDONED_CART_ID_KEY), None);

    second.page_unload();
    settle().await;

    let earlier = app.carts.get(earlier.id).await.unwrap().unwrap();
    assert_eq!(earlier.status, CartRecordStatus::Active);

    let own = app
        .carts
        .find_by_session(second.session_id().as_str())
        .await
        .unwrap()
        .expect("loaded cart mirrored");
    assert_ne!(own.id, earlier.id);
    assert_eq!(own.status, CartRecordStatus::Abandoned);
    assert_eq!(own.items_count, 2);
    assert_eq!(local.get(ABANDONED_CART_ID_KEY), Some(own.id.to_string()));
}

#[tokio::test]
async fn stale_revisions_are_skipped() {
    let app = test_app();

    let first = abandoned_cart_service::save_or_update(&app.state, "s1", &write(10, 2))
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(first, MirrorOutcome::Created(_)));

    let stale = abandoned_cart_service::save_or_update(&app.state, "s1", &write(5, 7))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stale, MirrorOutcome::SkippedStale(first.cart_id()));

    let newer = abandoned_cart_service::save_or_update(&app.state, "s1", &write(11, 3))
        .await
        .unwrap()
        .unwrap();
    assert!(newer.applied());

    let record = app.carts.get(first.cart_id()).await.unwrap().unwrap();
    assert_eq!(record.items_count, 3);
    assert_eq!(record.revision, 11);
}

#[tokio::test(start_paused = true)]
async fn customer_info_is_validated_and_attached() {
    let app = test_app();
    let (mut shopper, _) = open(&app);

    shopper.cart_mut().add_item(&flag(), 1, None).unwrap();
    assert!(shopper.needs_customer_info());

    let invalid = CustomerForm {
        name: String::new(),
        email: "not-an-email".to_string(),
        phone: "12345".to_string(),
    };
    let err = shopper.provide_customer_info(&invalid).await.unwrap_err();
    assert!(err.has(CustomerField::Name));
    assert!(err.has(CustomerField::Email));
    assert!(err.has(CustomerField::Phone));
    assert!(shopper.needs_customer_info());

    sleep(Duration::from_millis(2500)).await;
    shopper.provide_customer_info(&customer_form()).await.unwrap();
    assert!(!shopper.needs_customer_info());

    let record = app
        .carts
        .find_by_session(shopper.session_id().as_str())
        .await
        .unwrap()
        .unwrap();
    let contact = record.customer.expect("contact attached");
    assert_eq!(contact.email.as_deref(), Some("ana@example.com"));
}

#[tokio::test(start_paused = true)]
async fn abandoned_cart_can_be_recovered_elsewhere() {
    let app = test_app();
    let (mut original, _) = open(&app);
    let flag = flag();

    original.cart_mut().add_item(&flag, 2, None).unwrap();
    original.cart_mut().add_item(&flag, 1, flag.variants.first()).unwrap();
    original.page_unload();
    settle().await;

    let (mut elsewhere, _) = open(&app);
    assert!(elsewhere.cart().is_empty());

    let record = elsewhere
        .recover(original.session_id().as_str())
        .await
        .unwrap();
    assert_eq!(record.total, Decimal::from(3500));
    assert_eq!(elsewhere.cart().lines().len(), 2);
    assert_eq!(elsewhere.cart().total().unwrap(), Decimal::from(3500));
    assert!(elsewhere.cart().contains("P1", Some("V1")));
}

#[tokio::test]
async fn recovery_reports_why_it_failed() {
    let app = test_app();

    let missing = abandoned_cart_service::load_for_recovery(&app.state, "nobody").await;
    assert!(matches!(missing, Err(RecoveryError::NotFound)));

    abandoned_cart_service::save_or_update(&app.state, "active", &write(1, 1))
        .await
        .unwrap();
    let active = abandoned_cart_service::load_for_recovery(&app.state, "active").await;
    assert!(matches!(active, Err(RecoveryError::AlreadyProcessed)));

    app.carts.set_offline(true);
    let offline = abandoned_cart_service::load_for_recovery(&app.state, "active").await;
    let Err(err) = offline else {
        panic!("expected an error while offline");
    };
    assert!(matches!(err, RecoveryError::Unavailable(_)));
    assert!(matches!(AppError::from(err), AppError::Unavailable(_)));
}

#[tokio::test]
async fn recovery_message_counts_and_links() {
    let app = test_app();
    let mut cart_write = write(1, 2);
    cart_write.customer = Some(flag_storefront::models::ContactSnapshot {
        name: Some("Ana".to_string()),
        email: None,
        phone: Some("2235416600".to_string()),
    });
    let outcome = abandoned_cart_service::save_or_update(&app.state, "s-msg", &cart_write)
        .await
        .unwrap()
        .unwrap();

    abandoned_cart_service::record_recovery_message(&app.state, outcome.cart_id())
        .await
        .unwrap();
    let message = abandoned_cart_service::record_recovery_message(&app.state, outcome.cart_id())
        .await
        .unwrap();

    assert_eq!(message.cart.recovery_messages_sent, 2);
    assert!(message.cart.last_recovery_message_at.is_some());
    assert!(message.recovery_link.ends_with("/tienda/recuperar-carrito/s-msg"));
    let url = message.whatsapp_url.expect("phone on record");
    assert!(url.starts_with("https://wa.me/5492235416600?text="));
}
