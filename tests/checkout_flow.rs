mod common;

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use flag_storefront::{
    cart::CartLine,
    config::AppConfig,
    device::{DeviceType, RequestContext},
    dto::{carts::MirrorCartRequest, orders::CheckoutRequest},
    error::AppError,
    models::{CartRecordStatus, OrderCustomer, OrderSource, OrderStatus},
    pricing::Numeric,
    repository::AbandonedCartRepository,
    routes::{carts, orders},
    services::order_service::{self, CheckoutInput},
    shopper::ShopperSession,
    storage::{KeyValueStore, MemoryStore},
    tracking::{TrackingEvent, TrackingKind, TrackingSink},
};
use mockall::{mock, predicate::function};
use regex::Regex;
use rust_decimal::Decimal;

use common::{TestApp, customer_form, flag, product, test_app, test_app_with};

mock! {
    Sink {}

    impl TrackingSink for Sink {
        fn track(&self, event: TrackingEvent);
    }
}

fn open(app: &TestApp) -> ShopperSession {
    let local: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    ShopperSession::open(app.state.clone(), local, &MemoryStore::new(), RequestContext::default())
}

fn mobile() -> RequestContext {
    RequestContext {
        user_agent: Some("Mozilla/5.0 (Linux; Android 14; Pixel 8) Chrome/126.0 Mobile Safari/537.36".to_string()),
        referrer: Some("https://www.google.com/".to_string()),
        page_url: Some("https://banderasmdp.com/tienda/carrito?utm_campaign=patrias".to_string()),
    }
}

#[tokio::test]
async fn empty_cart_never_reaches_storage() {
    let app = test_app();
    let mut shopper = open(&app);
    shopper.provide_customer_info(&customer_form()).await.unwrap();

    let err = shopper.checkout(mobile()).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = order_service::submit_order(
        &app.state,
        CheckoutInput {
            session_id: None,
            lines: &[],
            customer: OrderCustomer::default(),
            context: RequestContext::default(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(app.orders.count().await, 0);
}

#[tokio::test]
async fn checkout_requires_customer_info() {
    let app = test_app();
    let mut shopper = open(&app);
    shopper.cart_mut().add_item(&flag(), 1, None).unwrap();

    let err = shopper.checkout(mobile()).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(app.orders.count().await, 0);
}

#[tokio::test]
async fn checkout_records_order_and_builds_chat_link() {
    let mut sink = MockSink::new();
    sink.expect_track()
        .with(function(|event: &TrackingEvent| event.kind == TrackingKind::AddToCart))
        .times(2)
        .return_const(());
    sink.expect_track()
        .with(function(|event: &TrackingEvent| {
            event.kind == TrackingKind::BeginCheckout
                && event.value == Some(Decimal::from(3500))
                && event.quantity == 3
        }))
        .times(1)
        .return_const(());
    sink.expect_track()
        .with(function(|event: &TrackingEvent| event.kind == TrackingKind::Purchase))
        .times(2)
        .return_const(());

    let mut app = test_app();
    app.state.tracker = Arc::new(sink);
    let mut shopper = open(&app);
    let flag = flag();

    shopper.cart_mut().add_item(&flag, 2, None).unwrap();
    shopper.cart_mut().add_item(&flag, 1, flag.variants.first()).unwrap();
    shopper.provide_customer_info(&customer_form()).await.unwrap();

    let receipt = shopper.checkout(mobile()).await.unwrap();
    let order = &receipt.order;

    let number = Regex::new(r"^ECOM-\d{8}-\d{6}-[A-Z0-9]{3}$").unwrap();
    assert!(number.is_match(&order.order_number), "{}", order.order_number);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.source, OrderSource::Web);
    assert_eq!(order.total, Decimal::from(3500));
    assert_eq!(order.subtotal, order.total);
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.customer.email.as_deref(), Some("ana@example.com"));
    assert_eq!(order.metadata.device_type, DeviceType::Mobile);
    assert_eq!(order.metadata.utm_campaign.as_deref(), Some("patrias"));
    assert_eq!(order.metadata.session_id.as_deref(), Some(shopper.session_id().as_str()));
    assert!(!order.whatsapp_message_sent);
    assert_eq!(order.whatsapp_conversation_url.as_deref(), Some(receipt.whatsapp_url.as_str()));

    let (_, encoded) = receipt.whatsapp_url.split_once("?text=").unwrap();
    assert!(receipt.whatsapp_url.starts_with("https://wa.me/5492235416600?text="));
    let text = urlencoding::decode(encoded).unwrap();
    assert!(text.contains(&format!("Pedido: {}", order.order_number)));
    assert!(text.contains("Bandera Argentina (90x150)"));
    assert!(text.contains("*Total: $3.500*"));

    let record = app
        .carts
        .find_by_session(shopper.session_id().as_str())
        .await
        .unwrap()
        .expect("mirrored before checkout");
    assert_eq!(record.status, CartRecordStatus::Converted);
    assert_eq!(record.converted_order_id, Some(order.id));

    // Left intact unless configured otherwise.
    assert_eq!(shopper.cart().item_count(), 3);
}

#[tokio::test]
async fn cart_can_be_cleared_after_checkout() {
    let mut config = AppConfig::new("postgres://unused");
    config.clear_cart_after_checkout = true;
    let app = test_app_with(config);
    let mut shopper = open(&app);

    shopper.cart_mut().add_item(&flag(), 1, None).unwrap();
    shopper.provide_customer_info(&customer_form()).await.unwrap();
    shopper.checkout(mobile()).await.unwrap();

    assert!(shopper.cart().is_empty());
    assert_eq!(app.orders.count().await, 1);
}

#[tokio::test]
async fn unreadable_price_blocks_the_order() {
    let app = test_app();
    let mut shopper = open(&app);
    let quoted = product("P9", "Bandera a medida", Numeric::from("consultar"), None);

    shopper.cart_mut().add_item(&quoted, 1, None).unwrap();
    shopper.provide_customer_info(&customer_form()).await.unwrap();

    let err = shopper.checkout(mobile()).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(app.orders.count().await, 0);
}

#[tokio::test]
async fn conversion_failure_does_not_fail_checkout() {
    let app = test_app();
    let mut shopper = open(&app);
    shopper.cart_mut().add_item(&flag(), 1, None).unwrap();
    shopper.provide_customer_info(&customer_form()).await.unwrap();

    app.carts.set_offline(true);
    let receipt = shopper.checkout(mobile()).await.unwrap();

    assert_eq!(app.orders.count().await, 1);
    assert_eq!(receipt.order.total, Decimal::from(1000));
}

#[tokio::test]
async fn back_office_updates_stamp_the_order() {
    let app = test_app();
    let mut shopper = open(&app);
    shopper.cart_mut().add_item(&flag(), 1, None).unwrap();
    shopper.provide_customer_info(&customer_form()).await.unwrap();
    let order = shopper.checkout(mobile()).await.unwrap().order;

    let confirmed = order_service::update_status(&app.state, order.id, OrderStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(confirmed.status, OrderStatus::Confirmed);
    assert!(confirmed.confirmed_at.is_some());
    assert!(confirmed.shipped_at.is_none());

    let noted = order_service::set_internal_notes(&app.state, order.id, "retira en local".into())
        .await
        .unwrap();
    assert_eq!(noted.internal_notes.as_deref(), Some("retira en local"));

    let err = order_service::link_fulfillment(&app.state, order.id, "  ".into())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    let linked = order_service::link_fulfillment(&app.state, order.id, "VTA-0042".into())
        .await
        .unwrap();
    assert_eq!(linked.fulfillment_id.as_deref(), Some("VTA-0042"));

    let missing = order_service::update_status(&app.state, uuid::Uuid::new_v4(), OrderStatus::Shipped).await;
    assert!(matches!(missing, Err(AppError::NotFound)));
}

#[tokio::test]
async fn checkout_endpoint_reads_the_user_agent_header() {
    let app = test_app();
    let flag = flag();
    let mut headers = HeaderMap::new();
    headers.insert(
        header::USER_AGENT,
        HeaderValue::from_static("Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X) Safari/604.1"),
    );
    let request = CheckoutRequest {
        session_id: Some("session_http".to_string()),
        items: vec![CartLine {
            product: flag,
            quantity: 2,
            selected_variant: None,
        }],
        customer: customer_form(),
        page_url: Some("/tienda/carrito".to_string()),
        referrer: None,
    };

    let (status, Json(body)) = orders::checkout(State(app.state.clone()), headers, Json(request))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::CREATED);

    let receipt = body.data.unwrap();
    assert_eq!(receipt.order.metadata.device_type, DeviceType::Tablet);
    assert_eq!(receipt.order.metadata.last_page.as_deref(), Some("/tienda/carrito"));
    assert_eq!(receipt.order.total, Decimal::from(2000));
}

fn checkout_request(items: Vec<CartLine>) -> CheckoutRequest {
    CheckoutRequest {
        session_id: None,
        items,
        customer: customer_form(),
        page_url: None,
        referrer: None,
    }
}

#[tokio::test]
async fn checkout_endpoint_rejects_lines_without_units() {
    let app = test_app();
    let request = checkout_request(vec![CartLine {
        product: flag(),
        quantity: 0,
        selected_variant: None,
    }]);

    let err = orders::checkout(State(app.state.clone()), HeaderMap::new(), Json(request))
        .await
        .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.orders.count().await, 0);
}

#[tokio::test]
async fn checkout_endpoint_merges_repeated_lines() {
    let app = test_app();
    let line = CartLine {
        product: flag(),
        quantity: 1,
        selected_variant: None,
    };
    let request = checkout_request(vec![line.clone(), line]);

    let (_, Json(body)) = orders::checkout(State(app.state.clone()), HeaderMap::new(), Json(request))
        .await
        .unwrap();
    let order = body.data.unwrap().order;
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].quantity, 2);
    assert_eq!(order.items[0].subtotal, Decimal::from(2000));
    assert_eq!(order.total, Decimal::from(2000));
}

#[tokio::test]
async fn mirror_endpoint_recomputes_client_totals() {
    let app = test_app();
    let flag = flag();
    let line = CartLine {
        product: flag.clone(),
        quantity: 1,
        selected_variant: flag.variants.first().cloned(),
    };
    let mut item = line.snapshot().unwrap();
    item.subtotal = Decimal::from(1);

    let request = MirrorCartRequest {
        items: vec![item.clone(), item.clone()],
        customer: None,
        revision: 1,
        context: RequestContext::default(),
    };
    carts::mirror_cart(
        State(app.state.clone()),
        Path("session_http".to_string()),
        HeaderMap::new(),
        Json(request),
    )
    .await
    .unwrap();

    let record = app.carts.find_by_session("session_http").await.unwrap().unwrap();
    assert_eq!(record.items.len(), 1);
    assert_eq!(record.items[0].quantity, 2);
    assert_eq!(record.items[0].subtotal, Decimal::from(3000));
    assert_eq!(record.items_count, 2);
    assert_eq!(record.total, Decimal::from(3000));

    item.quantity = 0;
    let empty_line = MirrorCartRequest {
        items: vec![item],
        customer: None,
        revision: 2,
        context: RequestContext::default(),
    };
    let err = carts::mirror_cart(
        State(app.state.clone()),
        Path("session_http".to_string()),
        HeaderMap::new(),
        Json(empty_line),
    )
    .await
    .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn recovery_endpoint_maps_failures_to_statuses() {
    let app = test_app();

    let missing = carts::recover_cart(State(app.state.clone()), Path("nobody".to_string()))
        .await
        .unwrap_err();
    assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

    let mut shopper = open(&app);
    shopper.cart_mut().add_item(&flag(), 1, None).unwrap();
    shopper.provide_customer_info(&customer_form()).await.unwrap();
    shopper.checkout(mobile()).await.unwrap();

    let converted = carts::recover_cart(
        State(app.state.clone()),
        Path(shopper.session_id().to_string()),
    )
    .await
    .unwrap_err();
    assert_eq!(converted.into_response().status(), StatusCode::CONFLICT);

    app.carts.set_offline(true);
    let offline = carts::recover_cart(State(app.state.clone()), Path("nobody".to_string()))
        .await
        .unwrap_err();
    assert_eq!(offline.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
}
