mod common;

use std::sync::Arc;

use flag_storefront::{
    error::AppError,
    pricing::Numeric,
    repository::memory::MemoryProducts,
    routes::params::ProductQuery,
    services::product_service,
    state::AppState,
    tracking::{TrackingEvent, TrackingKind, TrackingSink},
};
use mockall::{mock, predicate::function};

use common::{ceremony_flag, flag, product, test_app};

mock! {
    Sink {}

    impl TrackingSink for Sink {
        fn track(&self, event: TrackingEvent);
    }
}

fn catalog_with(sink: MockSink) -> AppState {
    let mut mast = product("M1", "Mástil de aluminio", Numeric::from(25000_i64), None);
    mast.categories = vec!["mastiles".to_string()];

    AppState {
        products: Arc::new(MemoryProducts::new(vec![flag(), ceremony_flag(), mast])),
        tracker: Arc::new(sink),
        ..test_app().state
    }
}

#[tokio::test]
async fn category_filter_matches_exact_category() {
    // Browsing without a search term records nothing.
    let state = catalog_with(MockSink::new());

    let query = ProductQuery {
        category: Some("mastiles".to_string()),
        ..Default::default()
    };
    let items = product_service::list_products(&state, query, None)
        .await
        .unwrap()
        .data
        .unwrap()
        .items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "M1");

    let query = ProductQuery {
        category: Some("banderas".to_string()),
        ..Default::default()
    };
    let items = product_service::list_products(&state, query, None)
        .await
        .unwrap()
        .data
        .unwrap()
        .items;
    assert_eq!(items.len(), 2);

    let query = ProductQuery {
        category: Some("bander".to_string()),
        ..Default::default()
    };
    let items = product_service::list_products(&state, query, None)
        .await
        .unwrap()
        .data
        .unwrap()
        .items;
    assert!(items.is_empty());
}

#[tokio::test]
async fn searches_are_recorded_with_result_count() {
    let mut sink = MockSink::new();
    sink.expect_track()
        .with(function(|event: &TrackingEvent| {
            event.kind == TrackingKind::Search
                && event.search_term.as_deref() == Some("bandera")
                && event.quantity == 2
                && event.session_id.as_deref() == Some("session_1")
                && event.product_id.is_none()
        }))
        .times(1)
        .return_const(());
    let state = catalog_with(sink);

    let query = ProductQuery {
        q: Some("  BANDERA ".to_string()),
        ..Default::default()
    };
    let items = product_service::list_products(&state, query, Some("session_1"))
        .await
        .unwrap()
        .data
        .unwrap()
        .items;
    assert_eq!(items.len(), 2);
}

#[tokio::test]
async fn product_views_are_counted_once_found() {
    let mut sink = MockSink::new();
    sink.expect_track()
        .with(function(|event: &TrackingEvent| {
            event.kind == TrackingKind::ViewItem
                && event.product_id.as_deref() == Some("P1")
                && event.category.as_deref() == Some("banderas")
                && event.session_id.as_deref() == Some("session_1")
        }))
        .times(2)
        .return_const(());
    let state = catalog_with(sink);

    product_service::get_product(&state, "P1", Some("session_1"))
        .await
        .unwrap();
    let by_slug =
        product_service::get_product_by_slug(&state, "bandera-argentina-P1", Some("session_1"))
            .await
            .unwrap();
    assert_eq!(by_slug.id, "P1");

    let missing = product_service::get_product(&state, "nope", Some("session_1")).await;
    assert!(matches!(missing, Err(AppError::NotFound)));
    let missing = product_service::get_product_by_slug(&state, "sin-producto", None).await;
    assert!(matches!(missing, Err(AppError::NotFound)));
}
