#![allow(dead_code)]

use std::sync::Arc;

use flag_storefront::{
    config::AppConfig,
    customer::CustomerForm,
    models::{Product, ProductVariant},
    pricing::Numeric,
    repository::memory::{MemoryAbandonedCarts, MemoryOrders, MemoryProducts},
    state::AppState,
};

/// In-memory state plus direct handles on the collections behind it.
pub struct TestApp {
    pub state: AppState,
    pub carts: Arc<MemoryAbandonedCarts>,
    pub orders: Arc<MemoryOrders>,
}

pub fn test_app() -> TestApp {
    test_app_with(AppConfig::new("postgres://unused"))
}

pub fn test_app_with(config: AppConfig) -> TestApp {
    let carts = Arc::new(MemoryAbandonedCarts::new());
    let orders = Arc::new(MemoryOrders::new());
    let state = AppState {
        carts: carts.clone(),
        orders: orders.clone(),
        products: Arc::new(MemoryProducts::new(vec![flag(), ceremony_flag()])),
        ..AppState::in_memory(config)
    };
    TestApp {
        state,
        carts,
        orders,
    }
}

pub fn product(id: &str, name: &str, price: Numeric, stock: Option<Numeric>) -> Product {
    Product {
        id: id.to_string(),
        name: name.to_string(),
        slug: None,
        sku: format!("SKU-{id}"),
        description: None,
        price,
        stock,
        variants: Vec::new(),
        categories: vec!["banderas".to_string()],
        image_urls: Vec::new(),
        ecommerce: true,
    }
}

pub fn variant(id: &str, size: &str, price: Numeric) -> ProductVariant {
    ProductVariant {
        id: id.to_string(),
        size: size.to_string(),
        name: None,
        price,
        stock: None,
        sku: None,
    }
}

/// Base price 1000 with a 90x150 variant at 1500.
pub fn flag() -> Product {
    let mut flag = product("P1", "Bandera Argentina", Numeric::from(1000_i64), None);
    flag.variants = vec![variant("V1", "90x150", Numeric::from("1500"))];
    flag
}

pub fn ceremony_flag() -> Product {
    product(
        "prd_bandera_ceremonia",
        "Bandera de Ceremonia",
        Numeric::from("18500"),
        Some(Numeric::from("8")),
    )
}

pub fn customer_form() -> CustomerForm {
    CustomerForm {
        name: "Ana Pérez".to_string(),
        email: "ana@example.com".to_string(),
        phone: "2235416600".to_string(),
    }
}
