pub mod abandoned_cart_service;
pub mod order_service;
pub mod product_service;
