pub mod abandoned_carts;
pub mod ecommerce_orders;
pub mod products;

pub use abandoned_carts::Entity as AbandonedCarts;
pub use ecommerce_orders::Entity as EcommerceOrders;
pub use products::Entity as Products;
