use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::OrmConn,
    repository::{
        AbandonedCartRepository, OrderRepository, ProductRepository,
        memory::{MemoryAbandonedCarts, MemoryOrders, MemoryProducts},
        postgres::{PgAbandonedCarts, PgOrders, PgProducts},
    },
    tracking::{LogTracker, TrackingSink},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub products: Arc<dyn ProductRepository>,
    pub carts: Arc<dyn AbandonedCartRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub tracker: Arc<dyn TrackingSink>,
}

impl AppState {
    pub fn postgres(config: AppConfig, orm: OrmConn, tracker: Arc<dyn TrackingSink>) -> Self {
        Self {
            config: Arc::new(config),
            products: Arc::new(PgProducts::new(orm.clone())),
            carts: Arc::new(PgAbandonedCarts::new(orm.clone())),
            orders: Arc::new(PgOrders::new(orm)),
            tracker,
        }
    }

    /// Empty in-memory collections with events going to the log.
    pub fn in_memory(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            products: Arc::new(MemoryProducts::default()),
            carts: Arc::new(MemoryAbandonedCarts::new()),
            orders: Arc::new(MemoryOrders::new()),
            tracker: Arc::new(LogTracker),
        }
    }
}
