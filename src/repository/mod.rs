//! Storage seams for the three server-side collections. Services only see
//! these traits; `postgres` backs production and `memory` backs tests and
//! local runs.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        AbandonedCart, CartMirrorWrite, CartRecordStatus, ContactSnapshot, NewOrder, Order,
        OrderStatus, Product,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u64,
    pub offset: u64,
}

impl PageRequest {
    pub fn new(limit: u64, offset: u64) -> Self {
        Self { limit, offset }
    }
}

/// Storefront list filters. `category` must match one of a product's
/// categories exactly.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductFilter<'a> {
    pub search: Option<&'a str>,
    pub category: Option<&'a str>,
}

/// What a mirror write did to the session's record.
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorOutcome {
    Created(AbandonedCart),
    Updated(AbandonedCart),
    /// The record is converted and was left untouched.
    SkippedConverted(Uuid),
    /// A newer revision was already stored.
    SkippedStale(Uuid),
}

impl MirrorOutcome {
    pub fn cart_id(&self) -> Uuid {
        match self {
            MirrorOutcome::Created(cart) | MirrorOutcome::Updated(cart) => cart.id,
            MirrorOutcome::SkippedConverted(id) | MirrorOutcome::SkippedStale(id) => *id,
        }
    }

    pub fn applied(&self) -> bool {
        matches!(self, MirrorOutcome::Created(_) | MirrorOutcome::Updated(_))
    }
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Storefront-visible products, optionally filtered by name or sku and
    /// by category.
    async fn list(
        &self,
        filter: ProductFilter<'_>,
        page: PageRequest,
    ) -> AppResult<(Vec<Product>, u64)>;

    async fn get(&self, id: &str) -> AppResult<Option<Product>>;

    async fn find_by_slug(&self, slug: &str) -> AppResult<Option<Product>>;

    async fn find_by_id_suffix(&self, suffix: &str) -> AppResult<Vec<Product>>;
}

#[async_trait]
pub trait AbandonedCartRepository: Send + Sync {
    async fn find_by_session(&self, session_id: &str) -> AppResult<Option<AbandonedCart>>;

    async fn get(&self, id: Uuid) -> AppResult<Option<AbandonedCart>>;

    /// Creates the session's record, or refreshes its contents unless it is
    /// converted or already holds a newer revision.
    async fn upsert(&self, session_id: &str, write: &CartMirrorWrite) -> AppResult<MirrorOutcome>;

    /// Returns false when there is no unconverted record for the session.
    async fn update_customer(&self, session_id: &str, customer: &ContactSnapshot) -> AppResult<bool>;

    /// Returns false when the record is missing or converted.
    async fn mark_abandoned(&self, id: Uuid) -> AppResult<bool>;

    /// Converts the session's record in one step. Returns its id, or `None`
    /// when there was nothing left to convert.
    async fn mark_converted(&self, session_id: &str, order_id: Uuid) -> AppResult<Option<Uuid>>;

    async fn record_recovery_message(&self, id: Uuid) -> AppResult<Option<AbandonedCart>>;

    /// Most recent activity first.
    async fn list(
        &self,
        status: Option<CartRecordStatus>,
        page: PageRequest,
    ) -> AppResult<(Vec<AbandonedCart>, u64)>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(&self, order: NewOrder) -> AppResult<Order>;

    async fn get(&self, id: Uuid) -> AppResult<Option<Order>>;

    async fn list(
        &self,
        status: Option<OrderStatus>,
        newest_first: bool,
        page: PageRequest,
    ) -> AppResult<(Vec<Order>, u64)>;

    /// Sets the status and stamps the matching lifecycle timestamp.
    async fn update_status(&self, id: Uuid, status: OrderStatus) -> AppResult<Option<Order>>;

    async fn set_internal_notes(&self, id: Uuid, notes: String) -> AppResult<Option<Order>>;

    async fn link_fulfillment(&self, id: Uuid, fulfillment_id: String) -> AppResult<Option<Order>>;
}
