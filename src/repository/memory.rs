//! Process-local repositories. Each collection sits behind one lock, so the
//! conditional updates are atomic the same way the SQL ones are.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        AbandonedCart, CartMirrorWrite, CartRecordStatus, ContactSnapshot, NewOrder, Order,
        OrderStatus, Product,
    },
};

use super::{
    AbandonedCartRepository, MirrorOutcome, OrderRepository, PageRequest, ProductFilter,
    ProductRepository,
};

fn page_of<T: Clone>(items: &[T], page: PageRequest) -> Vec<T> {
    items
        .iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .cloned()
        .collect()
}

/// Lets tests take a backend offline to exercise transient failures.
#[derive(Debug, Default)]
struct Availability(AtomicBool);

impl Availability {
    fn set_offline(&self, offline: bool) {
        self.0.store(offline, Ordering::SeqCst);
    }

    fn check(&self, what: &str) -> AppResult<()> {
        if self.0.load(Ordering::SeqCst) {
            return Err(AppError::Unavailable(format!("{what} store is offline")));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryProducts {
    products: RwLock<Vec<Product>>,
}

impl MemoryProducts {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products: RwLock::new(products),
        }
    }

    pub async fn insert(&self, product: Product) {
        let mut products = self.products.write().await;
        products.retain(|existing| existing.id != product.id);
        products.push(product);
    }
}

#[async_trait]
impl ProductRepository for MemoryProducts {
    async fn list(
        &self,
        filter: ProductFilter<'_>,
        page: PageRequest,
    ) -> AppResult<(Vec<Product>, u64)> {
        let products = self.products.read().await;
        let needle = filter.search.map(str::to_lowercase);
        let mut matches: Vec<Product> = products
            .iter()
            .filter(|product| product.ecommerce)
            .filter(|product| {
                filter
                    .category
                    .is_none_or(|category| product.categories.iter().any(|c| c == category))
            })
            .filter(|product| match &needle {
                Some(needle) => {
                    product.name.to_lowercase().contains(needle)
                        || product.sku.to_lowercase().contains(needle)
                }
                None => true,
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name));

        let total = matches.len() as u64;
        Ok((page_of(&matches, page), total))
    }

    async fn get(&self, id: &str) -> AppResult<Option<Product>> {
        let products = self.products.read().await;
        Ok(products.iter().find(|product| product.id == id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> AppResult<Option<Product>> {
        let products = self.products.read().await;
        Ok(products
            .iter()
            .find(|product| product.ecommerce && product.slug.as_deref() == Some(slug))
            .cloned())
    }

    async fn find_by_id_suffix(&self, suffix: &str) -> AppResult<Vec<Product>> {
        let products = self.products.read().await;
        Ok(products
            .iter()
            .filter(|product| product.ecommerce && product.id.ends_with(suffix))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryAbandonedCarts {
    records: RwLock<HashMap<Uuid, AbandonedCart>>,
    mirror_writes: AtomicUsize,
    availability: Availability,
}

impl MemoryAbandonedCarts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mirror writes that changed a record.
    pub fn mirror_writes(&self) -> usize {
        self.mirror_writes.load(Ordering::SeqCst)
    }

    pub fn set_offline(&self, offline: bool) {
        self.availability.set_offline(offline);
    }

    /// Stores a record as-is, replacing any with the same id.
    pub async fn put(&self, cart: AbandonedCart) {
        self.records.write().await.insert(cart.id, cart);
    }
}

fn new_cart(session_id: &str, write: &CartMirrorWrite, now: DateTime<Utc>) -> AbandonedCart {
    AbandonedCart {
        id: Uuid::new_v4(),
        session_id: session_id.to_string(),
        customer: write.customer.clone(),
        items: write.items.clone(),
        items_count: write.items_count,
        subtotal: write.total,
        total: write.total,
        status: CartRecordStatus::Active,
        converted_order_id: None,
        recovery_messages_sent: 0,
        last_recovery_message_at: None,
        metadata: write.metadata.clone(),
        revision: write.revision,
        first_added_at: now,
        last_activity_at: now,
        abandoned_at: None,
        converted_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl AbandonedCartRepository for MemoryAbandonedCarts {
    async fn find_by_session(&self, session_id: &str) -> AppResult<Option<AbandonedCart>> {
        self.availability.check("abandoned cart")?;
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|cart| cart.session_id == session_id)
            .cloned())
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<AbandonedCart>> {
        self.availability.check("abandoned cart")?;
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn upsert(&self, session_id: &str, write: &CartMirrorWrite) -> AppResult<MirrorOutcome> {
        self.availability.check("abandoned cart")?;
        let mut records = self.records.write().await;
        let now = Utc::now();

        let existing = records
            .values()
            .find(|cart| cart.session_id == session_id)
            .map(|cart| cart.id);
        let outcome = match existing.and_then(|id| records.get_mut(&id)) {
            Some(cart) if cart.is_converted() => return Ok(MirrorOutcome::SkippedConverted(cart.id)),
            Some(cart) if write.revision <= cart.revision => {
                return Ok(MirrorOutcome::SkippedStale(cart.id));
            }
            Some(cart) => {
                cart.items = write.items.clone();
                cart.items_count = write.items_count;
                cart.subtotal = write.total;
                cart.total = write.total;
                if let Some(customer) = &write.customer {
                    cart.customer = Some(customer.clone());
                }
                cart.metadata = write.metadata.clone();
                cart.revision = write.revision;
                cart.last_activity_at = now;
                cart.updated_at = now;
                MirrorOutcome::Updated(cart.clone())
            }
            None => {
                let cart = new_cart(session_id, write, now);
                records.insert(cart.id, cart.clone());
                MirrorOutcome::Created(cart)
            }
        };

        self.mirror_writes.fetch_add(1, Ordering::SeqCst);
        Ok(outcome)
    }

    async fn update_customer(&self, session_id: &str, customer: &ContactSnapshot) -> AppResult<bool> {
        self.availability.check("abandoned cart")?;
        let mut records = self.records.write().await;
        match records
            .values_mut()
            .find(|cart| cart.session_id == session_id && !cart.is_converted())
        {
            Some(cart) => {
                cart.customer = Some(customer.clone());
                cart.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_abandoned(&self, id: Uuid) -> AppResult<bool> {
        self.availability.check("abandoned cart")?;
        let mut records = self.records.write().await;
        match records.get_mut(&id).filter(|cart| !cart.is_converted()) {
            Some(cart) => {
                let now = Utc::now();
                cart.status = CartRecordStatus::Abandoned;
                cart.abandoned_at = Some(now);
                cart.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_converted(&self, session_id: &str, order_id: Uuid) -> AppResult<Option<Uuid>> {
        self.availability.check("abandoned cart")?;
        let mut records = self.records.write().await;
        match records
            .values_mut()
            .find(|cart| cart.session_id == session_id && !cart.is_converted())
        {
            Some(cart) => {
                let now = Utc::now();
                cart.status = CartRecordStatus::Converted;
                cart.converted_order_id = Some(order_id);
                cart.converted_at = Some(now);
                cart.updated_at = now;
                Ok(Some(cart.id))
            }
            None => Ok(None),
        }
    }

    async fn record_recovery_message(&self, id: Uuid) -> AppResult<Option<AbandonedCart>> {
        self.availability.check("abandoned cart")?;
        let mut records = self.records.write().await;
        Ok(records.get_mut(&id).map(|cart| {
            let now = Utc::now();
            cart.recovery_messages_sent += 1;
            cart.last_recovery_message_at = Some(now);
            cart.updated_at = now;
            cart.clone()
        }))
    }

    async fn list(
        &self,
        status: Option<CartRecordStatus>,
        page: PageRequest,
    ) -> AppResult<(Vec<AbandonedCart>, u64)> {
        self.availability.check("abandoned cart")?;
        let records = self.records.read().await;
        let mut carts: Vec<AbandonedCart> = records
            .values()
            .filter(|cart| status.is_none_or(|status| cart.status == status))
            .cloned()
            .collect();
        carts.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));

        let total = carts.len() as u64;
        Ok((page_of(&carts, page), total))
    }
}

/// Applies a status change and its lifecycle timestamp.
pub fn apply_status(order: &mut Order, status: OrderStatus, now: DateTime<Utc>) {
    order.status = status;
    order.updated_at = now;
    match status {
        OrderStatus::Confirmed => order.confirmed_at = Some(now),
        OrderStatus::Shipped => order.shipped_at = Some(now),
        OrderStatus::Delivered => order.delivered_at = Some(now),
        OrderStatus::Cancelled => order.cancelled_at = Some(now),
        OrderStatus::Pending | OrderStatus::Preparing => {}
    }
}

#[derive(Debug, Default)]
pub struct MemoryOrders {
    orders: RwLock<Vec<Order>>,
    availability: Availability,
}

impl MemoryOrders {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.orders.read().await.len()
    }

    pub fn set_offline(&self, offline: bool) {
        self.availability.set_offline(offline);
    }

    async fn modify(&self, id: Uuid, change: impl FnOnce(&mut Order) + Send) -> AppResult<Option<Order>> {
        self.availability.check("order")?;
        let mut orders = self.orders.write().await;
        Ok(orders.iter_mut().find(|order| order.id == id).map(|order| {
            change(order);
            order.clone()
        }))
    }
}

#[async_trait]
impl OrderRepository for MemoryOrders {
    async fn insert(&self, order: NewOrder) -> AppResult<Order> {
        self.availability.check("order")?;
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            order_number: order.order_number,
            customer: order.customer,
            items: order.items,
            subtotal: order.subtotal,
            shipping_cost: order.shipping_cost,
            discount: order.discount,
            total: order.total,
            status: order.status,
            source: order.source,
            metadata: order.metadata,
            internal_notes: None,
            whatsapp_message_sent: order.whatsapp_message_sent,
            whatsapp_conversation_url: order.whatsapp_conversation_url,
            fulfillment_id: None,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
        };
        self.orders.write().await.push(order.clone());
        Ok(order)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Order>> {
        self.availability.check("order")?;
        let orders = self.orders.read().await;
        Ok(orders.iter().find(|order| order.id == id).cloned())
    }

    async fn list(
        &self,
        status: Option<OrderStatus>,
        newest_first: bool,
        page: PageRequest,
    ) -> AppResult<(Vec<Order>, u64)> {
        self.availability.check("order")?;
        let orders = self.orders.read().await;
        let mut matches: Vec<Order> = orders
            .iter()
            .filter(|order| status.is_none_or(|status| order.status == status))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        if newest_first {
            matches.reverse();
        }

        let total = matches.len() as u64;
        Ok((page_of(&matches, page), total))
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> AppResult<Option<Order>> {
        self.modify(id, |order| apply_status(order, status, Utc::now()))
            .await
    }

    async fn set_internal_notes(&self, id: Uuid, notes: String) -> AppResult<Option<Order>> {
        self.modify(id, |order| {
            order.internal_notes = Some(notes);
            order.updated_at = Utc::now();
        })
        .await
    }

    async fn link_fulfillment(&self, id: Uuid, fulfillment_id: String) -> AppResult<Option<Order>> {
        self.modify(id, |order| {
            order.fulfillment_id = Some(fulfillment_id);
            order.updated_at = Utc::now();
        })
        .await
    }
}
