//! Shopper analytics: product views, searches and cart activity. Events are
//! queued without blocking the caller and written by a background task; a
//! lost event is logged, never surfaced.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    cart::{CartEvent, CartLine, CartListener},
    error::AppResult,
    models::{ItemSnapshot, Product},
    session::SessionId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingKind {
    AddToCart,
    RemoveFromCart,
    BeginCheckout,
    Purchase,
    ViewItem,
    Search,
}

impl TrackingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingKind::AddToCart => "add_to_cart",
            TrackingKind::RemoveFromCart => "remove_from_cart",
            TrackingKind::BeginCheckout => "begin_checkout",
            TrackingKind::Purchase => "purchase",
            TrackingKind::ViewItem => "view_item",
            TrackingKind::Search => "search",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingEvent {
    pub kind: TrackingKind,
    pub session_id: Option<String>,
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub product_sku: Option<String>,
    pub variant: Option<String>,
    pub category: Option<String>,
    pub search_term: Option<String>,
    /// Units for cart events, matching products for searches.
    pub quantity: u32,
    /// Money attached to the event, when the price could be read.
    pub value: Option<Decimal>,
    pub occurred_at: DateTime<Utc>,
}

impl TrackingEvent {
    fn for_line(kind: TrackingKind, line: &CartLine, quantity: u32, session: &SessionId) -> Self {
        Self {
            kind,
            session_id: Some(session.to_string()),
            product_id: Some(line.product.id.clone()),
            product_name: Some(line.product.name.clone()),
            product_sku: Some(line.product.sku.clone()).filter(|sku| !sku.is_empty()),
            variant: line
                .selected_variant
                .as_ref()
                .map(|variant| variant.label().to_string()),
            category: line.product.categories.first().cloned(),
            search_term: None,
            quantity,
            value: line
                .unit_price()
                .ok()
                .map(|price| price * Decimal::from(quantity)),
            occurred_at: Utc::now(),
        }
    }

    pub fn add_to_cart(line: &CartLine, quantity: u32, session: &SessionId) -> Self {
        Self::for_line(TrackingKind::AddToCart, line, quantity, session)
    }

    pub fn remove_from_cart(line: &CartLine, quantity: u32, session: &SessionId) -> Self {
        Self::for_line(TrackingKind::RemoveFromCart, line, quantity, session)
    }

    pub fn begin_checkout(total: Decimal, items_count: u32, session: &SessionId) -> Self {
        Self {
            kind: TrackingKind::BeginCheckout,
            session_id: Some(session.to_string()),
            product_id: None,
            product_name: None,
            product_sku: None,
            variant: None,
            category: None,
            search_term: None,
            quantity: items_count,
            value: Some(total),
            occurred_at: Utc::now(),
        }
    }

    pub fn purchase(item: &ItemSnapshot, session_id: Option<&str>) -> Self {
        Self {
            kind: TrackingKind::Purchase,
            session_id: session_id.map(str::to_string),
            product_id: Some(item.product_id.clone()),
            product_name: Some(item.product_name.clone()),
            product_sku: Some(item.product_sku.clone()).filter(|sku| !sku.is_empty()),
            variant: item.variant.as_ref().map(|variant| variant.name.clone()),
            category: None,
            search_term: None,
            quantity: item.quantity,
            value: Some(item.subtotal),
            occurred_at: Utc::now(),
        }
    }

    pub fn view_item(product: &Product, session_id: Option<&str>) -> Self {
        Self {
            kind: TrackingKind::ViewItem,
            session_id: session_id.map(str::to_string),
            product_id: Some(product.id.clone()),
            product_name: Some(product.name.clone()),
            product_sku: Some(product.sku.clone()).filter(|sku| !sku.is_empty()),
            variant: None,
            category: product.categories.first().cloned(),
            search_term: None,
            quantity: 1,
            value: None,
            occurred_at: Utc::now(),
        }
    }

    /// The term is stored lowercased and trimmed.
    pub fn search(term: &str, results_count: u64, session_id: Option<&str>) -> Self {
        Self {
            kind: TrackingKind::Search,
            session_id: session_id.map(str::to_string),
            product_id: None,
            product_name: None,
            product_sku: None,
            variant: None,
            category: None,
            search_term: Some(term.trim().to_lowercase()),
            quantity: u32::try_from(results_count).unwrap_or(u32::MAX),
            value: None,
            occurred_at: Utc::now(),
        }
    }
}

/// Receives analytics events. `track` must return immediately.
pub trait TrackingSink: Send + Sync {
    fn track(&self, event: TrackingEvent);
}

/// Logs events at debug level and keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTracker;

impl TrackingSink for LogTracker {
    fn track(&self, event: TrackingEvent) {
        tracing::debug!(
            kind = event.kind.as_str(),
            product_id = event.product_id.as_deref().unwrap_or("-"),
            quantity = event.quantity,
            "tracking event"
        );
    }
}

/// Hands events to a bounded queue drained by [`spawn_event_writer`].
#[derive(Debug, Clone)]
pub struct ChannelTracker {
    tx: mpsc::Sender<TrackingEvent>,
}

impl ChannelTracker {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TrackingEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl TrackingSink for ChannelTracker {
    fn track(&self, event: TrackingEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(kind = event.kind.as_str(), "tracking queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                tracing::warn!(kind = event.kind.as_str(), "tracking writer stopped, dropping event");
            }
        }
    }
}

/// Drains the queue into `cart_events` and the per-product counters.
pub fn spawn_event_writer(pool: PgPool, mut rx: mpsc::Receiver<TrackingEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Err(err) = write_event(&pool, &event).await {
                tracing::warn!(error = %err, kind = event.kind.as_str(), "tracking write failed");
            }
        }
        tracing::debug!("tracking writer finished");
    })
}

pub async fn write_event(pool: &PgPool, event: &TrackingEvent) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO cart_events
            (id, kind, session_id, product_id, variant, category, search_term, quantity, value, occurred_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(uuid::Uuid::new_v4())
    .bind(event.kind.as_str())
    .bind(&event.session_id)
    .bind(&event.product_id)
    .bind(&event.variant)
    .bind(&event.category)
    .bind(&event.search_term)
    .bind(i64::from(event.quantity))
    .bind(event.value)
    .bind(event.occurred_at)
    .execute(pool)
    .await?;

    let Some(product_id) = &event.product_id else {
        return Ok(());
    };
    let quantity = i64::from(event.quantity);
    let (views, added, removed, purchased, revenue) = match event.kind {
        TrackingKind::ViewItem => (1_i64, 0, 0, 0, Decimal::ZERO),
        TrackingKind::AddToCart => (0, quantity, 0, 0, Decimal::ZERO),
        TrackingKind::RemoveFromCart => (0, 0, quantity, 0, Decimal::ZERO),
        TrackingKind::Purchase => (0, 0, 0, quantity, event.value.unwrap_or_default()),
        TrackingKind::BeginCheckout | TrackingKind::Search => return Ok(()),
    };
    let viewed_at = (views > 0).then_some(event.occurred_at);

    sqlx::query(
        r#"
        INSERT INTO product_analytics
            (product_id, product_name, product_sku, views_count, last_viewed_at,
             add_to_cart_count, remove_from_cart_count, purchased_count, total_revenue)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (product_id) DO UPDATE SET
            product_name = COALESCE(EXCLUDED.product_name, product_analytics.product_name),
            product_sku = COALESCE(EXCLUDED.product_sku, product_analytics.product_sku),
            views_count = product_analytics.views_count + EXCLUDED.views_count,
            last_viewed_at = COALESCE(EXCLUDED.last_viewed_at, product_analytics.last_viewed_at),
            add_to_cart_count = product_analytics.add_to_cart_count + EXCLUDED.add_to_cart_count,
            remove_from_cart_count = product_analytics.remove_from_cart_count + EXCLUDED.remove_from_cart_count,
            purchased_count = product_analytics.purchased_count + EXCLUDED.purchased_count,
            total_revenue = product_analytics.total_revenue + EXCLUDED.total_revenue,
            updated_at = now()
        "#,
    )
    .bind(product_id)
    .bind(&event.product_name)
    .bind(&event.product_sku)
    .bind(views)
    .bind(viewed_at)
    .bind(added)
    .bind(removed)
    .bind(purchased)
    .bind(revenue)
    .execute(pool)
    .await?;

    Ok(())
}

/// Turns cart mutations into add/remove events. Quantity edits are
/// reported as the difference.
pub struct TrackingListener {
    sink: Arc<dyn TrackingSink>,
    session: SessionId,
}

impl TrackingListener {
    pub fn new(sink: Arc<dyn TrackingSink>, session: SessionId) -> Self {
        Self { sink, session }
    }
}

impl CartListener for TrackingListener {
    fn cart_changed(&self, event: &CartEvent, _lines: &[CartLine]) {
        let event = match event {
            CartEvent::ItemAdded { line, quantity } => {
                TrackingEvent::add_to_cart(line, *quantity, &self.session)
            }
            CartEvent::ItemRemoved { line } => {
                TrackingEvent::remove_from_cart(line, line.quantity, &self.session)
            }
            CartEvent::QuantityChanged { line, previous } if line.quantity > *previous => {
                TrackingEvent::add_to_cart(line, line.quantity - previous, &self.session)
            }
            CartEvent::QuantityChanged { line, previous } => {
                TrackingEvent::remove_from_cart(line, previous - line.quantity, &self.session)
            }
            CartEvent::Cleared => return,
        };
        self.sink.track(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::Numeric;

    fn line(quantity: u32) -> CartLine {
        CartLine {
            product: Product {
                id: "p1".into(),
                name: "Bandera".into(),
                slug: None,
                sku: "BAN-1".into(),
                description: None,
                price: Numeric::from(1000_i64),
                stock: None,
                variants: Vec::new(),
                categories: Vec::new(),
                image_urls: Vec::new(),
                ecommerce: true,
            },
            quantity,
            selected_variant: None,
        }
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let (tracker, mut rx) = ChannelTracker::channel(1);
        let session = SessionId::from("session_1");

        tracker.track(TrackingEvent::add_to_cart(&line(1), 1, &session));
        tracker.track(TrackingEvent::add_to_cart(&line(2), 2, &session));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.quantity, 1);
        assert_eq!(first.value, Some(Decimal::from(1000)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn quantity_edits_are_reported_as_deltas() {
        let (tracker, mut rx) = ChannelTracker::channel(8);
        let listener = TrackingListener::new(Arc::new(tracker), SessionId::from("session_1"));

        listener.cart_changed(
            &CartEvent::QuantityChanged { line: line(5), previous: 2 },
            &[],
        );
        listener.cart_changed(
            &CartEvent::QuantityChanged { line: line(1), previous: 5 },
            &[],
        );
        listener.cart_changed(&CartEvent::Cleared, &[]);

        let up = rx.recv().await.unwrap();
        assert_eq!((up.kind, up.quantity), (TrackingKind::AddToCart, 3));
        let down = rx.recv().await.unwrap();
        assert_eq!((down.kind, down.quantity), (TrackingKind::RemoveFromCart, 4));
        assert!(rx.try_recv().is_err());
    }
}
