use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{device::DeviceType, pricing::Numeric};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductVariant {
    pub id: String,
    pub size: String,
    #[serde(default)]
    pub name: Option<String>,
    pub price: Numeric,
    #[serde(default)]
    pub stock: Option<Numeric>,
    #[serde(default)]
    pub sku: Option<String>,
}

impl ProductVariant {
    /// Label shown next to the product name: explicit name, else the size.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.size)
    }
}

/// Catalog entry as read from the `products` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Numeric,
    #[serde(default)]
    pub stock: Option<Numeric>,
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub ecommerce: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VariantSnapshot {
    pub id: String,
    pub name: String,
    pub size: Option<String>,
}

/// A cart line frozen at a point in time. Shared by the abandoned-cart
/// mirror and by order items so both stay legible if the catalog changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ItemSnapshot {
    pub product_id: String,
    pub product_name: String,
    pub product_sku: String,
    pub variant: Option<VariantSnapshot>,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ContactSnapshot {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SessionMetadata {
    pub device_type: DeviceType,
    pub browser: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub referrer: Option<String>,
    pub last_page: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CartRecordStatus {
    Active,
    Abandoned,
    Converted,
}

impl CartRecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CartRecordStatus::Active => "active",
            CartRecordStatus::Abandoned => "abandoned",
            CartRecordStatus::Converted => "converted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(CartRecordStatus::Active),
            "abandoned" => Some(CartRecordStatus::Abandoned),
            "converted" => Some(CartRecordStatus::Converted),
            _ => None,
        }
    }
}

/// Server-side mirror of one session's cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AbandonedCart {
    pub id: Uuid,
    pub session_id: String,
    pub customer: Option<ContactSnapshot>,
    pub items: Vec<ItemSnapshot>,
    pub items_count: u32,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub status: CartRecordStatus,
    pub converted_order_id: Option<Uuid>,
    pub recovery_messages_sent: u32,
    pub last_recovery_message_at: Option<DateTime<Utc>>,
    pub metadata: SessionMetadata,
    pub revision: i64,
    pub first_added_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub abandoned_at: Option<DateTime<Utc>>,
    pub converted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AbandonedCart {
    pub fn is_abandoned(&self) -> bool {
        self.status == CartRecordStatus::Abandoned
    }

    pub fn is_converted(&self) -> bool {
        self.status == CartRecordStatus::Converted
    }
}

/// The contents written by one debounced mirror pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartMirrorWrite {
    pub items: Vec<ItemSnapshot>,
    pub items_count: u32,
    pub total: Decimal,
    pub customer: Option<ContactSnapshot>,
    pub metadata: SessionMetadata,
    /// Increases with every write from the same session; older writes lose.
    pub revision: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "preparing" => Some(OrderStatus::Preparing),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderSource {
    Web,
    WhatsappDirect,
    Phone,
    Presencial,
}

impl OrderSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSource::Web => "web",
            OrderSource::WhatsappDirect => "whatsapp_direct",
            OrderSource::Phone => "phone",
            OrderSource::Presencial => "presencial",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "web" => Some(OrderSource::Web),
            "whatsapp_direct" => Some(OrderSource::WhatsappDirect),
            "phone" => Some(OrderSource::Phone),
            "presencial" => Some(OrderSource::Presencial),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderCustomer {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer: OrderCustomer,
    pub items: Vec<ItemSnapshot>,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub source: OrderSource,
    pub metadata: SessionMetadata,
    pub internal_notes: Option<String>,
    pub whatsapp_message_sent: bool,
    pub whatsapp_conversation_url: Option<String>,
    pub fulfillment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Everything an order needs before storage assigns its id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub order_number: String,
    pub customer: OrderCustomer,
    pub items: Vec<ItemSnapshot>,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub source: OrderSource,
    pub metadata: SessionMetadata,
    pub whatsapp_message_sent: bool,
    pub whatsapp_conversation_url: Option<String>,
}
