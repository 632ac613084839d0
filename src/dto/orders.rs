use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    cart::CartLine,
    customer::CustomerForm,
    models::{Order, OrderStatus},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub items: Vec<CartLine>,
    pub customer: CustomerForm,
    #[serde(default)]
    pub page_url: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutReceipt {
    pub order: Order,
    /// Chat link carrying the order summary. Opening it is the checkout.
    pub whatsapp_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InternalNotesRequest {
    pub notes: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FulfillmentLinkRequest {
    pub fulfillment_id: String,
}
