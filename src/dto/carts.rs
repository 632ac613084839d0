use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    cart::{self, CartError},
    device::RequestContext,
    models::{AbandonedCart, CartMirrorWrite, ContactSnapshot, ItemSnapshot},
};

/// One debounced snapshot of a shopper's cart.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct MirrorCartRequest {
    pub items: Vec<ItemSnapshot>,
    #[serde(default)]
    pub customer: Option<ContactSnapshot>,
    pub revision: i64,
    #[serde(default)]
    pub context: RequestContext,
}

impl MirrorCartRequest {
    /// Subtotals and totals are recomputed from unit prices and quantities.
    pub fn into_write(self, session_id: &str) -> Result<CartMirrorWrite, CartError> {
        let items = cart::merge_items(self.items)?;
        let items_count = items.iter().map(|item| item.quantity).sum();
        let total = items.iter().map(|item| item.subtotal).sum::<Decimal>();
        Ok(CartMirrorWrite {
            metadata: self.context.metadata(Some(session_id)),
            items,
            items_count,
            total,
            customer: self.customer,
            revision: self.revision,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MirrorResult {
    pub cart_id: Uuid,
    /// False when the record was converted or held a newer snapshot.
    pub applied: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartList {
    pub items: Vec<AbandonedCart>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecoveryMessage {
    pub cart: AbandonedCart,
    pub recovery_link: String,
    pub whatsapp_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecoveredCart {
    pub session_id: String,
    pub items: Vec<ItemSnapshot>,
    pub total: Decimal,
    pub redirect_to: String,
    pub redirect_after_ms: u64,
}
