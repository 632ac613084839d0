use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    cart::{self, CartError, CartLine},
    device::RequestContext,
    dto::orders::{CheckoutReceipt, OrderList},
    error::{AppError, AppResult},
    models::{ItemSnapshot, NewOrder, Order, OrderCustomer, OrderSource, OrderStatus},
    order_number,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::abandoned_cart_service,
    session::SessionId,
    state::AppState,
    tracking::TrackingEvent,
    whatsapp,
};

/// Everything a checkout needs from the shopper's side.
#[derive(Debug, Clone)]
pub struct CheckoutInput<'a> {
    pub session_id: Option<&'a SessionId>,
    pub lines: &'a [CartLine],
    pub customer: OrderCustomer,
    pub context: RequestContext,
}

/// Records the order, then hands back the chat link that completes it.
///
/// Nothing is written and no link is produced unless the cart is non-empty
/// and every line has units and a readable price. Lines repeating a product
/// and variant are merged. Once the order is stored, the
/// conversion mark and analytics are best-effort.
pub async fn submit_order(state: &AppState, input: CheckoutInput<'_>) -> AppResult<CheckoutReceipt> {
    if input.lines.is_empty() {
        return Err(AppError::BadRequest("cart is empty".to_string()));
    }

    let items = cart::merge_lines(input.lines)?
        .iter()
        .map(CartLine::snapshot)
        .collect::<Result<Vec<ItemSnapshot>, CartError>>()?;
    let subtotal: Decimal = items.iter().map(|item| item.subtotal).sum();
    let items_count: u32 = items.iter().map(|item| item.quantity).sum();

    if let Some(session) = input.session_id {
        state
            .tracker
            .track(TrackingEvent::begin_checkout(subtotal, items_count, session));
    }

    let order_number = order_number::generate(&state.config.order_prefix);
    let message = whatsapp::order_message(Some(&order_number), &items, subtotal);
    let whatsapp_url = whatsapp::deep_link(&state.config.whatsapp_phone, &message);
    let session_str = input.session_id.map(SessionId::as_str);

    let order = state
        .orders
        .insert(NewOrder {
            order_number,
            customer: input.customer,
            items,
            subtotal,
            shipping_cost: Decimal::ZERO,
            discount: Decimal::ZERO,
            total: subtotal,
            status: OrderStatus::Pending,
            source: OrderSource::Web,
            metadata: input.context.metadata(session_str),
            whatsapp_message_sent: false,
            whatsapp_conversation_url: Some(whatsapp_url.clone()),
        })
        .await?;
    tracing::info!(order_id = %order.id, order_number = %order.order_number, "order created");

    if let Some(session) = session_str {
        if let Err(err) = abandoned_cart_service::mark_converted(state, session, order.id).await {
            tracing::warn!(error = %err, order_id = %order.id, "could not mark cart converted");
        }
    }

    for item in &order.items {
        state.tracker.track(TrackingEvent::purchase(item, session_str));
    }

    Ok(CheckoutReceipt {
        order,
        whatsapp_url,
    })
}

pub async fn get_order(state: &AppState, id: Uuid) -> AppResult<Order> {
    state.orders.get(id).await?.ok_or(AppError::NotFound)
}

pub async fn list_orders(
    state: &AppState,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            OrderStatus::parse(raw)
                .ok_or_else(|| AppError::BadRequest(format!("unknown order status `{raw}`")))?,
        ),
        None => None,
    };
    let newest_first = matches!(query.sort_order.unwrap_or(SortOrder::Desc), SortOrder::Desc);

    let (items, total) = state
        .orders
        .list(status, newest_first, query.pagination.request())
        .await?;

    let meta = Meta::paged(&query.pagination, total);
    Ok(ApiResponse::success("Ok", OrderList { items }, Some(meta)))
}

pub async fn update_status(state: &AppState, id: Uuid, status: OrderStatus) -> AppResult<Order> {
    let order = state
        .orders
        .update_status(id, status)
        .await?
        .ok_or(AppError::NotFound)?;
    tracing::info!(order_id = %id, status = status.as_str(), "order status updated");
    Ok(order)
}

pub async fn set_internal_notes(state: &AppState, id: Uuid, notes: String) -> AppResult<Order> {
    state
        .orders
        .set_internal_notes(id, notes)
        .await?
        .ok_or(AppError::NotFound)
}

/// Links the order to the record the back office fulfils it under.
pub async fn link_fulfillment(
    state: &AppState,
    id: Uuid,
    fulfillment_id: String,
) -> AppResult<Order> {
    let fulfillment_id = fulfillment_id.trim().to_string();
    if fulfillment_id.is_empty() {
        return Err(AppError::BadRequest("fulfillment_id is required".to_string()));
    }
    state
        .orders
        .link_fulfillment(id, fulfillment_id)
        .await?
        .ok_or(AppError::NotFound)
}
