use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, patch, post, put},
};
use uuid::Uuid;

use crate::{
    device::RequestContext,
    dto::orders::{
        CheckoutReceipt, CheckoutRequest, FulfillmentLinkRequest, InternalNotesRequest, OrderList,
        UpdateOrderStatusRequest,
    },
    error::AppResult,
    models::{Order, OrderCustomer},
    response::{ApiResponse, Meta},
    routes::{carts::user_agent, params::OrderListQuery},
    services::order_service::{self, CheckoutInput},
    session::SessionId,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/checkout", post(checkout))
        .route("/{id}", get(get_order))
        .route("/{id}/status", patch(update_order_status))
        .route("/{id}/notes", put(set_internal_notes))
        .route("/{id}/fulfillment", put(link_fulfillment))
}

#[utoipa::path(
    post,
    path = "/api/orders/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Order recorded; open the returned chat link", body = ApiResponse<CheckoutReceipt>),
        (status = 400, description = "Empty cart, invalid contact or unreadable price"),
    ),
    tag = "Orders"
)]
pub async fn checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CheckoutReceipt>>)> {
    let customer = payload.customer.validate()?;
    let session_id = payload
        .session_id
        .filter(|id| !id.is_empty())
        .map(SessionId::from);

    let receipt = order_service::submit_order(
        &state,
        CheckoutInput {
            session_id: session_id.as_ref(),
            lines: &payload.items,
            customer: OrderCustomer::from(&customer),
            context: RequestContext {
                user_agent: user_agent(&headers),
                referrer: payload.referrer,
                page_url: payload.page_url,
            },
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Order created", receipt, Some(Meta::empty()))),
    ))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "List orders", body = ApiResponse<OrderList>),
        (status = 400, description = "Unknown status filter"),
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_orders(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Get order", body = ApiResponse<Order>),
        (status = 404, description = "Order not found"),
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = order_service::get_order(&state, id).await?;
    Ok(Json(ApiResponse::success("OK", order, Some(Meta::empty()))))
}

#[utoipa::path(
    patch,
    path = "/api/orders/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<Order>),
        (status = 404, description = "Order not found"),
    ),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = order_service::update_status(&state, id, payload.status).await?;
    Ok(Json(ApiResponse::success("Order status updated", order, Some(Meta::empty()))))
}

#[utoipa::path(
    put,
    path = "/api/orders/{id}/notes",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = InternalNotesRequest,
    responses(
        (status = 200, description = "Notes saved", body = ApiResponse<Order>),
        (status = 404, description = "Order not found"),
    ),
    tag = "Orders"
)]
pub async fn set_internal_notes(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<InternalNotesRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = order_service::set_internal_notes(&state, id, payload.notes).await?;
    Ok(Json(ApiResponse::success("Notes saved", order, Some(Meta::empty()))))
}

#[utoipa::path(
    put,
    path = "/api/orders/{id}/fulfillment",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = FulfillmentLinkRequest,
    responses(
        (status = 200, description = "Fulfillment record linked", body = ApiResponse<Order>),
        (status = 400, description = "Empty fulfillment id"),
        (status = 404, description = "Order not found"),
    ),
    tag = "Orders"
)]
pub async fn link_fulfillment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<FulfillmentLinkRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = order_service::link_fulfillment(&state, id, payload.fulfillment_id).await?;
    Ok(Json(ApiResponse::success("Fulfillment linked", order, Some(Meta::empty()))))
}
