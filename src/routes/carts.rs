use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    customer::{CustomerForm, CustomerInfo},
    dto::carts::{CartList, MirrorCartRequest, MirrorResult, RecoveredCart, RecoveryMessage},
    error::AppResult,
    response::{ApiResponse, Meta},
    routes::params::CartListQuery,
    services::abandoned_cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_carts))
        .route("/session/{session_id}", put(mirror_cart))
        .route("/session/{session_id}/customer", put(update_customer))
        .route("/recover/{session_id}", get(recover_cart))
        .route("/{id}/abandon", post(abandon_cart))
        .route("/{id}/recovery-messages", post(record_recovery_message))
}

pub(crate) fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[utoipa::path(
    put,
    path = "/api/carts/session/{session_id}",
    params(
        ("session_id" = String, Path, description = "Browser session ID")
    ),
    request_body = MirrorCartRequest,
    responses(
        (status = 200, description = "Snapshot mirrored or skipped", body = ApiResponse<MirrorResult>),
        (status = 400, description = "A line has no units"),
    ),
    tag = "Carts"
)]
pub async fn mirror_cart(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Json(mut payload): Json<MirrorCartRequest>,
) -> AppResult<Json<ApiResponse<MirrorResult>>> {
    if payload.context.user_agent.is_none() {
        payload.context.user_agent = user_agent(&headers);
    }
    let write = payload.into_write(&session_id)?;

    let resp = match abandoned_cart_service::save_or_update(&state, &session_id, &write).await? {
        Some(outcome) => ApiResponse::success(
            "Cart mirrored",
            MirrorResult {
                cart_id: outcome.cart_id(),
                applied: outcome.applied(),
            },
            Some(Meta::empty()),
        ),
        None => ApiResponse::message("Empty cart, nothing mirrored"),
    };
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/carts/session/{session_id}/customer",
    params(
        ("session_id" = String, Path, description = "Browser session ID")
    ),
    request_body = CustomerForm,
    responses(
        (status = 200, description = "Contact attached to the session's cart", body = ApiResponse<CustomerInfo>),
        (status = 400, description = "Invalid contact details"),
    ),
    tag = "Carts"
)]
pub async fn update_customer(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(payload): Json<CustomerForm>,
) -> AppResult<Json<ApiResponse<CustomerInfo>>> {
    let info = payload.validate()?;
    let updated = abandoned_cart_service::update_customer(&state, &session_id, &info).await?;
    let message = if updated {
        "Customer updated"
    } else {
        "No cart for this session yet"
    };
    Ok(Json(ApiResponse::success(message, info, Some(Meta::empty()))))
}

/// Page-unload beacon. Accepted immediately; the update runs in the
/// background and failures are only logged.
#[utoipa::path(
    post,
    path = "/api/carts/{id}/abandon",
    params(
        ("id" = Uuid, Path, description = "Abandoned cart ID")
    ),
    responses(
        (status = 202, description = "Accepted"),
    ),
    tag = "Carts"
)]
pub async fn abandon_cart(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> (StatusCode, Json<ApiResponse<()>>) {
    tokio::spawn(async move {
        if let Err(err) = abandoned_cart_service::mark_abandoned(&state, id).await {
            tracing::warn!(error = %err, cart_id = %id, "could not mark cart abandoned");
        }
    });
    (StatusCode::ACCEPTED, Json(ApiResponse::message("Accepted")))
}

#[utoipa::path(
    get,
    path = "/api/carts/recover/{session_id}",
    params(
        ("session_id" = String, Path, description = "Session ID from the recovery link")
    ),
    responses(
        (status = 200, description = "Cart contents to restore", body = ApiResponse<RecoveredCart>),
        (status = 404, description = "Cart not found"),
        (status = 409, description = "Cart already processed"),
        (status = 503, description = "Cart could not be loaded, retry later"),
    ),
    tag = "Carts"
)]
pub async fn recover_cart(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> AppResult<Json<ApiResponse<RecoveredCart>>> {
    let cart = abandoned_cart_service::load_for_recovery(&state, &session_id).await?;
    let data = RecoveredCart {
        session_id: cart.session_id,
        items: cart.items,
        total: cart.total,
        redirect_to: state.config.storefront_path.clone(),
        redirect_after_ms: u64::try_from(state.config.recovery_redirect.as_millis()).unwrap_or(u64::MAX),
    };
    Ok(Json(ApiResponse::success("Cart recovered", data, Some(Meta::empty()))))
}

#[utoipa::path(
    get,
    path = "/api/carts",
    params(CartListQuery),
    responses(
        (status = 200, description = "Mirrored carts for the back office", body = ApiResponse<CartList>),
        (status = 400, description = "Unknown status filter"),
    ),
    tag = "Carts"
)]
pub async fn list_carts(
    State(state): State<AppState>,
    Query(query): Query<CartListQuery>,
) -> AppResult<Json<ApiResponse<CartList>>> {
    let resp = abandoned_cart_service::list_carts(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/carts/{id}/recovery-messages",
    params(
        ("id" = Uuid, Path, description = "Abandoned cart ID")
    ),
    responses(
        (status = 200, description = "Outreach counted; links to send", body = ApiResponse<RecoveryMessage>),
        (status = 404, description = "Cart not found"),
    ),
    tag = "Carts"
)]
pub async fn record_recovery_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<RecoveryMessage>>> {
    let data = abandoned_cart_service::record_recovery_message(&state, id).await?;
    Ok(Json(ApiResponse::success("Recovery message recorded", data, Some(Meta::empty()))))
}
