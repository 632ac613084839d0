use thiserror::Error;
use uuid::Uuid;

use crate::{
    customer::CustomerInfo,
    dto::carts::{CartList, RecoveryMessage},
    error::{AppError, AppResult},
    models::{AbandonedCart, CartMirrorWrite, CartRecordStatus, ContactSnapshot},
    repository::MirrorOutcome,
    response::{ApiResponse, Meta},
    routes::params::CartListQuery,
    state::AppState,
    whatsapp,
};

/// Why a recovery link could not restore a cart. Callers show "not found"
/// and "already processed" as a final state; `Unavailable` may be retried.
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("cart not found")]
    NotFound,

    #[error("cart was already processed")]
    AlreadyProcessed,

    #[error("cart could not be loaded: {0}")]
    Unavailable(#[source] AppError),
}

impl From<RecoveryError> for AppError {
    fn from(err: RecoveryError) -> Self {
        match err {
            RecoveryError::NotFound => AppError::NotFound,
            RecoveryError::AlreadyProcessed => {
                AppError::Conflict("cart was already processed".to_string())
            }
            RecoveryError::Unavailable(source) => AppError::Unavailable(source.to_string()),
        }
    }
}

pub async fn find_by_session(state: &AppState, session_id: &str) -> AppResult<Option<AbandonedCart>> {
    state.carts.find_by_session(session_id).await
}

/// Mirrors a cart snapshot. Empty carts are not mirrored and yield `None`.
pub async fn save_or_update(
    state: &AppState,
    session_id: &str,
    write: &CartMirrorWrite,
) -> AppResult<Option<MirrorOutcome>> {
    if write.items.is_empty() {
        return Ok(None);
    }

    let outcome = state.carts.upsert(session_id, write).await?;
    match &outcome {
        MirrorOutcome::Created(cart) => {
            tracing::debug!(cart_id = %cart.id, session_id, "abandoned cart created");
        }
        MirrorOutcome::Updated(cart) => {
            tracing::debug!(cart_id = %cart.id, revision = cart.revision, "abandoned cart updated");
        }
        MirrorOutcome::SkippedConverted(id) => {
            tracing::debug!(cart_id = %id, "cart already converted, mirror skipped");
        }
        MirrorOutcome::SkippedStale(id) => {
            tracing::debug!(cart_id = %id, revision = write.revision, "stale mirror write skipped");
        }
    }
    Ok(Some(outcome))
}

pub async fn update_customer(
    state: &AppState,
    session_id: &str,
    customer: &CustomerInfo,
) -> AppResult<bool> {
    state
        .carts
        .update_customer(session_id, &ContactSnapshot::from(customer))
        .await
}

pub async fn mark_abandoned(state: &AppState, cart_id: Uuid) -> AppResult<bool> {
    let marked = state.carts.mark_abandoned(cart_id).await?;
    if marked {
        tracing::info!(%cart_id, "cart marked abandoned");
    }
    Ok(marked)
}

pub async fn mark_converted(
    state: &AppState,
    session_id: &str,
    order_id: Uuid,
) -> AppResult<Option<Uuid>> {
    let converted = state.carts.mark_converted(session_id, order_id).await?;
    match converted {
        Some(cart_id) => tracing::info!(%cart_id, %order_id, "cart marked converted"),
        None => tracing::debug!(session_id, "no abandoned cart to convert"),
    }
    Ok(converted)
}

pub async fn list_carts(
    state: &AppState,
    query: CartListQuery,
) -> AppResult<ApiResponse<CartList>> {
    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            CartRecordStatus::parse(raw)
                .ok_or_else(|| AppError::BadRequest(format!("unknown cart status `{raw}`")))?,
        ),
        None => None,
    };

    let (items, total) = state
        .carts
        .list(status, query.pagination.request())
        .await?;

    let meta = Meta::paged(&query.pagination, total);
    Ok(ApiResponse::success("Ok", CartList { items }, Some(meta)))
}

/// Counts an outreach attempt and returns the links to send. The chat link
/// is only built when the shopper left a phone number.
pub async fn record_recovery_message(state: &AppState, cart_id: Uuid) -> AppResult<RecoveryMessage> {
    let cart = state
        .carts
        .record_recovery_message(cart_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let recovery_link = state.config.recovery_link(&cart.session_id);
    let whatsapp_url = cart
        .customer
        .as_ref()
        .and_then(|customer| customer.phone.as_deref())
        .filter(|phone| !phone.is_empty())
        .map(|phone| {
            whatsapp::deep_link(
                &whatsapp::international_phone(phone),
                &whatsapp::recovery_message(&cart, &recovery_link),
            )
        });

    tracing::info!(%cart_id, sent = cart.recovery_messages_sent, "recovery message recorded");
    Ok(RecoveryMessage {
        cart,
        recovery_link,
        whatsapp_url,
    })
}

/// Loads the record behind a recovery link. Only abandoned, unconverted
/// carts can be recovered.
pub async fn load_for_recovery(state: &AppState, session_id: &str) -> Result<AbandonedCart, RecoveryError> {
    let cart = state
        .carts
        .find_by_session(session_id)
        .await
        .map_err(RecoveryError::Unavailable)?
        .ok_or(RecoveryError::NotFound)?;

    if !cart.is_abandoned() {
        return Err(RecoveryError::AlreadyProcessed);
    }
    Ok(cart)
}
