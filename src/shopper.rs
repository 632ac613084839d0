//! One shopper's storefront session: the cart, its listeners, the stored
//! identity and the checkout and recovery flows built on them.

use std::sync::Arc;

use crate::{
    cart::{CartStore, restore_line},
    customer::{CustomerForm, CustomerInfo, CustomerInfoError, CustomerProfile},
    device::RequestContext,
    dto::orders::CheckoutReceipt,
    error::{AppError, AppResult},
    mirror::CartMirror,
    models::{AbandonedCart, OrderCustomer},
    services::{
        abandoned_cart_service::{self, RecoveryError},
        order_service::{self, CheckoutInput},
    },
    session::SessionId,
    state::AppState,
    storage::{ABANDONED_CART_ID_KEY, KeyValueStore},
    tracking::TrackingListener,
};

pub struct ShopperSession {
    state: AppState,
    session_id: SessionId,
    local: Arc<dyn KeyValueStore>,
    cart: CartStore,
    mirror: Arc<CartMirror>,
    context: RequestContext,
}

impl ShopperSession {
    /// `local` outlives the tab; `tab` holds only the session id.
    pub fn open(
        state: AppState,
        local: Arc<dyn KeyValueStore>,
        tab: &dyn KeyValueStore,
        context: RequestContext,
    ) -> Self {
        let (session_id, started) = SessionId::resume_or_start(tab);
        if started {
            // The stored record id belongs to an earlier session.
            if let Err(err) = local.remove(ABANDONED_CART_ID_KEY) {
                tracing::warn!(error = %err, "could not forget previous abandoned cart id");
            }
        }
        let mirror = CartMirror::spawn(
            state.clone(),
            session_id.clone(),
            local.clone(),
            state.config.mirror_debounce,
        );
        mirror.set_context(context.clone());

        let mut cart = CartStore::load(local.clone());
        cart.subscribe(Arc::new(TrackingListener::new(
            state.tracker.clone(),
            session_id.clone(),
        )));
        cart.subscribe(mirror.clone());
        if !cart.is_empty() {
            mirror.snapshot(cart.lines());
        }

        tracing::debug!(session_id = %session_id, lines = cart.lines().len(), "shopper session opened");
        Self {
            state,
            session_id,
            local,
            cart,
            mirror,
            context,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn cart(&self) -> &CartStore {
        &self.cart
    }

    pub fn cart_mut(&mut self) -> &mut CartStore {
        &mut self.cart
    }

    /// New page, same session.
    pub fn set_context(&mut self, context: RequestContext) {
        self.mirror.set_context(context.clone());
        self.context = context;
    }

    pub fn customer(&self) -> Option<CustomerInfo> {
        CustomerProfile::new(&*self.local).load()
    }

    /// The contact form is due once there is something to buy and nobody
    /// to attribute it to.
    pub fn needs_customer_info(&self) -> bool {
        !self.cart.is_empty() && self.customer().is_none()
    }

    /// Validates and stores the identity, then attaches it to the mirrored
    /// cart. Only validation can fail the call.
    pub async fn provide_customer_info(
        &mut self,
        form: &CustomerForm,
    ) -> Result<CustomerInfo, CustomerInfoError> {
        let info = form.validate()?;

        if let Err(err) = CustomerProfile::new(&*self.local).save(&info) {
            tracing::warn!(error = %err, "could not store customer info");
        }
        match abandoned_cart_service::update_customer(&self.state, self.session_id.as_str(), &info).await {
            Ok(true) => tracing::debug!(session_id = %self.session_id, "customer attached to cart"),
            Ok(false) => {}
            Err(err) => tracing::warn!(error = %err, "could not attach customer to cart"),
        }
        Ok(info)
    }

    /// `context` describes the page the shopper checks out from.
    pub async fn checkout(&mut self, context: RequestContext) -> AppResult<CheckoutReceipt> {
        self.set_context(context);
        let customer = self
            .customer()
            .ok_or_else(|| AppError::BadRequest("customer info is required".to_string()))?;
        if self.cart.is_empty() {
            return Err(AppError::BadRequest("cart is empty".to_string()));
        }

        // The record must exist before it can be marked converted.
        self.mirror.flush().await;

        let receipt = order_service::submit_order(
            &self.state,
            CheckoutInput {
                session_id: Some(&self.session_id),
                lines: self.cart.lines(),
                customer: OrderCustomer::from(&customer),
                context: self.context.clone(),
            },
        )
        .await?;

        if self.state.config.clear_cart_after_checkout {
            self.cart.clear();
        }
        Ok(receipt)
    }

    /// Returns at once; the final write happens in the background.
    pub fn page_unload(&self) {
        self.mirror.page_unload();
    }

    /// Replays an abandoned cart into this session's cart. Lines that no
    /// longer fit (a zero quantity, say) are skipped with a warning.
    pub async fn recover(&mut self, session_id: &str) -> Result<AbandonedCart, RecoveryError> {
        let record = abandoned_cart_service::load_for_recovery(&self.state, session_id).await?;

        for item in &record.items {
            let (product, variant) = restore_line(item);
            if let Err(err) = self.cart.add_item(&product, item.quantity, variant.as_ref()) {
                tracing::warn!(error = %err, product_id = %item.product_id, "recovered line skipped");
            }
        }

        tracing::info!(cart_id = %record.id, items = record.items.len(), "cart recovered");
        Ok(record)
    }
}
