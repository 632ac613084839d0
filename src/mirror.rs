//! Debounced mirroring of one session's cart to its abandoned-cart record.
//!
//! Cart edits are forwarded to a background task that keeps only the newest
//! snapshot and writes it once no edit arrived for the debounce window.
//! Every failure stays inside the task and is logged.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::{
    sync::{mpsc, oneshot},
    time::{Instant, timeout_at},
};
use uuid::Uuid;

use crate::{
    cart::{CartEvent, CartLine, CartListener},
    customer::CustomerProfile,
    device::RequestContext,
    models::{CartMirrorWrite, ContactSnapshot},
    services::abandoned_cart_service,
    session::SessionId,
    state::AppState,
    storage::{ABANDONED_CART_ID_KEY, KeyValueStore},
};

#[derive(Debug)]
enum MirrorCommand {
    Snapshot(Vec<CartLine>),
    Context(RequestContext),
    Flush(oneshot::Sender<()>),
    Unload,
}

/// Handle to the mirroring task. Dropping the last handle flushes any
/// pending snapshot and stops the task.
#[derive(Debug)]
pub struct CartMirror {
    tx: mpsc::UnboundedSender<MirrorCommand>,
}

impl CartMirror {
    pub fn spawn(
        state: AppState,
        session: SessionId,
        local: Arc<dyn KeyValueStore>,
        debounce: Duration,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = MirrorTask {
            state,
            session,
            local,
            debounce,
            context: RequestContext::default(),
            revision: 0,
        };
        tokio::spawn(task.run(rx));
        Arc::new(Self { tx })
    }

    /// Queues `lines` as the newest snapshot, restarting the quiet window.
    pub fn snapshot(&self, lines: &[CartLine]) {
        self.send(MirrorCommand::Snapshot(lines.to_vec()));
    }

    pub fn set_context(&self, context: RequestContext) {
        self.send(MirrorCommand::Context(context));
    }

    /// Writes any pending snapshot now and waits for that write to finish.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(MirrorCommand::Flush(done_tx));
        let _ = done_rx.await;
    }

    /// Fire-and-forget: writes the pending snapshot, then marks the record
    /// abandoned. Returns immediately.
    pub fn page_unload(&self) {
        self.send(MirrorCommand::Unload);
    }

    fn send(&self, command: MirrorCommand) {
        if self.tx.send(command).is_err() {
            tracing::warn!("cart mirror task is gone");
        }
    }
}

impl CartListener for CartMirror {
    fn cart_changed(&self, _event: &CartEvent, lines: &[CartLine]) {
        self.snapshot(lines);
    }
}

struct MirrorTask {
    state: AppState,
    session: SessionId,
    local: Arc<dyn KeyValueStore>,
    debounce: Duration,
    context: RequestContext,
    revision: i64,
}

impl MirrorTask {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<MirrorCommand>) {
        let mut pending: Option<(Vec<CartLine>, Instant)> = None;

        loop {
            let deadline = pending.as_ref().map(|(_, deadline)| *deadline);
            let command = match deadline {
                Some(deadline) => match timeout_at(deadline, rx.recv()).await {
                    Ok(command) => command,
                    Err(_) => {
                        if let Some((lines, _)) = pending.take() {
                            self.write(&lines).await;
                        }
                        continue;
                    }
                },
                None => rx.recv().await,
            };

            let Some(command) = command else {
                break;
            };

            match command {
                MirrorCommand::Snapshot(lines) => {
                    // Each edit restarts the quiet window.
                    pending = Some((lines, Instant::now() + self.debounce));
                }
                MirrorCommand::Context(context) => self.context = context,
                MirrorCommand::Flush(done) => {
                    if let Some((lines, _)) = pending.take() {
                        self.write(&lines).await;
                    }
                    let _ = done.send(());
                }
                MirrorCommand::Unload => {
                    if let Some((lines, _)) = pending.take() {
                        self.write(&lines).await;
                    }
                    self.abandon().await;
                }
            }
        }

        if let Some((lines, _)) = pending.take() {
            self.write(&lines).await;
        }
        tracing::debug!(session_id = %self.session, "cart mirror stopped");
    }

    /// Revisions follow the clock so a reloaded page still outranks what
    /// an earlier page of the same session stored.
    fn next_revision(&mut self) -> i64 {
        self.revision = (self.revision + 1).max(Utc::now().timestamp_micros());
        self.revision
    }

    async fn write(&mut self, lines: &[CartLine]) {
        if lines.is_empty() {
            return;
        }

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            match line.snapshot() {
                Ok(item) => items.push(item),
                Err(err) => {
                    tracing::warn!(error = %err, product_id = %line.product.id, "line left out of cart mirror");
                }
            }
        }
        if items.is_empty() {
            return;
        }

        let write = CartMirrorWrite {
            items_count: items.iter().map(|item| item.quantity).sum(),
            total: items.iter().map(|item| item.subtotal).sum::<Decimal>(),
            items,
            customer: CustomerProfile::new(&*self.local)
                .load()
                .map(|info| ContactSnapshot::from(&info)),
            metadata: self.context.metadata(Some(self.session.as_str())),
            revision: self.next_revision(),
        };

        match abandoned_cart_service::save_or_update(&self.state, self.session.as_str(), &write).await {
            Ok(Some(outcome)) => {
                let id = outcome.cart_id().to_string();
                if let Err(err) = self.local.set(ABANDONED_CART_ID_KEY, &id) {
                    tracing::warn!(error = %err, "could not remember abandoned cart id");
                }
            }
            Ok(None) => {}
            Err(err) => tracing::warn!(error = %err, session_id = %self.session, "cart mirror write failed"),
        }
    }

    async fn abandon(&self) {
        let Some(raw) = self.local.get(ABANDONED_CART_ID_KEY) else {
            return;
        };
        let Ok(cart_id) = Uuid::parse_str(&raw) else {
            tracing::warn!(value = %raw, "stored abandoned cart id is not a uuid");
            return;
        };
        if let Err(err) = abandoned_cart_service::mark_abandoned(&self.state, cart_id).await {
            tracing::warn!(error = %err, %cart_id, "could not mark cart abandoned");
        }
    }
}
