use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::{task::JoinHandle, time};
use tracing::debug;

use crate::view_state::ViewStore;

/// Shown whenever a control write fails, whatever the cause.
pub const GENERIC_MUTATION_ERROR: &str = "Failed to update controls. Please try again.";

/// Transient, self-clearing error notice backed by `ViewState::transient_error`.
///
/// At most one message is visible. Each `raise` restarts the clear timer, so
/// a message never outlives `clear_after` unless it is raised again.
#[derive(Debug, Clone)]
pub struct ErrorSurface {
    view: ViewStore,
    clear_after: Duration,
    /// Timer of the newest raise, with its generation.
    pending: Arc<Mutex<Option<(u64, JoinHandle<()>)>>>,
}

impl ErrorSurface {
    pub fn new(view: ViewStore, clear_after: Duration) -> Self {
        Self {
            view,
            clear_after,
            pending: Arc::default(),
        }
    }

    /// Show `message` now and clear it after `clear_after`.
    pub async fn raise(&self, message: impl Into<String>) {
        let generation = self.view.raise_error(message.into()).await;

        let view = self.view.downgrade();
        let delay = self.clear_after;
        let timer = tokio::spawn(async move {
            time::sleep(delay).await;
            if let Some(view) = view.upgrade() {
                if view.expire_error(generation).await {
                    debug!(generation, "Transient error expired");
                }
            }
        });

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        match pending.as_ref() {
            // A newer raise already installed its timer; ours is stale.
            Some((newest, _)) if *newest > generation => timer.abort(),
            _ => {
                if let Some((_, previous)) = pending.replace((generation, timer)) {
                    previous.abort();
                }
            }
        }
    }

    /// Clear the current error now and cancel its scheduled clear.
    pub async fn clear(&self) {
        let previous = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((_, timer)) = previous {
            timer.abort();
        }
        self.view.clear_error().await;
    }
}
