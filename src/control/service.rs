use std::{sync::Arc, time::Duration};

use chrono::Utc;
use serde_json::Value;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    control::{ControlField, ControlUpdate},
    error_surface::{ErrorSurface, GENERIC_MUTATION_ERROR},
    store::{encode, with_timeout, RemoteStore, StoreError},
    view_state::ViewStore,
};

/// Column the control upsert resolves conflicts on.
const CONFLICT_TARGET: &str = "id";

/// Applies single-field changes to the control record, remotely first and
/// then locally.
///
/// Calls are independent: several may be in flight at once and nothing
/// orders them against routine refreshes. A failed write leaves the local
/// record as it was and raises a transient error; the next refresh brings
/// the view back in line with the store.
#[derive(Clone)]
pub struct ControlMutator {
    store: Arc<dyn RemoteStore>,
    collection: String,
    request_timeout: Duration,
    view: ViewStore,
    errors: ErrorSurface,
}

impl ControlMutator {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        collection: String,
        request_timeout: Duration,
        view: ViewStore,
        errors: ErrorSurface,
    ) -> Self {
        Self {
            store,
            collection,
            request_timeout,
            view,
            errors,
        }
    }

    /// Normalise `raw` for `field`, write it, and merge it locally once
    /// the store acknowledges.
    ///
    /// Never fails; problems end up in the view's transient error.
    pub async fn set_control(&self, field: ControlField, raw: &Value) {
        let update = field.normalize(raw);
        let mutation_id = Uuid::new_v4();

        match self.write(&update).await {
            Ok(()) => {
                self.view.apply_control(&update).await;
                info!(
                    mutation_id = %mutation_id,
                    field = %field,
                    value = ?update.value(),
                    "Control updated"
                );
            }
            Err(e) => {
                error!(
                    mutation_id = %mutation_id,
                    field = %field,
                    error = %e,
                    "Control update failed"
                );
                self.errors.raise(GENERIC_MUTATION_ERROR).await;
            }
        }
    }

    async fn write(&self, update: &ControlUpdate) -> Result<(), StoreError> {
        let record = encode(&update.envelope(Utc::now()))?;
        with_timeout(
            self.request_timeout,
            self.store.upsert(&self.collection, record, CONFLICT_TARGET),
        )
        .await
    }
}
