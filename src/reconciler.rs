use std::{sync::Arc, time::Duration};

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{
    models::{ControlRecord, ResolvedControls, SensorSnapshot, Timer, CONTROL_RECORD_ID},
    store::{decode, with_timeout, Collections, Record, RemoteStore, StoreError},
    view_state::{ViewStore, WeakViewStore},
};

/// Default minutes shown for the strip timer when none is stored.
pub const DEFAULT_TIMER_MINUTES: i64 = 30;

/// Pulls the sensor snapshot and the control record from the store and
/// folds them into the view state.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn RemoteStore>,
    collections: Collections,
    request_timeout: Duration,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        collections: Collections,
        request_timeout: Duration,
    ) -> Self {
        Self {
            store,
            collections,
            request_timeout,
        }
    }

    /// Run one refresh cycle against `view`.
    pub async fn refresh(&self, view: &ViewStore) {
        self.refresh_detached(&view.downgrade()).await;
    }

    /// Run one refresh cycle without keeping the view alive.
    ///
    /// Both fetches run concurrently and never fail the cycle: a failed or
    /// empty fetch resolves to an empty record. If the view is dropped while
    /// the fetches are in flight, their results are discarded.
    pub async fn refresh_detached(&self, view: &WeakViewStore) {
        match view.upgrade() {
            Some(view) => view.begin_refresh().await,
            None => return,
        }

        let (sensor, controls) = tokio::join!(self.fetch_sensor(), self.fetch_controls());

        match view.upgrade() {
            Some(view) => view.complete_refresh(sensor, controls).await,
            None => debug!("View state dropped; discarding refresh results"),
        }
    }

    async fn fetch_sensor(&self) -> SensorSnapshot {
        let collection = &self.collections.sensors;
        let fetched = with_timeout(self.request_timeout, self.store.fetch_latest(collection)).await;
        resolve(collection, fetched)
    }

    async fn fetch_controls(&self) -> ControlRecord {
        let collection = &self.collections.controls;
        let fetched = with_timeout(
            self.request_timeout,
            self.store.fetch_by_id(collection, CONTROL_RECORD_ID),
        )
        .await;
        resolve(collection, fetched)
    }
}

/// Decode a fetch result, falling back to an empty record on any failure.
fn resolve<T>(collection: &str, fetched: Result<Option<Record>, StoreError>) -> T
where
    T: DeserializeOwned + Default,
{
    match fetched.and_then(decode::<T>) {
        Ok(Some(record)) => record,
        Ok(None) => {
            debug!(collection = %collection, "No row found; using empty record");
            T::default()
        }
        Err(e) => {
            warn!(collection = %collection, error = %e, "Fetch failed; using empty record");
            T::default()
        }
    }
}

/// Strip timer with defaults applied. Total for any record, including an
/// empty one.
pub fn derive_timer(controls: &ControlRecord) -> Timer {
    Timer {
        hours: controls.timer_hours.unwrap_or(0),
        minutes: controls.timer_minutes.unwrap_or(DEFAULT_TIMER_MINUTES),
    }
}

/// The value the view shows for every control, defaults substituted.
pub fn resolve_controls(controls: &ControlRecord) -> ResolvedControls {
    ResolvedControls {
        strip: controls.strip.unwrap_or(false),
        timer: derive_timer(controls),
        led1: controls.led1.unwrap_or(0),
        led2: controls.led2.unwrap_or(0),
        led3: controls.led3.unwrap_or(0),
        rgb_r: controls.rgb_r.unwrap_or(0),
        rgb_g: controls.rgb_g.unwrap_or(0),
        rgb_b: controls.rgb_b.unwrap_or(0),
        buzzer: controls.buzzer.unwrap_or(false),
        updated_at: controls.updated_at,
    }
}
