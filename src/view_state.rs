use std::sync::{Arc, Weak};

use tokio::sync::RwLock;

use crate::{
    control::ControlUpdate,
    models::{ControlRecord, SensorSnapshot},
};

/// Everything the presentation layer renders.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub sensor: SensorSnapshot,
    pub controls: ControlRecord,
    pub is_loading: bool,
    pub transient_error: Option<String>,
    /// Sticky: set once any refresh delivered a temperature.
    pub temperature_observed: bool,
    error_generation: u64,
}

impl Default for ViewState {
    /// Loading until the first refresh completes.
    fn default() -> Self {
        Self {
            sensor: SensorSnapshot::default(),
            controls: ControlRecord::default(),
            is_loading: true,
            transient_error: None,
            temperature_observed: false,
            error_generation: 0,
        }
    }
}

impl ViewState {
    /// Whether the full-screen loading placeholder should be shown.
    ///
    /// Only before the first temperature arrives; afterwards in-flight
    /// refreshes keep showing the previous values.
    pub fn show_loading(&self) -> bool {
        self.is_loading && !self.temperature_observed
    }
}

/// Shared handle to the dashboard's [`ViewState`].
///
/// Cheap to clone; all clones see the same state. Writers replace whole
/// fields under a single write lock, so readers always see a consistent
/// `(sensor, controls)` pair.
#[derive(Debug, Clone, Default)]
pub struct ViewStore {
    inner: Arc<RwLock<ViewState>>,
}

/// Non-owning handle; tasks that may outlive the dashboard hold this so their
/// late results are dropped instead of written.
#[derive(Debug, Clone)]
pub struct WeakViewStore {
    inner: Weak<RwLock<ViewState>>,
}

impl WeakViewStore {
    pub fn upgrade(&self) -> Option<ViewStore> {
        self.inner.upgrade().map(|inner| ViewStore { inner })
    }
}

impl ViewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn downgrade(&self) -> WeakViewStore {
        WeakViewStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub async fn snapshot(&self) -> ViewState {
        self.inner.read().await.clone()
    }

    pub(crate) async fn begin_refresh(&self) {
        self.inner.write().await.is_loading = true;
    }

    /// Replace both records from one refresh cycle in a single write.
    pub(crate) async fn complete_refresh(&self, sensor: SensorSnapshot, controls: ControlRecord) {
        let mut state = self.inner.write().await;
        state.temperature_observed |= sensor.temperature.is_some();
        state.sensor = sensor;
        state.controls = controls;
        state.is_loading = false;
    }

    /// Merge one acknowledged field change into the local control record.
    pub(crate) async fn apply_control(&self, update: &ControlUpdate) {
        update.apply_to(&mut self.inner.write().await.controls);
    }

    /// Show `message`; returns the generation a scheduled clear must match.
    pub(crate) async fn raise_error(&self, message: String) -> u64 {
        let mut state = self.inner.write().await;
        state.error_generation += 1;
        state.transient_error = Some(message);
        state.error_generation
    }

    /// Clear the error only if no newer one was raised since `generation`.
    pub(crate) async fn expire_error(&self, generation: u64) -> bool {
        let mut state = self.inner.write().await;
        if state.error_generation != generation {
            return false;
        }
        state.transient_error = None;
        true
    }

    pub(crate) async fn clear_error(&self) {
        let mut state = self.inner.write().await;
        state.error_generation += 1;
        state.transient_error = None;
    }
}
