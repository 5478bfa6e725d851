use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use serde_json::Value;
use tracing::info;

use crate::{
    control::{ControlField, ControlMutator},
    error_surface::ErrorSurface,
    poller::Poller,
    reconciler::Reconciler,
    store::{Collections, RemoteStore},
    view_state::{ViewState, ViewStore},
};

/// Timing and naming knobs for the synchronization core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub collections: Collections,
    pub poll_interval: Duration,
    pub error_clear_after: Duration,
    pub request_timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            collections: Collections::default(),
            poll_interval: Duration::from_millis(2000),
            error_clear_after: Duration::from_millis(3000),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Everything the presentation layer talks to: view state, control writes
/// and the poll lifecycle.
///
/// Dropping the dashboard stops polling; refreshes still in flight finish
/// against a dropped view and are discarded.
pub struct Dashboard {
    view: ViewStore,
    reconciler: Reconciler,
    mutator: ControlMutator,
    errors: ErrorSurface,
    poller: Mutex<Poller>,
}

impl Dashboard {
    pub fn new(store: Arc<dyn RemoteStore>, settings: SyncSettings) -> Self {
        info!(
            backend = store.backend_name(),
            sensors = %settings.collections.sensors,
            controls = %settings.collections.controls,
            "Dashboard created"
        );

        let view = ViewStore::new();
        let errors = ErrorSurface::new(view.clone(), settings.error_clear_after);
        let reconciler = Reconciler::new(
            Arc::clone(&store),
            settings.collections.clone(),
            settings.request_timeout,
        );
        let mutator = ControlMutator::new(
            store,
            settings.collections.controls.clone(),
            settings.request_timeout,
            view.clone(),
            errors.clone(),
        );

        Self {
            view,
            reconciler,
            mutator,
            errors,
            poller: Mutex::new(Poller::new(settings.poll_interval)),
        }
    }

    pub async fn view_state(&self) -> ViewState {
        self.view.snapshot().await
    }

    pub async fn set_control(&self, field: ControlField, value: &Value) {
        self.mutator.set_control(field, value).await;
    }

    /// One refresh outside the poll schedule.
    pub async fn refresh(&self) {
        self.reconciler.refresh(&self.view).await;
    }

    pub async fn clear_error(&self) {
        self.errors.clear().await;
    }

    /// Refresh now and then on every poll interval. Restarts the schedule if
    /// already polling.
    pub fn start_polling(&self) {
        let reconciler = self.reconciler.clone();
        let view = self.view.downgrade();
        self.poller().start(move || {
            let reconciler = reconciler.clone();
            let view = view.clone();
            async move { reconciler.refresh_detached(&view).await }
        });
    }

    pub fn stop_polling(&self) {
        self.poller().stop();
    }

    pub fn is_polling(&self) -> bool {
        self.poller().is_running()
    }

    fn poller(&self) -> MutexGuard<'_, Poller> {
        self.poller.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::time;

    use super::*;
    use crate::{error_surface::GENERIC_MUTATION_ERROR, store::testing::ScriptedStore};

    async fn seeded() -> Arc<ScriptedStore> {
        let store = Arc::new(ScriptedStore::new());
        store
            .memory()
            .insert("controls", ScriptedStore::row(json!({ "id": 1, "strip": true })))
            .await;
        store
            .memory()
            .insert(
                "sensor_data",
                ScriptedStore::row(json!({
                    "temperature": 22.0,
                    "created_at": "2024-01-01T00:00:00Z"
                })),
            )
            .await;
        store
    }

    #[tokio::test(start_paused = true)]
    async fn start_polling_refreshes_immediately() {
        let dashboard = Dashboard::new(seeded().await, SyncSettings::default());
        assert!(dashboard.view_state().await.show_loading());

        dashboard.start_polling();
        assert!(dashboard.is_polling());
        time::sleep(Duration::from_millis(1)).await;

        let state = dashboard.view_state().await;
        assert_eq!(state.sensor.temperature, Some(22.0));
        assert_eq!(state.controls.strip, Some(true));
        assert!(!state.show_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn polling_picks_up_remote_changes() {
        let store = seeded().await;
        let dashboard = Dashboard::new(store.clone(), SyncSettings::default());
        dashboard.start_polling();
        time::sleep(Duration::from_millis(1)).await;

        store
            .memory()
            .insert(
                "sensor_data",
                ScriptedStore::row(json!({
                    "temperature": 25.0,
                    "created_at": "2024-01-01T00:01:00Z"
                })),
            )
            .await;
        time::sleep(Duration::from_millis(2000)).await;

        assert_eq!(dashboard.view_state().await.sensor.temperature, Some(25.0));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_polling_freezes_view() {
        let store = seeded().await;
        let dashboard = Dashboard::new(store.clone(), SyncSettings::default());
        dashboard.start_polling();
        time::sleep(Duration::from_millis(1)).await;
        dashboard.stop_polling();
        dashboard.stop_polling();
        assert!(!dashboard.is_polling());

        store
            .memory()
            .insert(
                "sensor_data",
                ScriptedStore::row(json!({
                    "temperature": 30.0,
                    "created_at": "2024-01-01T00:01:00Z"
                })),
            )
            .await;
        time::sleep(Duration::from_millis(10_000)).await;

        assert_eq!(dashboard.view_state().await.sensor.temperature, Some(22.0));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_failures_never_stop_polling() {
        let store = seeded().await;
        store.fail_fetches("sensor_data");
        let dashboard = Dashboard::new(store.clone(), SyncSettings::default());
        dashboard.start_polling();
        time::sleep(Duration::from_millis(4001)).await;

        let state = dashboard.view_state().await;
        assert!(dashboard.is_polling());
        assert!(state.sensor.is_empty());
        assert_eq!(state.controls.strip, Some(true));
        assert!(state.transient_error.is_none());
    }

    #[tokio::test]
    async fn failed_control_write_surfaces_error() {
        let store = seeded().await;
        let dashboard = Dashboard::new(store.clone(), SyncSettings::default());
        dashboard.refresh().await;

        store.fail_upserts(true);
        dashboard.set_control(ControlField::Strip, &json!(false)).await;

        let state = dashboard.view_state().await;
        assert_eq!(state.transient_error.as_deref(), Some(GENERIC_MUTATION_ERROR));
        assert_eq!(state.controls.strip, Some(true));

        dashboard.clear_error().await;
        assert!(dashboard.view_state().await.transient_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_dashboard_mid_refresh_is_inert() {
        let store = seeded().await;
        store.script_fetch("sensor_data", Duration::from_millis(500), None);
        let dashboard = Dashboard::new(store, SyncSettings::default());
        dashboard.start_polling();
        time::sleep(Duration::from_millis(10)).await;

        drop(dashboard);
        // The in-flight tick completes against a dropped view without panicking.
        time::sleep(Duration::from_millis(1000)).await;
    }
}
