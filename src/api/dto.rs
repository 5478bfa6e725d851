use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    models::{ResolvedControls, SensorSnapshot, Timer},
    reconciler::{derive_timer, resolve_controls},
    view_state::ViewState,
};

/// Response for `GET /view`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ViewStateDto {
    pub sensor: SensorSnapshot,
    /// Sensor temperature formatted for display, `"--"` when unknown.
    pub temperature_label: String,
    /// Sensor humidity formatted for display, `"--"` when unknown.
    pub humidity_label: String,
    /// Control values with defaults applied.
    pub controls: ResolvedControls,
    pub timer: Timer,
    pub is_loading: bool,
    /// `true` only while loading and before any temperature was seen.
    pub show_loading: bool,
    pub transient_error: Option<String>,
}

impl From<ViewState> for ViewStateDto {
    fn from(v: ViewState) -> Self {
        Self {
            temperature_label: v.sensor.temperature_label(),
            humidity_label: v.sensor.humidity_label(),
            controls: resolve_controls(&v.controls),
            timer: derive_timer(&v.controls),
            is_loading: v.is_loading,
            show_loading: v.show_loading(),
            transient_error: v.transient_error,
            sensor: v.sensor,
        }
    }
}

/// Request body for `PUT /controls/{field}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SetControlRequest {
    /// Any JSON value. Ranged fields accept numbers or numeric strings;
    /// anything unparseable is treated as 0 and clamped.
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
}

/// Response for the polling endpoints.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PollingStatusDto {
    pub polling: bool,
}
