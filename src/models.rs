use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Identity of the singleton control row. No other control rows are ever written.
pub const CONTROL_RECORD_ID: i64 = 1;

/// Shown in place of a reading that has not been observed.
pub const UNKNOWN_READING: &str = "--";

/// Most recent row of the append-only sensor log.
///
/// Every field is optional: an empty snapshot (all `None`) is what the view
/// falls back to when the sensor log is empty or the fetch failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SensorSnapshot {
    /// Degrees Celsius
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Relative humidity percentage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    /// Raw light level reported by the photoresistor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl SensorSnapshot {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn temperature_label(&self) -> String {
        self.temperature
            .map(|t| format!("{t:.1}"))
            .unwrap_or_else(|| UNKNOWN_READING.to_owned())
    }

    pub fn humidity_label(&self) -> String {
        self.humidity
            .map(|h| format!("{h:.0}"))
            .unwrap_or_else(|| UNKNOWN_READING.to_owned())
    }
}

/// The control row as stored remotely, with every column optional.
///
/// The same type doubles as the typed partial update sent on `upsert`:
/// absent columns are skipped when serialising, so an envelope carrying
/// `id`, one changed column and `updated_at` serialises to exactly those
/// three keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ControlRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strip: Option<bool>,
    /// 0..=23
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_hours: Option<i64>,
    /// 0..=59
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub led1: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub led2: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub led3: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rgb_r: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rgb_g: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rgb_b: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buzzer: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Strip timer as displayed, with defaults applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Timer {
    pub hours: i64,
    pub minutes: i64,
}

/// Every actuator value the view displays, defaults substituted for absent
/// columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResolvedControls {
    pub strip: bool,
    pub timer: Timer,
    pub led1: i64,
    pub led2: i64,
    pub led3: i64,
    pub rgb_r: i64,
    pub rgb_g: i64,
    pub rgb_b: i64,
    pub buzzer: bool,
    pub updated_at: Option<DateTime<Utc>>,
}
