use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::models::{ControlRecord, CONTROL_RECORD_ID};

// ---------------------------------------------------------------------------
// ControlField
// ---------------------------------------------------------------------------

/// One writable column of the control record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ControlField {
    Strip,
    TimerHours,
    TimerMinutes,
    Led1,
    Led2,
    Led3,
    RgbR,
    RgbG,
    RgbB,
    Buzzer,
}

/// How a field's raw input is normalised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Switch,
    Level { min: i64, max: i64 },
}

impl ControlField {
    pub const ALL: [ControlField; 10] = [
        ControlField::Strip,
        ControlField::TimerHours,
        ControlField::TimerMinutes,
        ControlField::Led1,
        ControlField::Led2,
        ControlField::Led3,
        ControlField::RgbR,
        ControlField::RgbG,
        ControlField::RgbB,
        ControlField::Buzzer,
    ];

    /// Column name in the remote control record.
    pub fn column(self) -> &'static str {
        match self {
            ControlField::Strip => "strip",
            ControlField::TimerHours => "timer_hours",
            ControlField::TimerMinutes => "timer_minutes",
            ControlField::Led1 => "led1",
            ControlField::Led2 => "led2",
            ControlField::Led3 => "led3",
            ControlField::RgbR => "rgb_r",
            ControlField::RgbG => "rgb_g",
            ControlField::RgbB => "rgb_b",
            ControlField::Buzzer => "buzzer",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            ControlField::Strip | ControlField::Buzzer => FieldKind::Switch,
            ControlField::TimerHours => FieldKind::Level { min: 0, max: 23 },
            ControlField::TimerMinutes => FieldKind::Level { min: 0, max: 59 },
            ControlField::Led1
            | ControlField::Led2
            | ControlField::Led3
            | ControlField::RgbR
            | ControlField::RgbG
            | ControlField::RgbB => FieldKind::Level { min: 0, max: 255 },
        }
    }

    /// Turn arbitrary user input into a valid update for this field.
    ///
    /// Never fails: unparseable input on a ranged field becomes `0` and is
    /// then clamped into range.
    pub fn normalize(self, raw: &Value) -> ControlUpdate {
        let value = match self.kind() {
            FieldKind::Switch => ControlValue::Switch(parse_switch(raw)),
            FieldKind::Level { min, max } => {
                ControlValue::Level(parse_int_or_zero(raw).clamp(min, max))
            }
        };
        ControlUpdate { field: self, value }
    }
}

impl fmt::Display for ControlField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for ControlField {
    type Err = String;

    /// Accepts the column name or its camelCase spelling (`timer_hours`, `timerHours`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s.chars().filter(|c| *c != '_').collect();
        ControlField::ALL
            .into_iter()
            .find(|f| {
                f.column()
                    .chars()
                    .filter(|c| *c != '_')
                    .collect::<String>()
                    .eq_ignore_ascii_case(&wanted)
            })
            .ok_or_else(|| format!("unknown control field: {s:?}"))
    }
}

// ---------------------------------------------------------------------------
// ControlUpdate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlValue {
    Switch(bool),
    Level(i64),
}

/// A validated single-field change to the control record.
///
/// Only [`ControlField::normalize`] builds one, so the value always matches
/// the field's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlUpdate {
    field: ControlField,
    value: ControlValue,
}

impl ControlUpdate {
    pub fn field(&self) -> ControlField {
        self.field
    }

    pub fn value(&self) -> ControlValue {
        self.value
    }

    /// Write this change into `record`, leaving every other column untouched.
    pub fn apply_to(&self, record: &mut ControlRecord) {
        match (self.field, self.value) {
            (ControlField::Strip, ControlValue::Switch(v)) => record.strip = Some(v),
            (ControlField::Buzzer, ControlValue::Switch(v)) => record.buzzer = Some(v),
            (ControlField::TimerHours, ControlValue::Level(v)) => record.timer_hours = Some(v),
            (ControlField::TimerMinutes, ControlValue::Level(v)) => record.timer_minutes = Some(v),
            (ControlField::Led1, ControlValue::Level(v)) => record.led1 = Some(v),
            (ControlField::Led2, ControlValue::Level(v)) => record.led2 = Some(v),
            (ControlField::Led3, ControlValue::Level(v)) => record.led3 = Some(v),
            (ControlField::RgbR, ControlValue::Level(v)) => record.rgb_r = Some(v),
            (ControlField::RgbG, ControlValue::Level(v)) => record.rgb_g = Some(v),
            (ControlField::RgbB, ControlValue::Level(v)) => record.rgb_b = Some(v),
            // Not reachable through `normalize`.
            (field, value) => {
                tracing::warn!(field = %field, value = ?value, "Mismatched control update ignored")
            }
        }
    }

    /// The partial row sent to the store: fixed `id`, the changed column and
    /// a fresh mutation timestamp.
    pub fn envelope(&self, now: DateTime<Utc>) -> ControlRecord {
        let mut record = ControlRecord {
            id: Some(CONTROL_RECORD_ID),
            updated_at: Some(now),
            ..Default::default()
        };
        self.apply_to(&mut record);
        record
    }
}

// ---------------------------------------------------------------------------
// Input parsing
// ---------------------------------------------------------------------------

/// Leading-integer parse in the style of a lenient form input: surrounding
/// whitespace and an optional sign are accepted, parsing stops at the first
/// non-digit, fractions are truncated. Anything without a leading integer is `0`.
pub fn parse_int_or_zero(raw: &Value) -> i64 {
    match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => leading_int(s).unwrap_or(0),
        _ => 0,
    }
}

fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    // Saturate rather than fail on absurdly long inputs; they are clamped anyway.
    let magnitude = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

fn parse_switch(raw: &Value) -> bool {
    match raw {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "on" | "1" | "yes"
        ),
        _ => false,
    }
}
