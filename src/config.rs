use std::{str::FromStr, time::Duration};

use anyhow::{bail, Context, Result};

use crate::{dashboard::SyncSettings, store::Collections};

// ---------------------------------------------------------------------------
// StoreBackend
// ---------------------------------------------------------------------------

/// Which remote store the dashboard talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// PostgREST-style HTTP gateway
    Rest { url: String, api_key: String },
    /// Direct Postgres connection
    Postgres { database_url: String },
    /// In-process rows, for local development
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackendKind {
    Rest,
    Postgres,
    Memory,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "rest" => Ok(Self::Rest),
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow::anyhow!("unknown store backend: {other:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: StoreBackend,
    pub sensor_collection: String,
    pub controls_collection: String,
    /// Poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// How long a transient error stays visible, in milliseconds.
    pub error_clear_ms: u64,
    /// Upper bound on any single store request, in milliseconds.
    pub request_timeout_ms: u64,
    pub server_host: String,
    pub server_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key).with_context(|| format!("missing required env var: {key}"))
        };
        let optional =
            |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());

        let backend = match optional("STORE_BACKEND", "rest").parse::<BackendKind>()? {
            BackendKind::Rest => StoreBackend::Rest {
                url: required("STORE_URL")?,
                api_key: required("STORE_API_KEY")?,
            },
            BackendKind::Postgres => StoreBackend::Postgres {
                database_url: required("DATABASE_URL")?,
            },
            BackendKind::Memory => StoreBackend::Memory,
        };

        Ok(Self {
            backend,
            sensor_collection: optional("SENSOR_COLLECTION", "sensor_data"),
            controls_collection: optional("CONTROLS_COLLECTION", "controls"),
            poll_interval_ms: positive_ms(&optional("POLL_INTERVAL_MS", "2000"), "POLL_INTERVAL_MS")?,
            error_clear_ms: positive_ms(&optional("ERROR_CLEAR_MS", "3000"), "ERROR_CLEAR_MS")?,
            request_timeout_ms: positive_ms(
                &optional("REQUEST_TIMEOUT_MS", "10000"),
                "REQUEST_TIMEOUT_MS",
            )?,
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
        })
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            collections: Collections {
                sensors: self.sensor_collection.clone(),
                controls: self.controls_collection.clone(),
            },
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            error_clear_after: Duration::from_millis(self.error_clear_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }
}

/// Parse a millisecond count that must be greater than zero.
fn positive_ms(raw: &str, key: &str) -> Result<u64> {
    let ms: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a positive integer"))?;
    if ms == 0 {
        bail!("{key} must be a positive integer");
    }
    Ok(ms)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn rest_backend_is_default_and_needs_credentials() {
        let err = config(&[]).unwrap_err();
        assert!(err.to_string().contains("STORE_URL"));

        let c = config(&[("STORE_URL", "https://x.test"), ("STORE_API_KEY", "k")]).unwrap();
        assert_eq!(
            c.backend,
            StoreBackend::Rest {
                url: "https://x.test".into(),
                api_key: "k".into()
            }
        );
    }

    #[test]
    fn defaults_match_dashboard_timings() {
        let c = config(&[("STORE_BACKEND", "memory")]).unwrap();
        assert_eq!(c.backend, StoreBackend::Memory);
        assert_eq!(c.sync_settings(), SyncSettings::default());
        assert_eq!(c.server_port, 8080);
    }

    #[test]
    fn postgres_backend_needs_database_url() {
        let err = config(&[("STORE_BACKEND", "postgres")]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));

        let c = config(&[("STORE_BACKEND", "postgres"), ("DATABASE_URL", "postgres://db")]).unwrap();
        assert_eq!(
            c.backend,
            StoreBackend::Postgres {
                database_url: "postgres://db".into()
            }
        );
    }

    #[test]
    fn unknown_backend_errors() {
        let err = config(&[("STORE_BACKEND", "redis")]).unwrap_err();
        assert!(err.to_string().contains("unknown store backend"));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = config(&[("STORE_BACKEND", "memory"), ("POLL_INTERVAL_MS", "0")]).unwrap_err();
        assert!(err.to_string().contains("POLL_INTERVAL_MS"));
    }

    #[test]
    fn custom_collections_and_timings() {
        let c = config(&[
            ("STORE_BACKEND", "memory"),
            ("SENSOR_COLLECTION", "readings"),
            ("CONTROLS_COLLECTION", "actuators"),
            ("POLL_INTERVAL_MS", "500"),
            ("ERROR_CLEAR_MS", "1500"),
        ])
        .unwrap();
        let s = c.sync_settings();
        assert_eq!(s.collections.sensors, "readings");
        assert_eq!(s.collections.controls, "actuators");
        assert_eq!(s.poll_interval, Duration::from_millis(500));
        assert_eq!(s.error_clear_after, Duration::from_millis(1500));
    }
}
