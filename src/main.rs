use std::{sync::Arc, time::Duration};

use anyhow::Result;
use serde_json::json;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use smart_home_dashboard::{
    api,
    config::{Config, StoreBackend},
    models::CONTROL_RECORD_ID,
    store::{self, MemoryStore, PgStore, RemoteStore, RestStore},
    Dashboard,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine, vars may come from the environment
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    let settings = config.sync_settings();

    let store = build_store(&config, settings.request_timeout).await?;
    info!(backend = store.backend_name(), "Remote store ready");

    let dashboard = Arc::new(Dashboard::new(store, settings));
    dashboard.start_polling();

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(dashboard.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    dashboard.stop_polling();
    Ok(())
}

async fn build_store(config: &Config, request_timeout: Duration) -> Result<Arc<dyn RemoteStore>> {
    let store: Arc<dyn RemoteStore> = match &config.backend {
        StoreBackend::Rest { url, api_key } => {
            Arc::new(RestStore::new(url, api_key, request_timeout)?)
        }
        StoreBackend::Postgres { database_url } => {
            let pool = store::postgres::create_pool(database_url).await?;
            store::postgres::run_migrations(&pool).await?;
            info!("Database ready");
            Arc::new(PgStore::new(pool))
        }
        StoreBackend::Memory => {
            let memory = MemoryStore::new();
            let mut row = store::Record::new();
            row.insert("id".to_owned(), json!(CONTROL_RECORD_ID));
            memory.insert(&config.controls_collection, row).await;
            Arc::new(memory)
        }
    };
    Ok(store)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
