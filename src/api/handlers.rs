use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use utoipa::OpenApi;

use super::{
    dto::{PollingStatusDto, SetControlRequest, ViewStateDto},
    errors::AppError,
};
use crate::{
    control::ControlField,
    dashboard::Dashboard,
    models::{ResolvedControls, SensorSnapshot, Timer},
};

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Current view state with every control resolved to its displayed value.
#[utoipa::path(
    get,
    path = "/view",
    responses(
        (status = 200, description = "Current dashboard view state", body = ViewStateDto),
    ),
    tag = "dashboard"
)]
pub async fn get_view(State(dashboard): State<Arc<Dashboard>>) -> Json<ViewStateDto> {
    Json(dashboard.view_state().await.into())
}

/// Set one control field. Write failures are not HTTP errors: they show up
/// as `transient_error` in `GET /view`.
#[utoipa::path(
    put,
    path = "/controls/{field}",
    params(
        ("field" = String, Path, description = "Control field, e.g. `led1` or `timer_hours`"),
    ),
    request_body = SetControlRequest,
    responses(
        (status = 204, description = "Update processed"),
        (status = 400, description = "Unknown control field"),
    ),
    tag = "dashboard"
)]
pub async fn set_control(
    State(dashboard): State<Arc<Dashboard>>,
    Path(field): Path<String>,
    Json(body): Json<SetControlRequest>,
) -> Result<StatusCode, AppError> {
    let field = field.parse::<ControlField>().map_err(AppError::UnknownField)?;
    dashboard.set_control(field, &body.value).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Start (or restart) the poll schedule.
#[utoipa::path(
    post,
    path = "/polling/start",
    responses(
        (status = 200, description = "Polling state", body = PollingStatusDto),
    ),
    tag = "polling"
)]
pub async fn start_polling(State(dashboard): State<Arc<Dashboard>>) -> Json<PollingStatusDto> {
    dashboard.start_polling();
    Json(PollingStatusDto {
        polling: dashboard.is_polling(),
    })
}

/// Stop the poll schedule. Safe to call repeatedly.
#[utoipa::path(
    post,
    path = "/polling/stop",
    responses(
        (status = 200, description = "Polling state", body = PollingStatusDto),
    ),
    tag = "polling"
)]
pub async fn stop_polling(State(dashboard): State<Arc<Dashboard>>) -> Json<PollingStatusDto> {
    dashboard.stop_polling();
    Json(PollingStatusDto {
        polling: dashboard.is_polling(),
    })
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI document
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(get_view, set_control, start_polling, stop_polling, health),
    components(schemas(
        ViewStateDto,
        SetControlRequest,
        PollingStatusDto,
        SensorSnapshot,
        ResolvedControls,
        Timer,
        ControlField
    )),
    tags(
        (name = "dashboard", description = "View state and control endpoints"),
        (name = "polling",   description = "Poll lifecycle"),
        (name = "system",    description = "System endpoints"),
    ),
    info(
        title = "Smart Home Dashboard API",
        version = "0.1.0",
        description = "Sensor view state and actuator controls for the home dashboard"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{json, Value};

    use crate::{
        api::router,
        dashboard::{Dashboard, SyncSettings},
        error_surface::GENERIC_MUTATION_ERROR,
        store::{testing::ScriptedStore, MemoryStore},
    };

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert("controls", ScriptedStore::row(json!({ "id": 1, "strip": false })))
            .await;
        store
    }

    fn test_server(dashboard: Arc<Dashboard>) -> TestServer {
        TestServer::new(router(dashboard)).unwrap()
    }

    // -----------------------------------------------------------------------
    // GET /view
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn view_before_first_refresh_shows_loading_and_defaults() {
        let dashboard = Arc::new(Dashboard::new(
            Arc::new(seeded_store().await),
            SyncSettings::default(),
        ));
        let server = test_server(dashboard);

        let resp = server.get("/view").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["show_loading"], true);
        assert_eq!(body["temperature_label"], "--");
        assert_eq!(body["timer"], json!({ "hours": 0, "minutes": 30 }));
        assert_eq!(body["controls"]["led1"], 0);
        assert!(body["transient_error"].is_null());
    }

    #[tokio::test]
    async fn view_after_refresh_with_empty_sensor_log() {
        let dashboard = Arc::new(Dashboard::new(
            Arc::new(seeded_store().await),
            SyncSettings::default(),
        ));
        dashboard.refresh().await;
        let server = test_server(dashboard);

        let body: Value = server.get("/view").await.json();
        assert_eq!(body["sensor"], json!({}));
        assert_eq!(body["controls"]["strip"], false);
        assert_eq!(body["is_loading"], false);
        assert_eq!(body["temperature_label"], "--");
    }

    // -----------------------------------------------------------------------
    // PUT /controls/{field}
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn set_control_clamps_and_updates_view() {
        let store = seeded_store().await;
        let dashboard = Arc::new(Dashboard::new(
            Arc::new(store.clone()),
            SyncSettings::default(),
        ));
        let server = test_server(dashboard);

        let resp = server
            .put("/controls/led1")
            .json(&json!({ "value": 999 }))
            .await;
        resp.assert_status(StatusCode::NO_CONTENT);

        let body: Value = server.get("/view").await.json();
        assert_eq!(body["controls"]["led1"], 255);
        assert_eq!(store.rows("controls").await[0]["led1"], json!(255));
    }

    #[tokio::test]
    async fn set_control_accepts_camel_case_field() {
        let dashboard = Arc::new(Dashboard::new(
            Arc::new(seeded_store().await),
            SyncSettings::default(),
        ));
        let server = test_server(dashboard);

        server
            .put("/controls/timerHours")
            .json(&json!({ "value": "7" }))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let body: Value = server.get("/view").await.json();
        assert_eq!(body["timer"], json!({ "hours": 7, "minutes": 30 }));
    }

    #[tokio::test]
    async fn set_control_unknown_field_is_bad_request() {
        let dashboard = Arc::new(Dashboard::new(
            Arc::new(seeded_store().await),
            SyncSettings::default(),
        ));
        let server = test_server(dashboard);

        let resp = server
            .put("/controls/fan")
            .json(&json!({ "value": 1 }))
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = resp.json();
        assert!(body["error"].as_str().unwrap().contains("fan"));
    }

    #[tokio::test]
    async fn failed_write_is_reported_through_view_not_status() {
        let store = Arc::new(ScriptedStore::new());
        store.fail_upserts(true);
        let dashboard = Arc::new(Dashboard::new(store, SyncSettings::default()));
        let server = test_server(dashboard);

        server
            .put("/controls/strip")
            .json(&json!({ "value": true }))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let body: Value = server.get("/view").await.json();
        assert_eq!(body["transient_error"], GENERIC_MUTATION_ERROR);
        assert_eq!(body["controls"]["strip"], false);
    }

    // -----------------------------------------------------------------------
    // POST /polling/*
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn polling_can_be_started_and_stopped() {
        let dashboard = Arc::new(Dashboard::new(
            Arc::new(seeded_store().await),
            SyncSettings::default(),
        ));
        let server = test_server(dashboard.clone());

        let body: Value = server.post("/polling/start").await.json();
        assert_eq!(body["polling"], true);
        assert!(dashboard.is_polling());

        let body: Value = server.post("/polling/stop").await.json();
        assert_eq!(body["polling"], false);

        let body: Value = server.post("/polling/stop").await.json();
        assert_eq!(body["polling"], false);
    }

    // -----------------------------------------------------------------------
    // GET /health, GET /api-docs/openapi.json
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn health_returns_ok() {
        let dashboard = Arc::new(Dashboard::new(
            Arc::new(MemoryStore::new()),
            SyncSettings::default(),
        ));
        let server = test_server(dashboard);
        let resp = server.get("/health").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let dashboard = Arc::new(Dashboard::new(
            Arc::new(MemoryStore::new()),
            SyncSettings::default(),
        ));
        let server = test_server(dashboard);
        let resp = server.get("/api-docs/openapi.json").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["info"]["title"], "Smart Home Dashboard API");
        assert!(body["paths"]["/controls/{field}"].is_object());
    }
}
