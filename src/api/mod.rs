pub mod dto;
pub mod errors;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::dashboard::Dashboard;
use handlers::ApiDoc;

pub fn router(dashboard: Arc<Dashboard>) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/view", get(handlers::get_view))
        .route("/controls/{field}", put(handlers::set_control))
        .route("/polling/start", post(handlers::start_polling))
        .route("/polling/stop", post(handlers::stop_polling))
        .with_state(dashboard)
        .split_for_parts();

    router.route("/health", get(handlers::health)).route(
        "/api-docs/openapi.json",
        get(move || async move { axum::Json(api) }),
    )
}
