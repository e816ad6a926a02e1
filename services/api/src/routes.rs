use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use border_screening::workflows::screening::{
    screening_router, ResponseRepository, ScreeningService, UploadStaging, WizardSessionStore,
};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;

const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4";

/// Screening API plus the probes and metrics scrape used by the deployment.
pub(crate) fn with_screening_routes<R, W, U>(service: Arc<ScreeningService<R, W, U>>) -> Router
where
    R: ResponseRepository + 'static,
    W: WizardSessionStore + 'static,
    U: UploadStaging + 'static,
{
    screening_router(service)
        .route("/health", get(liveness))
        .route("/ready", get(readiness))
        .route("/metrics", get(scrape_metrics))
}

async fn liveness() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "border-screening" }))
}

async fn readiness(Extension(state): Extension<AppState>) -> (StatusCode, Json<Value>) {
    match state.readiness.load(Ordering::Acquire) {
        true => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        false => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "starting" })),
        ),
    }
}

async fn scrape_metrics(Extension(state): Extension<AppState>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, PROMETHEUS_TEXT)], state.metrics.render())
}
