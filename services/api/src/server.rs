use crate::cli::ServeArgs;
use crate::infra::{
    AppState, InMemoryResponseRepository, InMemoryUploadStaging, InMemoryWizardSessions,
};
use crate::routes::with_screening_routes;
use axum::{Extension, Router};
use axum_prometheus::PrometheusMetricLayer;
use border_screening::config::{AppConfig, ScreeningConfig};
use border_screening::error::AppError;
use border_screening::telemetry;
use border_screening::workflows::screening::ScreeningService;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

impl ServeArgs {
    fn apply(self, config: &mut AppConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }
}

/// Intake app over in-memory stores; readiness stays false until the listener is bound.
fn intake_app(screening: ScreeningConfig, readiness: Arc<AtomicBool>) -> Router {
    let (metrics_layer, metrics_handle) = PrometheusMetricLayer::pair();
    let service = ScreeningService::new(
        Arc::new(InMemoryResponseRepository::default()),
        Arc::new(InMemoryWizardSessions::default()),
        Arc::new(InMemoryUploadStaging::default()),
        screening,
    );

    with_screening_routes(Arc::new(service))
        .layer(Extension(AppState {
            readiness,
            metrics: Arc::new(metrics_handle),
        }))
        .layer(metrics_layer)
}

pub(crate) async fn run(args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    args.apply(&mut config);
    telemetry::init(&config.telemetry)?;

    let addr = config.server.socket_addr()?;
    let readiness = Arc::new(AtomicBool::new(false));
    let app = intake_app(config.screening.clone(), readiness.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness.store(true, Ordering::Release);
    info!(
        environment = ?config.environment,
        %addr,
        upload_max_bytes = config.screening.upload_max_bytes,
        page_size = config.screening.responses_page_size,
        "border screening intake ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
