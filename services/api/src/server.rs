use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryReportStore, TracingMeasurementListener};
use crate::routes::with_estimation_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use dupa_estimator::config::AppConfig;
use dupa_estimator::error::AppError;
use dupa_estimator::estimation::{CostEngine, EstimationService};
use dupa_estimator::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let catalog = config.estimation.rate_catalog()?;
    info!(
        source = ?config.estimation.catalog_path,
        labour = catalog.labour.len(),
        equipment = catalog.equipment.len(),
        materials = catalog.materials.len(),
        invalid_input = config.estimation.invalid_input.label(),
        "rate catalog loaded"
    );

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let estimation_service = Arc::new(
        EstimationService::new(
            CostEngine::new(Arc::new(catalog)),
            Arc::new(InMemoryReportStore::default()),
            Arc::new(TracingMeasurementListener),
        )
        .with_policy(config.estimation.invalid_input),
    );

    let app = with_estimation_routes(estimation_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "dupa cost estimator ready");

    axum::serve(listener, app).await?;
    Ok(())
}
