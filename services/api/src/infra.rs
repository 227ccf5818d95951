use dupa_estimator::estimation::{
    MeasurementListener, MeasurementUpdate, ReportId, ReportStore, ReportStoreError,
    SquareMeters, StoreResponse,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Report measurements kept in process memory until a real report backend is wired in.
#[derive(Default, Clone)]
pub(crate) struct InMemoryReportStore {
    measurements: Arc<Mutex<HashMap<ReportId, SquareMeters>>>,
}

impl InMemoryReportStore {
    #[cfg(test)]
    pub(crate) fn measurement(&self, report_id: &ReportId) -> Option<SquareMeters> {
        self.measurements
            .lock()
            .expect("report store mutex poisoned")
            .get(report_id)
            .copied()
    }
}

impl ReportStore for InMemoryReportStore {
    async fn update_measurement(
        &self,
        report_id: &ReportId,
        update: MeasurementUpdate,
    ) -> Result<StoreResponse, ReportStoreError> {
        let mut guard = self
            .measurements
            .lock()
            .map_err(|_| ReportStoreError::Transport("report store lock poisoned".to_string()))?;
        guard.insert(report_id.clone(), update.measurement);
        Ok(StoreResponse::ok())
    }
}

/// Logs committed measurements so report list refreshes can be traced.
#[derive(Default, Clone, Copy)]
pub(crate) struct TracingMeasurementListener;

impl MeasurementListener for TracingMeasurementListener {
    fn measurement_updated(&self, report_id: &ReportId, area: SquareMeters) {
        info!(%report_id, area = area.value(), "report measurement updated");
    }
}
