use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use serde_json::Value;
use tokio::sync::Notify;

use crate::estimation::catalog::{EquipmentRate, LabourRate, MaterialRate, RateCatalog};
use crate::estimation::engine::CostEngine;
use crate::estimation::measurement::SquareMeters;
use crate::estimation::service::EstimationService;
use crate::estimation::session::MeasurementSession;
use crate::estimation::store::{
    MeasurementListener, MeasurementUpdate, ReportId, ReportStore, ReportStoreError,
    StoreResponse,
};

/// Minimal catalog with one line per category at the standard constants.
pub(super) fn scenario_catalog() -> RateCatalog {
    RateCatalog {
        output_rate_per_hour: 70.0,
        minor_tools_surcharge_fraction: 0.05,
        vat_fraction: 0.05,
        labour: vec![LabourRate {
            role: "Construction Foreman".to_string(),
            persons: 1,
            hourly_rate: 170.29,
        }],
        equipment: vec![EquipmentRate {
            name: "Concrete Vibrator".to_string(),
            units: 2,
            hourly_rate: 57.17,
        }],
        materials: vec![MaterialRate {
            name: "Reinforcing Steel Bar".to_string(),
            unit: "kg".to_string(),
            quantity_per_square_meter: 0.43,
            unit_cost: 70.2,
        }],
    }
}

pub(super) fn scenario_engine() -> CostEngine {
    CostEngine::new(Arc::new(scenario_catalog()))
}

pub(super) fn area(value: f64) -> SquareMeters {
    SquareMeters::new(value).expect("valid test area")
}

pub(super) fn report_id() -> ReportId {
    ReportId("report-0042".to_string())
}

pub(super) fn session(committed: f64) -> MeasurementSession {
    MeasurementSession::open(
        report_id(),
        "Longitudinal crack",
        area(committed),
        CostEngine::standard(),
    )
}

pub(super) fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}

#[derive(Default)]
pub(super) struct MemoryStore {
    updates: Mutex<Vec<(ReportId, MeasurementUpdate)>>,
}

impl MemoryStore {
    pub(super) fn updates(&self) -> Vec<(ReportId, MeasurementUpdate)> {
        self.updates.lock().expect("store mutex poisoned").clone()
    }
}

impl ReportStore for MemoryStore {
    async fn update_measurement(
        &self,
        report_id: &ReportId,
        update: MeasurementUpdate,
    ) -> Result<StoreResponse, ReportStoreError> {
        self.updates
            .lock()
            .expect("store mutex poisoned")
            .push((report_id.clone(), update));
        Ok(StoreResponse::ok())
    }
}

pub(super) struct RejectingStore;

impl ReportStore for RejectingStore {
    async fn update_measurement(
        &self,
        _report_id: &ReportId,
        _update: MeasurementUpdate,
    ) -> Result<StoreResponse, ReportStoreError> {
        Ok(StoreResponse::rejected("report is locked for review"))
    }
}

pub(super) struct OfflineStore;

impl ReportStore for OfflineStore {
    async fn update_measurement(
        &self,
        _report_id: &ReportId,
        _update: MeasurementUpdate,
    ) -> Result<StoreResponse, ReportStoreError> {
        Err(ReportStoreError::Transport("connection refused".to_string()))
    }
}

/// Store that parks every request until the test releases it.
#[derive(Default)]
pub(super) struct GatedStore {
    pub(super) entered: Notify,
    pub(super) release: Notify,
}

impl ReportStore for GatedStore {
    async fn update_measurement(
        &self,
        _report_id: &ReportId,
        _update: MeasurementUpdate,
    ) -> Result<StoreResponse, ReportStoreError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(StoreResponse::ok())
    }
}

#[derive(Default)]
pub(super) struct RecordingListener {
    events: Mutex<Vec<(ReportId, SquareMeters)>>,
}

impl RecordingListener {
    pub(super) fn events(&self) -> Vec<(ReportId, SquareMeters)> {
        self.events.lock().expect("listener mutex poisoned").clone()
    }
}

impl MeasurementListener for RecordingListener {
    fn measurement_updated(&self, report_id: &ReportId, area: SquareMeters) {
        self.events
            .lock()
            .expect("listener mutex poisoned")
            .push((report_id.clone(), area));
    }
}

pub(super) fn estimation_service<S: ReportStore + 'static>(
    store: Arc<S>,
) -> (EstimationService<S, RecordingListener>, Arc<RecordingListener>) {
    let listener = Arc::new(RecordingListener::default());
    let service = EstimationService::new(CostEngine::standard(), store, listener.clone());
    (service, listener)
}

pub(super) fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

pub(super) fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}
