use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::measurement::SquareMeters;
use super::service::{EstimationService, EstimationServiceError};
use super::session::SessionError;
use super::store::{MeasurementListener, ReportId, ReportStore};

/// Area as submitted by a form: either a JSON number or the raw field text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MeasurementInput {
    Number(f64),
    Text(String),
}

impl MeasurementInput {
    pub fn as_text(&self) -> String {
        match self {
            Self::Number(value) => value.to_string(),
            Self::Text(text) => text.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EstimateRequest {
    pub measurement: MeasurementInput,
}

#[derive(Debug, Deserialize)]
pub struct OpenSessionRequest {
    pub classification: String,
    pub measurement: SquareMeters,
}

#[derive(Debug, Deserialize)]
pub struct DraftRequest {
    pub measurement: MeasurementInput,
}

/// Router exposing the stateless estimate and the per-report session workflow.
pub fn estimation_router<S, L>(service: Arc<EstimationService<S, L>>) -> Router
where
    S: ReportStore + 'static,
    L: MeasurementListener + 'static,
{
    Router::new()
        .route("/api/v1/dupa/estimate", post(estimate_handler::<S, L>))
        .route(
            "/api/v1/reports/:report_id/dupa",
            post(open_handler::<S, L>)
                .get(view_handler::<S, L>)
                .delete(close_handler::<S, L>),
        )
        .route(
            "/api/v1/reports/:report_id/dupa/edit",
            post(begin_edit_handler::<S, L>),
        )
        .route(
            "/api/v1/reports/:report_id/dupa/draft",
            put(draft_handler::<S, L>),
        )
        .route(
            "/api/v1/reports/:report_id/dupa/cancel",
            post(cancel_handler::<S, L>),
        )
        .route(
            "/api/v1/reports/:report_id/dupa/commit",
            post(commit_handler::<S, L>),
        )
        .with_state(service)
}

pub(crate) async fn estimate_handler<S, L>(
    State(service): State<Arc<EstimationService<S, L>>>,
    Json(request): Json<EstimateRequest>,
) -> Response
where
    S: ReportStore + 'static,
    L: MeasurementListener + 'static,
{
    match service.estimate(&request.measurement.as_text()) {
        Ok(breakdown) => (StatusCode::OK, Json(breakdown)).into_response(),
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn open_handler<S, L>(
    State(service): State<Arc<EstimationService<S, L>>>,
    Path(report_id): Path<String>,
    Json(request): Json<OpenSessionRequest>,
) -> Response
where
    S: ReportStore + 'static,
    L: MeasurementListener + 'static,
{
    let result = service.open(
        ReportId(report_id),
        request.classification,
        request.measurement,
    );
    respond(result, StatusCode::CREATED)
}

pub(crate) async fn view_handler<S, L>(
    State(service): State<Arc<EstimationService<S, L>>>,
    Path(report_id): Path<String>,
) -> Response
where
    S: ReportStore + 'static,
    L: MeasurementListener + 'static,
{
    respond(service.view(&ReportId(report_id)), StatusCode::OK)
}

pub(crate) async fn close_handler<S, L>(
    State(service): State<Arc<EstimationService<S, L>>>,
    Path(report_id): Path<String>,
) -> Response
where
    S: ReportStore + 'static,
    L: MeasurementListener + 'static,
{
    match service.close(&ReportId(report_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn begin_edit_handler<S, L>(
    State(service): State<Arc<EstimationService<S, L>>>,
    Path(report_id): Path<String>,
) -> Response
where
    S: ReportStore + 'static,
    L: MeasurementListener + 'static,
{
    respond(service.begin_edit(&ReportId(report_id)), StatusCode::OK)
}

pub(crate) async fn draft_handler<S, L>(
    State(service): State<Arc<EstimationService<S, L>>>,
    Path(report_id): Path<String>,
    Json(request): Json<DraftRequest>,
) -> Response
where
    S: ReportStore + 'static,
    L: MeasurementListener + 'static,
{
    let text = request.measurement.as_text();
    respond(
        service.update_draft(&ReportId(report_id), &text),
        StatusCode::OK,
    )
}

pub(crate) async fn cancel_handler<S, L>(
    State(service): State<Arc<EstimationService<S, L>>>,
    Path(report_id): Path<String>,
) -> Response
where
    S: ReportStore + 'static,
    L: MeasurementListener + 'static,
{
    respond(service.cancel(&ReportId(report_id)), StatusCode::OK)
}

pub(crate) async fn commit_handler<S, L>(
    State(service): State<Arc<EstimationService<S, L>>>,
    Path(report_id): Path<String>,
) -> Response
where
    S: ReportStore + 'static,
    L: MeasurementListener + 'static,
{
    let report_id = ReportId(report_id);
    respond(service.commit(&report_id).await, StatusCode::OK)
}

fn respond<T: serde::Serialize>(
    result: Result<T, EstimationServiceError>,
    status: StatusCode,
) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) fn error_response(error: EstimationServiceError) -> Response {
    let message = error.to_string();
    match error {
        EstimationServiceError::SessionNotFound(report_id) => {
            let payload = json!({ "error": message, "report_id": report_id });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        EstimationServiceError::Commit { view, .. } => {
            let payload = json!({ "error": message, "session": view });
            (StatusCode::BAD_GATEWAY, Json(payload)).into_response()
        }
        EstimationServiceError::Session(session_error) => {
            let status = match session_error {
                SessionError::InvalidTransition { .. } | SessionError::CommitInFlight => {
                    StatusCode::CONFLICT
                }
                SessionError::InvalidMeasurement(_) => StatusCode::UNPROCESSABLE_ENTITY,
                SessionError::CommitFailed(_) => StatusCode::BAD_GATEWAY,
            };
            let payload = json!({ "error": message });
            (status, Json(payload)).into_response()
        }
    }
}
