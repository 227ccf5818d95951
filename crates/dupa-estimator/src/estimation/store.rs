use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use super::measurement::SquareMeters;

/// Identifier of the report that owns a measurement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(pub String);

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body sent to the report store when a new area is committed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementUpdate {
    pub measurement: SquareMeters,
}

/// Acknowledgement returned by the report store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StoreResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Persistence boundary for report measurements; the only asynchronous collaborator.
pub trait ReportStore: Send + Sync {
    fn update_measurement(
        &self,
        report_id: &ReportId,
        update: MeasurementUpdate,
    ) -> impl Future<Output = Result<StoreResponse, ReportStoreError>> + Send;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ReportStoreError {
    #[error("report store unavailable: {0}")]
    Transport(String),
}

/// Receives the committed area after the store accepts it, so views such as a
/// parent report row can refresh.
pub trait MeasurementListener: Send + Sync {
    fn measurement_updated(&self, report_id: &ReportId, area: SquareMeters);
}

impl<F> MeasurementListener for F
where
    F: Fn(&ReportId, SquareMeters) + Send + Sync,
{
    fn measurement_updated(&self, report_id: &ReportId, area: SquareMeters) {
        self(report_id, area)
    }
}
