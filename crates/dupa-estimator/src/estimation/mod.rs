//! Detailed Unit Price Analysis (DUPA) cost estimation for road repair reports.
//!
//! A [`RateCatalog`] feeds the pure [`CostEngine`]; [`MeasurementSession`] wraps the
//! edit/commit workflow around a report's measured area, and [`EstimationService`]
//! hosts those sessions behind the HTTP router.

pub mod catalog;
pub mod engine;
pub mod measurement;
pub mod router;
pub mod service;
pub mod session;
pub mod store;

#[cfg(test)]
mod tests;

pub use catalog::{CatalogError, EquipmentRate, LabourRate, MaterialRate, RateCatalog};
pub use engine::{CostBreakdown, CostEngine, EquipmentLine, LabourLine, MaterialLine};
pub use measurement::{parse_area, InvalidInputPolicy, MeasurementError, SquareMeters};
pub use router::{estimation_router, MeasurementInput};
pub use service::{EstimationService, EstimationServiceError};
pub use session::{
    CommitFailure, MeasurementSession, PendingCommit, SessionError, SessionState, SessionView,
};
pub use store::{
    MeasurementListener, MeasurementUpdate, ReportId, ReportStore, ReportStoreError,
    StoreResponse,
};
