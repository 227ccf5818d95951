use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::engine::{CostBreakdown, CostEngine};
use super::measurement::{InvalidInputPolicy, MeasurementError, SquareMeters};
use super::store::{
    MeasurementListener, MeasurementUpdate, ReportId, ReportStore, ReportStoreError,
    StoreResponse,
};

/// Externally visible phase of a measurement session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Viewing,
    Editing,
    Committing,
}

impl SessionState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Viewing => "viewing",
            Self::Editing => "editing",
            Self::Committing => "committing",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone)]
struct Draft {
    text: String,
    area: Result<SquareMeters, MeasurementError>,
}

impl Draft {
    fn new(text: &str, policy: InvalidInputPolicy) -> Self {
        Self {
            text: text.to_string(),
            area: policy.resolve(text),
        }
    }

    fn from_area(area: SquareMeters) -> Self {
        Self {
            text: area.value().to_string(),
            area: Ok(area),
        }
    }
}

// The draft only exists while editing or committing.
#[derive(Debug, Clone)]
enum Phase {
    Viewing,
    Editing { draft: Draft },
    Committing { draft: Draft, area: SquareMeters },
}

/// Request produced when a session enters `Committing`.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCommit {
    pub report_id: ReportId,
    pub update: MeasurementUpdate,
}

/// Edit/commit workflow around the measured area of one report.
pub struct MeasurementSession {
    report_id: ReportId,
    classification: String,
    committed: SquareMeters,
    phase: Phase,
    engine: CostEngine,
    policy: InvalidInputPolicy,
    listener: Option<Arc<dyn MeasurementListener>>,
    last_error: Option<String>,
}

impl fmt::Debug for MeasurementSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeasurementSession")
            .field("report_id", &self.report_id)
            .field("classification", &self.classification)
            .field("committed", &self.committed)
            .field("phase", &self.phase)
            .field("policy", &self.policy)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

impl MeasurementSession {
    pub fn open(
        report_id: ReportId,
        classification: impl Into<String>,
        committed: SquareMeters,
        engine: CostEngine,
    ) -> Self {
        Self {
            report_id,
            classification: classification.into(),
            committed,
            phase: Phase::Viewing,
            engine,
            policy: InvalidInputPolicy::default(),
            listener: None,
            last_error: None,
        }
    }

    pub fn with_policy(mut self, policy: InvalidInputPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn MeasurementListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn report_id(&self) -> &ReportId {
        &self.report_id
    }

    pub fn classification(&self) -> &str {
        &self.classification
    }

    pub fn committed_area(&self) -> SquareMeters {
        self.committed
    }

    pub fn state(&self) -> SessionState {
        match self.phase {
            Phase::Viewing => SessionState::Viewing,
            Phase::Editing { .. } => SessionState::Editing,
            Phase::Committing { .. } => SessionState::Committing,
        }
    }

    pub fn draft_text(&self) -> Option<&str> {
        match &self.phase {
            Phase::Viewing => None,
            Phase::Editing { draft } | Phase::Committing { draft, .. } => Some(&draft.text),
        }
    }

    /// Message from the most recent failed commit, cleared by the next transition.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Breakdown currently on display: the committed area while viewing, the draft
    /// otherwise. Fails only when the draft text is not a valid area.
    pub fn breakdown(&self) -> Result<CostBreakdown, MeasurementError> {
        match &self.phase {
            Phase::Viewing => Ok(self.committed_breakdown()),
            Phase::Editing { draft } => draft.area.clone().map(|area| self.engine.compute(area)),
            Phase::Committing { area, .. } => Ok(self.engine.compute(*area)),
        }
    }

    pub fn committed_breakdown(&self) -> CostBreakdown {
        self.engine.compute(self.committed)
    }

    pub fn begin_edit(&mut self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Viewing => {
                self.phase = Phase::Editing {
                    draft: Draft::from_area(self.committed),
                };
                self.last_error = None;
                debug!(report_id = %self.report_id, "measurement edit started");
                Ok(())
            }
            Phase::Editing { .. } => Err(self.invalid("begin edit")),
            Phase::Committing { .. } => Err(SessionError::CommitInFlight),
        }
    }

    /// Replaces the draft text; the next [`breakdown`](Self::breakdown) reflects it.
    pub fn update_draft(&mut self, text: &str) -> Result<(), SessionError> {
        let policy = self.policy;
        match &mut self.phase {
            Phase::Editing { draft } => {
                *draft = Draft::new(text, policy);
                Ok(())
            }
            Phase::Viewing => Err(SessionError::InvalidTransition {
                action: "update draft",
                state: SessionState::Viewing,
            }),
            Phase::Committing { .. } => Err(SessionError::CommitInFlight),
        }
    }

    pub fn cancel(&mut self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Editing { .. } => {
                self.phase = Phase::Viewing;
                self.last_error = None;
                debug!(report_id = %self.report_id, "measurement edit cancelled");
                Ok(())
            }
            Phase::Viewing => Err(self.invalid("cancel")),
            Phase::Committing { .. } => Err(SessionError::CommitInFlight),
        }
    }

    /// Moves an edit with a valid draft into `Committing` and returns the store request.
    ///
    /// An invalid draft leaves the session in `Editing`.
    pub fn begin_commit(&mut self) -> Result<PendingCommit, SessionError> {
        let draft = match &self.phase {
            Phase::Editing { draft } => draft.clone(),
            Phase::Viewing => return Err(self.invalid("commit")),
            Phase::Committing { .. } => return Err(SessionError::CommitInFlight),
        };
        let area = draft.area.clone()?;

        self.phase = Phase::Committing { draft, area };
        self.last_error = None;
        info!(report_id = %self.report_id, area = area.value(), "committing measurement");

        Ok(PendingCommit {
            report_id: self.report_id.clone(),
            update: MeasurementUpdate { measurement: area },
        })
    }

    /// Applies the report store outcome to a session in `Committing` and notifies the
    /// session listener on success.
    ///
    /// Success makes the draft the committed area. Any failure returns to `Editing` with
    /// the draft intact and the committed area unchanged.
    pub fn complete_commit(
        &mut self,
        outcome: Result<StoreResponse, ReportStoreError>,
    ) -> Result<SquareMeters, SessionError> {
        let area = self.settle_commit(outcome)?;
        if let Some(listener) = &self.listener {
            listener.measurement_updated(&self.report_id, area);
        }
        Ok(area)
    }

    /// Same transition as [`complete_commit`](Self::complete_commit) without calling the
    /// listener, for hosts that notify after releasing their own locks.
    pub fn settle_commit(
        &mut self,
        outcome: Result<StoreResponse, ReportStoreError>,
    ) -> Result<SquareMeters, SessionError> {
        let (draft, area) = match &self.phase {
            Phase::Committing { draft, area } => (draft.clone(), *area),
            _ => return Err(self.invalid("complete commit")),
        };

        let failure = match outcome {
            Ok(response) if response.success => None,
            Ok(response) => Some(CommitFailure::Rejected(response.message)),
            Err(err) => Some(CommitFailure::Transport(err)),
        };

        if let Some(failure) = failure {
            warn!(report_id = %self.report_id, error = %failure, "measurement commit failed");
            self.phase = Phase::Editing { draft };
            self.last_error = Some(failure.to_string());
            return Err(SessionError::CommitFailed(failure));
        }

        self.committed = area;
        self.phase = Phase::Viewing;
        self.last_error = None;
        info!(report_id = %self.report_id, area = area.value(), "measurement committed");

        Ok(area)
    }

    /// Returns a session whose store call will never be answered to `Editing`.
    ///
    /// No-op unless the session is `Committing`.
    pub fn abandon_commit(&mut self) {
        if self.state() != SessionState::Committing {
            return;
        }
        let abandoned = ReportStoreError::Transport(
            "commit abandoned before the report store answered".to_string(),
        );
        if let Err(error) = self.settle_commit(Err(abandoned)) {
            debug!(report_id = %self.report_id, %error, "abandoned commit returned to editing");
        }
    }

    /// Runs a full commit against `store`.
    ///
    /// Dropping the returned future before the store answers abandons the commit.
    pub async fn commit<S>(&mut self, store: &S) -> Result<SquareMeters, SessionError>
    where
        S: ReportStore,
    {
        let pending = self.begin_commit()?;
        let mut attempt = CommitAttempt {
            session: self,
            settled: false,
        };
        let outcome = store
            .update_measurement(&pending.report_id, pending.update)
            .await;
        attempt.settled = true;
        attempt.session.complete_commit(outcome)
    }

    pub fn view(&self) -> SessionView {
        let (breakdown, draft_error) = match self.breakdown() {
            Ok(breakdown) => (Some(breakdown), None),
            Err(err) => (None, Some(err.to_string())),
        };

        SessionView {
            report_id: self.report_id.clone(),
            classification: self.classification.clone(),
            state: self.state(),
            committed_area: self.committed,
            draft: self.draft_text().map(str::to_string),
            crew: self.engine.catalog().crew_summary(),
            breakdown,
            draft_error,
            last_error: self.last_error.clone(),
        }
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            action,
            state: self.state(),
        }
    }
}

// Abandons the commit when a `commit` future is dropped mid-await.
struct CommitAttempt<'a> {
    session: &'a mut MeasurementSession,
    settled: bool,
}

impl Drop for CommitAttempt<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.session.abandon_commit();
        }
    }
}

/// Serializable snapshot of a session for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub report_id: ReportId,
    pub classification: String,
    pub state: SessionState,
    pub committed_area: SquareMeters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<String>,
    pub crew: Vec<String>,
    pub breakdown: Option<CostBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CommitFailure {
    #[error("report store rejected the measurement: {}", .0.as_deref().unwrap_or("no reason given"))]
    Rejected(Option<String>),
    #[error(transparent)]
    Transport(#[from] ReportStoreError),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: SessionState,
    },
    #[error("a measurement commit is already in flight")]
    CommitInFlight,
    #[error("invalid measurement: {0}")]
    InvalidMeasurement(#[from] MeasurementError),
    #[error("could not save measurement: {0}")]
    CommitFailed(#[from] CommitFailure),
}
