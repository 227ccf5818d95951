use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use super::engine::{CostBreakdown, CostEngine};
use super::measurement::{InvalidInputPolicy, MeasurementError, SquareMeters};
use super::session::{MeasurementSession, SessionError, SessionState, SessionView};
use super::store::{MeasurementListener, ReportId, ReportStore};

/// Hosts one measurement session per report on behalf of the report views.
pub struct EstimationService<S, L> {
    engine: CostEngine,
    policy: InvalidInputPolicy,
    store: Arc<S>,
    listener: Arc<L>,
    sessions: Mutex<Sessions>,
}

type Sessions = HashMap<ReportId, MeasurementSession>;

impl<S, L> EstimationService<S, L>
where
    S: ReportStore + 'static,
    L: MeasurementListener + 'static,
{
    pub fn new(engine: CostEngine, store: Arc<S>, listener: Arc<L>) -> Self {
        Self {
            engine,
            policy: InvalidInputPolicy::default(),
            store,
            listener,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_policy(mut self, policy: InvalidInputPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> InvalidInputPolicy {
        self.policy
    }

    pub fn engine(&self) -> &CostEngine {
        &self.engine
    }

    /// Stateless estimate for arbitrary area text, subject to the input policy.
    pub fn estimate(&self, measurement: &str) -> Result<CostBreakdown, MeasurementError> {
        let area = self.policy.resolve(measurement)?;
        Ok(self.engine.compute(area))
    }

    /// Opens (or reopens) the cost detail of a report.
    ///
    /// Reopening discards any previous session unless it is mid-commit.
    pub fn open(
        &self,
        report_id: ReportId,
        classification: String,
        committed: SquareMeters,
    ) -> Result<SessionView, EstimationServiceError> {
        let mut sessions = self.sessions();
        if let Some(existing) = sessions.get(&report_id) {
            if existing.state() == SessionState::Committing {
                return Err(SessionError::CommitInFlight.into());
            }
        }

        let session = MeasurementSession::open(
            report_id.clone(),
            classification,
            committed,
            self.engine.clone(),
        )
        .with_policy(self.policy);
        let view = session.view();
        sessions.insert(report_id.clone(), session);
        info!(%report_id, area = committed.value(), "cost detail opened");

        Ok(view)
    }

    pub fn view(&self, report_id: &ReportId) -> Result<SessionView, EstimationServiceError> {
        self.with_session(report_id, |session| Ok(session.view()))
    }

    pub fn begin_edit(&self, report_id: &ReportId) -> Result<SessionView, EstimationServiceError> {
        self.with_session(report_id, |session| {
            session.begin_edit()?;
            Ok(session.view())
        })
    }

    pub fn update_draft(
        &self,
        report_id: &ReportId,
        text: &str,
    ) -> Result<SessionView, EstimationServiceError> {
        self.with_session(report_id, |session| {
            session.update_draft(text)?;
            Ok(session.view())
        })
    }

    pub fn cancel(&self, report_id: &ReportId) -> Result<SessionView, EstimationServiceError> {
        self.with_session(report_id, |session| {
            session.cancel()?;
            Ok(session.view())
        })
    }

    /// Commits the draft of a session.
    ///
    /// The session lock is released while the store call is awaited, so concurrent
    /// requests observe `Committing` and are refused rather than queued. Dropping the
    /// future before the store answers returns the session to `Editing`. The listener
    /// runs after the lock is released and may call back into the service.
    pub async fn commit(&self, report_id: &ReportId) -> Result<SessionView, EstimationServiceError> {
        let pending = self.with_session(report_id, |session| Ok(session.begin_commit()?))?;

        let mut in_flight = InFlightCommit {
            sessions: &self.sessions,
            report_id,
            settled: false,
        };
        let outcome = self
            .store
            .update_measurement(&pending.report_id, pending.update)
            .await;
        in_flight.settled = true;

        let (settled, view) = self.with_session(report_id, |session| {
            Ok((session.settle_commit(outcome), session.view()))
        })?;

        match settled {
            Ok(area) => {
                self.listener.measurement_updated(report_id, area);
                Ok(view)
            }
            Err(error) => Err(EstimationServiceError::Commit {
                error,
                view: Box::new(view),
            }),
        }
    }

    /// Closes the cost detail view; refused while a commit is in flight.
    pub fn close(&self, report_id: &ReportId) -> Result<(), EstimationServiceError> {
        let mut sessions = self.sessions();
        let state = sessions.get(report_id).map(MeasurementSession::state);
        match state {
            None => Err(EstimationServiceError::SessionNotFound(report_id.clone())),
            Some(SessionState::Committing) => Err(SessionError::CommitInFlight.into()),
            Some(_) => {
                sessions.remove(report_id);
                Ok(())
            }
        }
    }

    fn with_session<T>(
        &self,
        report_id: &ReportId,
        action: impl FnOnce(&mut MeasurementSession) -> Result<T, EstimationServiceError>,
    ) -> Result<T, EstimationServiceError> {
        let mut sessions = self.sessions();
        let session = sessions
            .get_mut(report_id)
            .ok_or_else(|| EstimationServiceError::SessionNotFound(report_id.clone()))?;
        action(session)
    }

    fn sessions(&self) -> MutexGuard<'_, Sessions> {
        lock_sessions(&self.sessions)
    }
}

// Each session transition completes before the guard drops, so poisoned data is intact.
fn lock_sessions(sessions: &Mutex<Sessions>) -> MutexGuard<'_, Sessions> {
    sessions.lock().unwrap_or_else(PoisonError::into_inner)
}

// Abandons the session's commit if the `commit` future is dropped mid-await.
struct InFlightCommit<'a> {
    sessions: &'a Mutex<Sessions>,
    report_id: &'a ReportId,
    settled: bool,
}

impl Drop for InFlightCommit<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Some(session) = lock_sessions(self.sessions).get_mut(self.report_id) {
            session.abandon_commit();
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EstimationServiceError {
    #[error("no open cost detail for report {0}")]
    SessionNotFound(ReportId),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("{error}")]
    Commit {
        error: SessionError,
        view: Box<SessionView>,
    },
}
