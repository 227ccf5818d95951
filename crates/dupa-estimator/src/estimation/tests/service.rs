use std::sync::{Arc, Mutex, OnceLock, Weak};

use super::common::*;
use crate::estimation::engine::CostEngine;
use crate::estimation::measurement::{InvalidInputPolicy, MeasurementError, SquareMeters};
use crate::estimation::service::{EstimationService, EstimationServiceError};
use crate::estimation::session::{SessionError, SessionState};
use crate::estimation::store::{MeasurementListener, ReportId};

#[test]
fn estimate_follows_input_policy() {
    let (service, _) = estimation_service(Arc::new(MemoryStore::default()));
    assert!(matches!(
        service.estimate("abc"),
        Err(MeasurementError::Unparseable(_))
    ));
    assert_close(
        service.estimate("70").expect("valid area").labour_subtotal,
        1802.29,
    );

    let (lenient, _) = estimation_service(Arc::new(MemoryStore::default()));
    let lenient = lenient.with_policy(InvalidInputPolicy::CoerceToZero);
    assert_eq!(
        lenient.estimate("abc").expect("coerced").grand_total,
        0.0
    );
}

#[test]
fn unknown_report_has_no_session() {
    let (service, _) = estimation_service(Arc::new(MemoryStore::default()));

    match service.view(&ReportId("missing".to_string())) {
        Err(EstimationServiceError::SessionNotFound(id)) => assert_eq!(id.0, "missing"),
        other => panic!("expected missing session, got {other:?}"),
    }
}

#[tokio::test]
async fn commit_through_service_notifies_listener() {
    let store = Arc::new(MemoryStore::default());
    let (service, listener) = estimation_service(store.clone());

    service
        .open(report_id(), "Pothole".to_string(), area(12.0))
        .expect("opens");
    service.begin_edit(&report_id()).expect("edit starts");
    let view = service
        .update_draft(&report_id(), "48")
        .expect("draft accepted");
    assert_eq!(view.state, SessionState::Editing);

    let view = service.commit(&report_id()).await.expect("commit succeeds");
    assert_eq!(view.state, SessionState::Viewing);
    assert_eq!(view.committed_area, area(48.0));
    assert_eq!(store.updates().len(), 1);
    assert_eq!(listener.events(), vec![(report_id(), area(48.0))]);
}

#[tokio::test]
async fn failed_commit_returns_editable_view() {
    let (service, listener) = estimation_service(Arc::new(RejectingStore));
    service
        .open(report_id(), "Pothole".to_string(), area(12.0))
        .expect("opens");
    service.begin_edit(&report_id()).expect("edit starts");
    service
        .update_draft(&report_id(), "100")
        .expect("draft accepted");

    match service.commit(&report_id()).await {
        Err(EstimationServiceError::Commit { error, view }) => {
            assert!(matches!(error, SessionError::CommitFailed(_)));
            assert_eq!(view.state, SessionState::Editing);
            assert_eq!(view.committed_area, area(12.0));
            assert_eq!(view.draft.as_deref(), Some("100"));
            assert!(view.last_error.is_some());
        }
        other => panic!("expected commit failure, got {other:?}"),
    }
    assert!(listener.events().is_empty());
}

#[tokio::test]
async fn session_is_locked_while_store_call_is_pending() {
    let store = Arc::new(GatedStore::default());
    let (service, _) = estimation_service(store.clone());
    let service = Arc::new(service);
    service
        .open(report_id(), "Spalling".to_string(), area(20.0))
        .expect("opens");
    service.begin_edit(&report_id()).expect("edit starts");
    service
        .update_draft(&report_id(), "30")
        .expect("draft accepted");

    let committing = service.clone();
    let handle = tokio::spawn(async move { committing.commit(&report_id()).await });
    store.entered.notified().await;

    let view = service.view(&report_id()).expect("session present");
    assert_eq!(view.state, SessionState::Committing);
    assert!(matches!(
        service.begin_edit(&report_id()),
        Err(EstimationServiceError::Session(SessionError::CommitInFlight))
    ));
    assert!(matches!(
        service.close(&report_id()),
        Err(EstimationServiceError::Session(SessionError::CommitInFlight))
    ));
    assert!(matches!(
        service.open(report_id(), "Spalling".to_string(), area(1.0)),
        Err(EstimationServiceError::Session(SessionError::CommitInFlight))
    ));

    store.release.notify_one();
    let view = handle
        .await
        .expect("commit task joins")
        .expect("commit succeeds");
    assert_eq!(view.committed_area, area(30.0));
}

#[test]
fn close_discards_session() {
    let (service, _) = estimation_service(Arc::new(MemoryStore::default()));
    service
        .open(report_id(), "Scaling".to_string(), area(5.0))
        .expect("opens");
    service.begin_edit(&report_id()).expect("edit starts");

    service.close(&report_id()).expect("closes");
    assert!(matches!(
        service.view(&report_id()),
        Err(EstimationServiceError::SessionNotFound(_))
    ));
    assert!(matches!(
        service.close(&report_id()),
        Err(EstimationServiceError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn dropped_commit_returns_session_to_editing() {
    let store = Arc::new(GatedStore::default());
    let (service, listener) = estimation_service(store.clone());
    let service = Arc::new(service);
    service
        .open(report_id(), "Spalling".to_string(), area(20.0))
        .expect("opens");
    service.begin_edit(&report_id()).expect("edit starts");
    service
        .update_draft(&report_id(), "30")
        .expect("draft accepted");

    let committing = service.clone();
    let handle = tokio::spawn(async move { committing.commit(&report_id()).await });
    store.entered.notified().await;
    handle.abort();
    assert!(handle.await.expect_err("commit aborted").is_cancelled());

    let view = service.view(&report_id()).expect("session present");
    assert_eq!(view.state, SessionState::Editing);
    assert_eq!(view.committed_area, area(20.0));
    assert_eq!(view.draft.as_deref(), Some("30"));
    assert!(view
        .last_error
        .as_deref()
        .expect("abandon reason")
        .contains("abandoned"));
    assert!(listener.events().is_empty());

    let view = service.cancel(&report_id()).expect("cancel allowed");
    assert_eq!(view.state, SessionState::Viewing);
    service.close(&report_id()).expect("closes");
}

/// Re-reads the session through the service whenever a measurement lands.
#[derive(Default)]
struct RefreshingListener {
    service: OnceLock<Weak<EstimationService<MemoryStore, RefreshingListener>>>,
    refreshed: Mutex<Vec<(SessionState, SquareMeters)>>,
}

impl MeasurementListener for RefreshingListener {
    fn measurement_updated(&self, report_id: &ReportId, _area: SquareMeters) {
        let Some(service) = self.service.get().and_then(Weak::upgrade) else {
            return;
        };
        let view = service.view(report_id).expect("session still open");
        self.refreshed
            .lock()
            .expect("listener mutex poisoned")
            .push((view.state, view.committed_area));
    }
}

#[tokio::test]
async fn listener_can_read_back_through_the_service() {
    let listener = Arc::new(RefreshingListener::default());
    let service = Arc::new(EstimationService::new(
        CostEngine::standard(),
        Arc::new(MemoryStore::default()),
        listener.clone(),
    ));
    listener
        .service
        .set(Arc::downgrade(&service))
        .expect("service registered once");

    service
        .open(report_id(), "Pothole".to_string(), area(12.0))
        .expect("opens");
    service.begin_edit(&report_id()).expect("edit starts");
    service
        .update_draft(&report_id(), "48")
        .expect("draft accepted");
    service.commit(&report_id()).await.expect("commit succeeds");

    let refreshed = listener
        .refreshed
        .lock()
        .expect("listener mutex poisoned")
        .clone();
    assert_eq!(refreshed, vec![(SessionState::Viewing, area(48.0))]);
}

struct PanickingListener;

impl MeasurementListener for PanickingListener {
    fn measurement_updated(&self, _report_id: &ReportId, _area: SquareMeters) {
        panic!("parent view refresh failed");
    }
}

#[tokio::test]
async fn panicking_listener_leaves_service_usable() {
    let service = Arc::new(EstimationService::new(
        CostEngine::standard(),
        Arc::new(MemoryStore::default()),
        Arc::new(PanickingListener),
    ));
    service
        .open(report_id(), "Pothole".to_string(), area(12.0))
        .expect("opens");
    service.begin_edit(&report_id()).expect("edit starts");
    service
        .update_draft(&report_id(), "16")
        .expect("draft accepted");

    let committing = service.clone();
    let joined = tokio::spawn(async move { committing.commit(&report_id()).await }).await;
    assert!(joined.expect_err("listener panics").is_panic());

    let view = service.view(&report_id()).expect("session still readable");
    assert_eq!(view.state, SessionState::Viewing);
    assert_eq!(view.committed_area, area(16.0));
    service.begin_edit(&report_id()).expect("edit starts again");
}
