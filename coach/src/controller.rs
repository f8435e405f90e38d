//! Per-view orchestration of a request session, its working copy, and history.
//!
//! Submission is split into [`SessionController::begin_submit`] and
//! [`SessionController::complete`] so a host can release the controller while
//! the service call is in flight. Each [`Submission`] carries the generation it
//! was issued under; [`SessionController::regenerate`] bumps the generation,
//! so a result arriving after the view was discarded is dropped instead of
//! resurrecting the old request.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::artifact::{Artifact, ArtifactStamp, HistoryEntry};
use crate::core::editable::EditableArtifact;
use crate::core::error::{ErrorKind, SubmitError, TransportError};
use crate::core::request::{FeedbackRequest, Tone};
use crate::core::session::{Phase, RequestSession, SessionState};
use crate::core::wire::{ImproveBody, ServiceReply};
use crate::io::clipboard::Clipboard;
use crate::io::clock::new_stamp;
use crate::io::history_store::HistoryStore;
use crate::io::service::ImproveService;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControllerError {
    #[error("history entry '{0}' not found")]
    NotFound(String),
}

/// Ticket for one in-flight improvement call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    generation: u64,
    body: ImproveBody,
}

impl Submission {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wire body to send to the service.
    pub fn body(&self) -> &ImproveBody {
        &self.body
    }
}

/// What applying a service outcome did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// A new artifact is on screen and at the front of history.
    Succeeded(Artifact),
    /// The error is on screen; any earlier artifact is untouched.
    Failed(SubmitError),
    /// The view regenerated since the ticket was issued.
    Discarded,
    /// Nothing was in flight (or a second submission was ignored).
    Rejected,
}

/// Serializable view model of one controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewSnapshot {
    pub phase: Phase,
    pub error: Option<ErrorView>,
    pub artifact: Option<ArtifactView>,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorView {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactView {
    pub id: String,
    pub text: String,
    pub word_count: u32,
    pub tone: Tone,
    pub created_at: String,
    pub edited: bool,
}

/// Orchestrates one view: session, working copy, error, and history snapshot.
pub struct SessionController<S> {
    service: Arc<S>,
    store: Arc<HistoryStore>,
    session: RequestSession,
    artifact: Option<EditableArtifact>,
    error: Option<SubmitError>,
    history: Vec<HistoryEntry>,
    generation: u64,
}

impl<S: ImproveService> SessionController<S> {
    pub fn new(service: Arc<S>, store: Arc<HistoryStore>) -> Self {
        let history = store.list();
        Self {
            service,
            store,
            session: RequestSession::new(),
            artifact: None,
            error: None,
            history,
            generation: 0,
        }
    }

    /// Shared handle to the service, for hosts that call it outside the controller.
    pub fn service_handle(&self) -> Arc<S> {
        Arc::clone(&self.service)
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    pub fn session_state(&self) -> &SessionState {
        self.session.state()
    }

    pub fn is_submitting(&self) -> bool {
        self.session.is_submitting()
    }

    pub fn error(&self) -> Option<&SubmitError> {
        self.error.as_ref()
    }

    pub fn artifact(&self) -> Option<&EditableArtifact> {
        self.artifact.as_ref()
    }

    /// History as of the last [`reconcile`](Self::reconcile).
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Start a submission.
    ///
    /// Returns `None` while another submission is in flight (the call is
    /// ignored) or when the request fails local validation (the error is
    /// surfaced and nothing is sent).
    pub fn begin_submit(&mut self, request: &FeedbackRequest) -> Option<Submission> {
        if self.session.is_submitting() {
            debug!(
                generation = self.generation,
                "submission already in flight; ignoring"
            );
            return None;
        }
        self.error = None;
        match self.session.begin(request) {
            Ok(body) => {
                debug!(generation = self.generation, "submission started");
                Some(Submission {
                    generation: self.generation,
                    body,
                })
            }
            Err(err) => {
                debug!(error = %err, "submission rejected locally");
                self.error = Some(err);
                None
            }
        }
    }

    /// Apply the service outcome for `submission`.
    pub fn complete(
        &mut self,
        submission: Submission,
        outcome: Result<ServiceReply, TransportError>,
    ) -> Completion {
        self.complete_with_stamp(submission, outcome, new_stamp())
    }

    fn complete_with_stamp(
        &mut self,
        submission: Submission,
        outcome: Result<ServiceReply, TransportError>,
        stamp: ArtifactStamp,
    ) -> Completion {
        if submission.generation != self.generation {
            debug!(
                ticket = submission.generation,
                current = self.generation,
                "discarding result for a regenerated view"
            );
            return Completion::Discarded;
        }
        if !self.session.resolve(outcome, stamp) {
            debug!("no submission in flight; outcome ignored");
            return Completion::Rejected;
        }
        match self.session.state().clone() {
            SessionState::Succeeded(artifact) => {
                self.artifact = Some(EditableArtifact::new(&artifact));
                self.store.append(artifact.clone());
                self.error = None;
                self.reconcile();
                info!(id = %artifact.id, word_count = artifact.word_count, "feedback improved");
                Completion::Succeeded(artifact)
            }
            SessionState::Failed(err) => {
                warn!(kind = ?err.kind(), error = %err, "feedback improvement failed");
                self.error = Some(err.clone());
                Completion::Failed(err)
            }
            SessionState::Idle | SessionState::Submitting => Completion::Rejected,
        }
    }

    /// Begin, call the service, and complete in one step.
    #[instrument(skip_all)]
    pub async fn submit(&mut self, request: &FeedbackRequest) -> Completion {
        let Some(submission) = self.begin_submit(request) else {
            return match &self.error {
                Some(err) if !self.session.is_submitting() => Completion::Failed(err.clone()),
                _ => Completion::Rejected,
            };
        };
        let service = Arc::clone(&self.service);
        let outcome = service.improve(submission.body()).await;
        self.complete(submission, outcome)
    }

    /// Load a history entry into a fresh working copy.
    ///
    /// The request session and the history itself are left alone.
    pub fn restore(&mut self, id: &str) -> Result<(), ControllerError> {
        let artifact = self
            .store
            .restore(id)
            .ok_or_else(|| ControllerError::NotFound(id.to_string()))?;
        debug!(id, "restored artifact from history");
        self.artifact = Some(EditableArtifact::from(artifact));
        Ok(())
    }

    /// Remove an entry from the shared history. The working copy is unaffected.
    pub fn delete_from_history(&mut self, id: &str) -> bool {
        let removed = self.store.remove(id);
        self.reconcile();
        removed
    }

    pub fn clear_history(&mut self) {
        self.store.clear();
        self.reconcile();
    }

    /// Replace the working text. Returns `false` when nothing is on screen.
    pub fn edit_text(&mut self, text: impl Into<String>) -> bool {
        match self.artifact.as_mut() {
            Some(artifact) => {
                artifact.set_text(text);
                true
            }
            None => false,
        }
    }

    /// Text a copy would place on the clipboard, if there is a working copy.
    pub fn clipboard_text(&self) -> Option<String> {
        self.artifact
            .as_ref()
            .map(EditableArtifact::to_clipboard_text)
    }

    /// Copy the working text. Best-effort: failures are logged, never raised.
    pub fn copy_to_clipboard(&self, clipboard: &dyn Clipboard) -> bool {
        let Some(text) = self.clipboard_text() else {
            debug!("nothing to copy");
            return false;
        };
        copy_text(clipboard, &text)
    }

    /// Discard the current result and return the view to its empty state.
    ///
    /// An in-flight submission keeps running but its result is discarded.
    pub fn regenerate(&mut self) {
        self.generation += 1;
        self.session.reset();
        self.artifact = None;
        self.error = None;
        debug!(generation = self.generation, "view regenerated");
    }

    /// Re-read the shared history after a change notification.
    pub fn reconcile(&mut self) {
        self.history = self.store.list();
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            phase: self.session.phase(),
            error: self.error.as_ref().map(|err| ErrorView {
                kind: err.kind(),
                message: err.to_string(),
            }),
            artifact: self.artifact.as_ref().map(|artifact| ArtifactView {
                id: artifact.base_artifact_id().to_string(),
                text: artifact.text().to_string(),
                word_count: artifact.word_count(),
                tone: artifact.tone(),
                created_at: artifact.created_at().to_string(),
                edited: artifact.is_edited(),
            }),
            history: self.history.clone(),
        }
    }
}

/// Write `text` to `clipboard`, logging a failure instead of raising it.
///
/// Separate from the controller so callers can run the command without
/// holding a lock on the view.
pub fn copy_text(clipboard: &dyn Clipboard, text: &str) -> bool {
    match clipboard.write_text(text) {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "failed to copy to clipboard");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ValidationError;
    use crate::core::request::StandardOptions;
    use crate::core::wire::ImprovedComment;
    use crate::test_support::{FailingClipboard, RecordingClipboard, ScriptedService};

    fn controller(service: ScriptedService) -> SessionController<ScriptedService> {
        SessionController::new(Arc::new(service), Arc::new(HistoryStore::in_memory()))
    }

    fn request(text: &str) -> FeedbackRequest {
        FeedbackRequest::standard(
            text,
            StandardOptions {
                tone: Tone::Warm,
                ..StandardOptions::default()
            },
        )
    }

    fn reply(text: &str) -> ServiceReply {
        ServiceReply::ok(ImprovedComment {
            comment: text.to_string(),
            word_count: None,
            tone: None,
        })
    }

    fn stamp(id: &str) -> ArtifactStamp {
        ArtifactStamp {
            id: id.to_string(),
            created_at: "2026-10-18 09:30:00".to_string(),
        }
    }

    #[test]
    fn second_begin_while_submitting_is_ignored() {
        let mut controller = controller(ScriptedService::new());
        assert!(controller.begin_submit(&request("one")).is_some());
        assert!(controller.begin_submit(&request("two")).is_none());
        assert_eq!(controller.phase(), Phase::Submitting);
        assert!(controller.error().is_none());
    }

    #[test]
    fn validation_failure_surfaces_error() {
        let mut controller = controller(ScriptedService::new());
        assert!(controller.begin_submit(&request("   ")).is_none());
        assert_eq!(
            controller.error(),
            Some(&SubmitError::Validation(ValidationError::EmptyFeedback))
        );
        assert_eq!(controller.phase(), Phase::Failed);
    }

    #[test]
    fn success_sets_artifact_appends_history_and_clears_error() {
        let mut controller = controller(ScriptedService::new());
        controller.begin_submit(&request(""));
        assert!(controller.error().is_some());

        let ticket = controller.begin_submit(&request("good job")).expect("ticket");
        let completion =
            controller.complete_with_stamp(ticket, Ok(reply("Well done.")), stamp("a1"));

        assert!(matches!(completion, Completion::Succeeded(ref a) if a.id == "a1"));
        assert!(controller.error().is_none());
        assert_eq!(controller.artifact().map(|a| a.text()), Some("Well done."));
        assert_eq!(controller.history()[0].id(), "a1");
        assert_eq!(controller.store().len(), 1);
    }

    /// A failure keeps the artifact from the previous success on screen.
    #[test]
    fn failure_keeps_previous_artifact() {
        let mut controller = controller(ScriptedService::new());
        let ticket = controller.begin_submit(&request("good job")).expect("ticket");
        controller.complete_with_stamp(ticket, Ok(reply("Well done.")), stamp("a1"));

        let ticket = controller.begin_submit(&request("again")).expect("ticket");
        let completion = controller.complete_with_stamp(
            ticket,
            Err(TransportError::Status { status: 503 }),
            stamp("a2"),
        );

        assert!(matches!(completion, Completion::Failed(_)));
        assert_eq!(controller.artifact().map(|a| a.text()), Some("Well done."));
        assert_eq!(controller.store().len(), 1);
    }

    #[test]
    fn stale_ticket_is_discarded_after_regenerate() {
        let mut controller = controller(ScriptedService::new());
        let stale = controller.begin_submit(&request("first")).expect("ticket");
        controller.regenerate();
        let fresh = controller.begin_submit(&request("second")).expect("ticket");

        assert_eq!(
            controller.complete_with_stamp(stale, Ok(reply("Old.")), stamp("old")),
            Completion::Discarded
        );
        assert_eq!(controller.phase(), Phase::Submitting);
        assert!(controller.store().is_empty());

        controller.complete_with_stamp(fresh, Ok(reply("New.")), stamp("new"));
        assert_eq!(controller.artifact().map(|a| a.text()), Some("New."));
    }

    #[test]
    fn regenerate_returns_to_empty_state() {
        let mut controller = controller(ScriptedService::new());
        let ticket = controller.begin_submit(&request("good job")).expect("ticket");
        controller.complete_with_stamp(ticket, Ok(reply("Well done.")), stamp("a1"));

        controller.regenerate();
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.phase, Phase::Idle);
        assert!(snapshot.artifact.is_none());
        assert!(snapshot.error.is_none());
        assert_eq!(snapshot.history.len(), 1);
    }

    #[test]
    fn restore_unknown_id_is_not_found() {
        let mut controller = controller(ScriptedService::new());
        assert_eq!(
            controller.restore("missing"),
            Err(ControllerError::NotFound("missing".to_string()))
        );
    }

    #[test]
    fn edit_without_artifact_is_refused() {
        let mut controller = controller(ScriptedService::new());
        assert!(!controller.edit_text("anything"));
    }

    #[test]
    fn copy_uses_working_text_and_tolerates_failure() {
        let mut controller = controller(ScriptedService::new());
        let clipboard = RecordingClipboard::default();
        assert!(!controller.copy_to_clipboard(&clipboard));

        let ticket = controller.begin_submit(&request("good job")).expect("ticket");
        controller.complete_with_stamp(ticket, Ok(reply("Well done.")), stamp("a1"));
        controller.edit_text("Well done, really.");

        assert_eq!(
            controller.clipboard_text().as_deref(),
            Some("Well done, really.")
        );
        assert!(controller.copy_to_clipboard(&clipboard));
        assert_eq!(clipboard.copied(), vec!["Well done, really.".to_string()]);
        assert!(!controller.copy_to_clipboard(&FailingClipboard));
    }

    #[test]
    fn snapshot_reports_edit_state_and_error_kind() {
        let mut controller = controller(ScriptedService::new());
        let ticket = controller.begin_submit(&request("good job")).expect("ticket");
        controller.complete_with_stamp(ticket, Ok(reply("Well done.")), stamp("a1"));
        controller.edit_text("Changed.");

        let artifact = controller.snapshot().artifact.expect("artifact");
        assert!(artifact.edited);
        assert_eq!(artifact.word_count, 2);
        assert_eq!(artifact.tone, Tone::Warm);

        controller.begin_submit(&request(""));
        let error = controller.snapshot().error.expect("error");
        assert_eq!(error.kind, ErrorKind::Validation);
    }
}
