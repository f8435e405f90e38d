//! End-to-end controller scenarios against a scripted service.
//!
//! These tests drive `SessionController` through whole submissions to verify
//! the session state machine, history side effects, and the separation
//! between a view's working copy and the shared history.

use std::sync::Arc;

use coach::core::error::{SubmitError, TransportError, ValidationError};
use coach::core::request::{FeedbackRequest, FocusArea, Length, StandardOptions, Subject, Tone};
use coach::core::session::Phase;
use coach::core::wire::ServiceReply;
use coach::io::history_store::{ChangeOrigin, HistoryStore};
use coach::test_support::{ScriptedService, TempContext, ok_reply, request_with_tone};
use coach::{Completion, SessionController};

fn scenario_request() -> FeedbackRequest {
    FeedbackRequest::standard(
        "good job",
        StandardOptions {
            subject: Subject::Math,
            tone: Tone::Warm,
            length: Length::Short,
            ..StandardOptions::default()
        },
    )
}

fn controller_with(
    outcomes: Vec<Result<ServiceReply, TransportError>>,
) -> (
    SessionController<ScriptedService>,
    Arc<ScriptedService>,
    Arc<HistoryStore>,
) {
    let service = Arc::new(ScriptedService::with_outcomes(outcomes));
    let store = Arc::new(HistoryStore::in_memory());
    let controller = SessionController::new(Arc::clone(&service), Arc::clone(&store));
    (controller, service, store)
}

/// Service success: the artifact is on screen and at the front of history.
#[tokio::test]
async fn successful_submission_shows_and_saves_artifact() {
    let (mut controller, service, store) = controller_with(vec![Ok(ok_reply(
        "Great effort in math this term!",
        Some(5),
        Some("warm"),
    ))]);

    let completion = controller.submit(&scenario_request()).await;

    assert!(matches!(completion, Completion::Succeeded(_)));
    assert_eq!(controller.phase(), Phase::Succeeded);
    let artifact = controller.artifact().expect("artifact");
    assert_eq!(artifact.text(), "Great effort in math this term!");
    assert_eq!(artifact.word_count(), 5);
    assert_eq!(artifact.tone(), Tone::Warm);
    assert_eq!(
        store.list()[0].artifact.text,
        "Great effort in math this term!"
    );

    let body = &service.bodies()[0];
    assert_eq!(body.original_feedback, "good job");
    assert_eq!(body.subject, Some(Subject::Math));
    assert_eq!(body.focus_areas, None);
}

#[tokio::test]
async fn http_500_fails_with_transport_error_and_keeps_history() {
    let (mut controller, _service, store) =
        controller_with(vec![Err(TransportError::Status { status: 500 })]);

    let completion = controller.submit(&scenario_request()).await;

    let Completion::Failed(err) = completion else {
        panic!("expected failure, got {completion:?}");
    };
    assert!(matches!(
        err,
        SubmitError::Transport(TransportError::Status { status: 500 })
    ));
    assert!(err.to_string().contains("HTTP error"));
    assert_eq!(controller.phase(), Phase::Failed);
    assert!(store.is_empty());
}

#[tokio::test]
async fn service_reported_failure_surfaces_message_verbatim() {
    let (mut controller, _service, store) =
        controller_with(vec![Ok(ServiceReply::failure("rate limited"))]);

    controller.submit(&scenario_request()).await;

    assert_eq!(
        controller.error().map(ToString::to_string),
        Some("rate limited".to_string())
    );
    assert!(store.is_empty());
}

#[tokio::test]
async fn service_failure_without_message_uses_fallback() {
    let reply = ServiceReply {
        success: false,
        data: None,
        error: None,
        generated_at: None,
    };
    let (mut controller, _service, _store) = controller_with(vec![Ok(reply)]);

    controller.submit(&scenario_request()).await;

    assert_eq!(
        controller.error(),
        Some(&SubmitError::Service("Failed to improve feedback".to_string()))
    );
}

#[tokio::test]
async fn empty_text_never_calls_service() {
    let (mut controller, service, _store) = controller_with(Vec::new());

    let completion = controller.submit(&request_with_tone("", Tone::Warm)).await;

    assert_eq!(
        completion,
        Completion::Failed(SubmitError::Validation(ValidationError::EmptyFeedback))
    );
    assert_eq!(controller.phase(), Phase::Failed);
    assert_eq!(service.calls(), 0);
}

/// Editing changes the working copy only; history and word count stay put.
#[tokio::test]
async fn editing_never_touches_history_or_word_count() {
    let (mut controller, _service, store) =
        controller_with(vec![Ok(ok_reply("Solid progress this term.", None, None))]);
    controller.submit(&request_with_tone("ok", Tone::Direct)).await;

    let edited = "Solid progress this term, especially with fractions.";
    assert!(controller.edit_text(edited));

    let artifact = controller.artifact().expect("artifact");
    assert_eq!(artifact.word_count(), 4);
    assert!(artifact.is_edited());
    assert_eq!(store.list()[0].artifact.text, "Solid progress this term.");
}

#[tokio::test]
async fn restore_loads_exact_text_without_new_entry() {
    let (mut controller, _service, store) = controller_with(vec![
        Ok(ok_reply("First version.", None, None)),
        Ok(ok_reply("Second version.", None, None)),
    ]);
    controller.submit(&request_with_tone("one", Tone::Warm)).await;
    controller.submit(&request_with_tone("two", Tone::Warm)).await;
    let older = store.list()[1].clone();
    let phase_before = controller.phase();

    controller.restore(older.id()).expect("restore");

    assert_eq!(
        controller.artifact().map(|a| a.text()),
        Some("First version.")
    );
    assert_eq!(store.len(), 2);
    assert_eq!(controller.phase(), phase_before);
}

#[tokio::test]
async fn delete_and_clear_update_snapshot() {
    let (mut controller, _service, store) = controller_with(vec![
        Ok(ok_reply("Keep.", None, None)),
        Ok(ok_reply("Drop.", None, None)),
    ]);
    controller.submit(&request_with_tone("one", Tone::Warm)).await;
    controller.submit(&request_with_tone("two", Tone::Warm)).await;
    let drop_id = store.list()[0].id().to_string();

    assert!(controller.delete_from_history(&drop_id));
    assert!(!controller.delete_from_history(&drop_id));
    assert_eq!(controller.history().len(), 1);
    assert_eq!(controller.artifact().map(|a| a.text()), Some("Drop."));

    controller.clear_history();
    assert!(controller.history().is_empty());
    assert!(store.is_empty());
}

/// Custom prompts never carry standard options, and the reply tone is kept.
#[tokio::test]
async fn custom_prompt_submission() {
    let (mut controller, service, _store) = controller_with(vec![Ok(ok_reply(
        "Nice work.",
        Some(2),
        Some("encouraging"),
    ))]);

    controller
        .submit(&FeedbackRequest::custom("nice", "Make it two words."))
        .await;

    let body = &service.bodies()[0];
    assert_eq!(body.custom_prompt.as_deref(), Some("Make it two words."));
    assert_eq!(body.tone, None);
    assert_eq!(body.focus_areas, None);
    assert_eq!(
        controller.artifact().map(|a| a.tone()),
        Some(Tone::Encouraging)
    );
}

#[tokio::test]
async fn focus_areas_are_sent_in_stable_order() {
    let (mut controller, service, _store) =
        controller_with(vec![Ok(ok_reply("Done.", None, None))]);
    let request = FeedbackRequest::standard(
        "fine",
        StandardOptions {
            focus_areas: [FocusArea::Effort, FocusArea::Strengths, FocusArea::Effort]
                .into_iter()
                .collect(),
            ..StandardOptions::default()
        },
    );

    controller.submit(&request).await;

    assert_eq!(
        service.bodies()[0].focus_areas,
        Some(vec![FocusArea::Strengths, FocusArea::Effort])
    );
}

/// Two views share persisted history and reconcile on notification.
#[tokio::test]
async fn second_view_reconciles_on_change_notification() {
    let context = TempContext::new().expect("context");
    let store = Arc::new(context.store());
    let service = Arc::new(ScriptedService::with_outcomes(vec![Ok(ok_reply(
        "Shared result.",
        None,
        None,
    ))]));
    let mut first = SessionController::new(Arc::clone(&service), Arc::clone(&store));
    let mut second = SessionController::new(Arc::clone(&service), Arc::clone(&store));
    let mut rx = store.subscribe();

    first.submit(&request_with_tone("x", Tone::Warm)).await;
    assert!(second.history().is_empty());

    let event = rx.recv().await.expect("notification");
    assert_eq!(event.origin, ChangeOrigin::Local);
    second.reconcile();
    assert_eq!(second.history()[0].artifact.text, "Shared result.");
    assert!(second.artifact().is_none());

    // A fresh process over the same directory sees the saved entry.
    let reopened = context.store();
    assert_eq!(reopened.list()[0].artifact.text, "Shared result.");
}

/// A result held in flight across `regenerate` is discarded.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn late_result_after_regenerate_is_discarded() {
    let service = Arc::new(ScriptedService::gated(vec![Ok(ok_reply(
        "Too late.",
        None,
        None,
    ))]));
    let store = Arc::new(HistoryStore::in_memory());
    let mut controller = SessionController::new(Arc::clone(&service), Arc::clone(&store));

    let submission = controller
        .begin_submit(&request_with_tone("x", Tone::Warm))
        .expect("submission");
    let call = {
        let service = controller.service_handle();
        let body = submission.body().clone();
        tokio::spawn(async move {
            use coach::io::service::ImproveService;
            service.improve(&body).await
        })
    };

    controller.regenerate();
    service.release();
    let outcome = call.await.expect("join");

    assert_eq!(
        controller.complete(submission, outcome),
        Completion::Discarded
    );
    assert_eq!(controller.phase(), Phase::Idle);
    assert!(controller.artifact().is_none());
    assert!(store.is_empty());
}
