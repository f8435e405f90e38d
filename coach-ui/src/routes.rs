//! HTTP route handlers for the view API.

use std::sync::{Arc, Mutex, Weak};

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{delete, get, post, put};
use coach::controller::copy_text;
use coach::core::artifact::HistoryEntry;
use coach::core::request::{
    FeedbackRequest, FocusArea, GradeLevel, Length, StandardOptions, Subject, Tone,
};
use coach::core::session::Phase;
use coach::io::service::ImproveService;
use coach::{Completion, SessionController, Submission, ViewSnapshot};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::state::{AppState, ViewHandle, lock_view};

/// Build the API router.
pub fn api_router<S: ImproveService + 'static>() -> Router<AppState<S>> {
    Router::new()
        .route("/health", get(health))
        .route("/views", post(create_view::<S>))
        .route("/views/{id}", get(get_view::<S>).delete(delete_view::<S>))
        .route("/views/{id}/submit", post(submit::<S>))
        .route("/views/{id}/text", put(edit_text::<S>))
        .route("/views/{id}/copy", post(copy::<S>))
        .route("/views/{id}/regenerate", post(regenerate::<S>))
        .route("/views/{id}/restore/{entry}", post(restore::<S>))
        .route("/history", get(list_history::<S>).delete(clear_history::<S>))
        .route("/history/{entry}", delete(delete_history_entry::<S>))
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
pub struct CreatedView {
    pub id: u64,
    #[serde(flatten)]
    pub snapshot: ViewSnapshot,
}

/// POST /api/views - open a new, empty view.
async fn create_view<S: ImproveService + 'static>(
    State(state): State<AppState<S>>,
) -> (StatusCode, Json<CreatedView>) {
    let (id, snapshot) = state.create_view();
    info!(view = id, "view opened");
    (StatusCode::CREATED, Json(CreatedView { id, snapshot }))
}

/// GET /api/views/:id - current snapshot.
async fn get_view<S: ImproveService + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<u64>,
) -> Result<Json<ViewSnapshot>, StatusCode> {
    let view = find_view(&state, id)?;
    let snapshot = lock_view(&view).snapshot();
    Ok(Json(snapshot))
}

/// DELETE /api/views/:id - close a view.
async fn delete_view<S: ImproveService + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<u64>,
) -> StatusCode {
    if state.drop_view(id) {
        info!(view = id, "view closed");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Submission form, in the service's own field spelling.
///
/// A non-empty `custom_prompt` replaces every standard option.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitPayload {
    pub original_feedback: String,
    #[serde(default)]
    pub subject: Option<Subject>,
    #[serde(default)]
    pub grade_level: Option<GradeLevel>,
    #[serde(default)]
    pub tone: Option<Tone>,
    #[serde(default)]
    pub length: Option<Length>,
    #[serde(default)]
    pub custom_prompt: Option<String>,
    #[serde(default)]
    pub focus_areas: Option<Vec<FocusArea>>,
}

impl SubmitPayload {
    pub fn into_request(self) -> FeedbackRequest {
        let defaults = StandardOptions::default();
        FeedbackRequest::from_input(
            self.original_feedback,
            self.custom_prompt,
            StandardOptions {
                subject: self.subject.unwrap_or(defaults.subject),
                grade_level: self.grade_level.unwrap_or(defaults.grade_level),
                tone: self.tone.unwrap_or(defaults.tone),
                length: self.length.unwrap_or(defaults.length),
                focus_areas: self.focus_areas.unwrap_or_default().into_iter().collect(),
            },
        )
    }
}

/// POST /api/views/:id/submit - start a submission.
///
/// Answers 202 once the request is in flight; the result is applied in the
/// background and announced with a `view_updated` event. A submission while
/// one is in flight is ignored (409); a locally invalid request answers 422.
async fn submit<S: ImproveService + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<u64>,
    Json(payload): Json<SubmitPayload>,
) -> Result<(StatusCode, Json<ViewSnapshot>), StatusCode> {
    let view = find_view(&state, id)?;
    let request = payload.into_request();
    let (submission, snapshot) = {
        let mut controller = lock_view(&view);
        let submission = controller.begin_submit(&request);
        (submission, controller.snapshot())
    };

    let Some(submission) = submission else {
        let status = if snapshot.phase == Phase::Submitting {
            debug!(view = id, "submission already in flight");
            StatusCode::CONFLICT
        } else {
            state.notify_view(id);
            StatusCode::UNPROCESSABLE_ENTITY
        };
        return Ok((status, Json(snapshot)));
    };

    state.notify_view(id);
    tokio::spawn(run_submission(state.clone(), id, Arc::downgrade(&view), submission));
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

/// Call the service and apply the result if the view still exists.
async fn run_submission<S: ImproveService + 'static>(
    state: AppState<S>,
    id: u64,
    view: Weak<Mutex<SessionController<S>>>,
    submission: Submission,
) {
    let outcome = state.service.improve(submission.body()).await;
    let Some(view) = view.upgrade() else {
        debug!(view = id, "view closed before result arrived; discarding");
        return;
    };
    let completion = lock_view(&view).complete(submission, outcome);
    match &completion {
        Completion::Succeeded(artifact) => {
            info!(view = id, artifact = %artifact.id, "submission succeeded");
        }
        Completion::Failed(err) => warn!(view = id, error = %err, "submission failed"),
        Completion::Discarded | Completion::Rejected => {
            debug!(view = id, ?completion, "submission result not applied");
        }
    }
    state.notify_view(id);
}

#[derive(Debug, Deserialize)]
pub struct EditPayload {
    pub text: String,
}

/// PUT /api/views/:id/text - replace the working copy.
async fn edit_text<S: ImproveService + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<u64>,
    Json(payload): Json<EditPayload>,
) -> Result<Json<ViewSnapshot>, StatusCode> {
    let view = find_view(&state, id)?;
    let snapshot = {
        let mut controller = lock_view(&view);
        if !controller.edit_text(payload.text) {
            return Err(StatusCode::CONFLICT);
        }
        controller.snapshot()
    };
    state.notify_view(id);
    Ok(Json(snapshot))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CopyResult {
    pub copied: bool,
}

/// POST /api/views/:id/copy - copy the working text to the clipboard.
///
/// Best-effort: an unavailable clipboard answers `{"copied": false}`.
async fn copy<S: ImproveService + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<u64>,
) -> Result<Json<CopyResult>, StatusCode> {
    let view = find_view(&state, id)?;
    // The view lock is released before the clipboard command runs.
    let Some(text) = lock_view(&view).clipboard_text() else {
        return Ok(Json(CopyResult { copied: false }));
    };
    let clipboard = Arc::clone(&state.clipboard);
    let copied = tokio::task::spawn_blocking(move || copy_text(clipboard.as_ref(), &text))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(CopyResult { copied }))
}

/// POST /api/views/:id/regenerate - discard the result and return to empty.
async fn regenerate<S: ImproveService + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<u64>,
) -> Result<Json<ViewSnapshot>, StatusCode> {
    let view = find_view(&state, id)?;
    let snapshot = {
        let mut controller = lock_view(&view);
        controller.regenerate();
        controller.snapshot()
    };
    state.notify_view(id);
    Ok(Json(snapshot))
}

/// POST /api/views/:id/restore/:entry - load a history entry as the working copy.
async fn restore<S: ImproveService + 'static>(
    State(state): State<AppState<S>>,
    Path((id, entry)): Path<(u64, String)>,
) -> Result<Json<ViewSnapshot>, StatusCode> {
    let view = find_view(&state, id)?;
    let snapshot = {
        let mut controller = lock_view(&view);
        controller
            .restore(&entry)
            .map_err(|_| StatusCode::NOT_FOUND)?;
        controller.snapshot()
    };
    state.notify_view(id);
    Ok(Json(snapshot))
}

/// GET /api/history - shared history, newest first.
async fn list_history<S: ImproveService + 'static>(
    State(state): State<AppState<S>>,
) -> Json<Vec<HistoryEntry>> {
    Json(state.store.list())
}

/// DELETE /api/history/:entry - remove one entry.
async fn delete_history_entry<S: ImproveService + 'static>(
    State(state): State<AppState<S>>,
    Path(entry): Path<String>,
) -> StatusCode {
    if !state.store.remove(&entry) {
        debug!(entry = %entry, "history entry already gone");
    }
    StatusCode::NO_CONTENT
}

/// DELETE /api/history - remove every entry.
async fn clear_history<S: ImproveService + 'static>(
    State(state): State<AppState<S>>,
) -> StatusCode {
    state.store.clear();
    StatusCode::NO_CONTENT
}

fn find_view<S: ImproveService>(state: &AppState<S>, id: u64) -> Result<ViewHandle<S>, StatusCode> {
    state.view(id).ok_or(StatusCode::NOT_FOUND)
}
