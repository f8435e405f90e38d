//! Server-Sent Events stream and history change forwarding.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use coach::io::service::ImproveService;
use futures::stream::Stream;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::state::{AppState, UiEvent, lock_view};

#[derive(Debug, Serialize, PartialEq, Eq)]
struct SsePayload {
    #[serde(rename = "type")]
    event_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    view: Option<u64>,
}

impl From<&UiEvent> for SsePayload {
    fn from(event: &UiEvent) -> Self {
        match event {
            UiEvent::HistoryChanged => SsePayload {
                event_type: "history_changed",
                view: None,
            },
            UiEvent::ViewUpdated { view } => SsePayload {
                event_type: "view_updated",
                view: Some(*view),
            },
        }
    }
}

/// SSE endpoint handler.
pub async fn events_handler<S: ImproveService + 'static>(
    State(state): State<AppState<S>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.event_tx.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("connected").data("{}"));

        loop {
            match rx.recv().await {
                Ok(ui_event) => {
                    let payload = SsePayload::from(&ui_event);
                    if let Ok(json) = serde_json::to_string(&payload) {
                        yield Ok(Event::default().event("change").data(json));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "SSE client lagged, some events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

/// Reconcile every view whenever the shared history changes.
pub fn spawn_history_forwarder<S: ImproveService + 'static>(state: AppState<S>) -> JoinHandle<()> {
    let mut rx = state.store.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(change) => debug!(origin = ?change.origin, "history changed"),
                // Notifications carry no data, so a lagged receiver just re-reads.
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "history notifications coalesced");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
            reconcile_all(&state);
        }
    })
}

fn reconcile_all<S: ImproveService>(state: &AppState<S>) {
    for (_, view) in state.views() {
        lock_view(&view).reconcile();
    }
    let _ = state.event_tx.send(UiEvent::HistoryChanged);
}
