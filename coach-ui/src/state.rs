//! Shared application state for the view host.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use coach::io::clipboard::Clipboard;
use coach::io::history_store::HistoryStore;
use coach::io::service::ImproveService;
use coach::{SessionController, ViewSnapshot};
use tokio::sync::broadcast;

/// Events broadcast to SSE clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// Shared history changed; every view re-reads it.
    HistoryChanged,
    /// One view's snapshot changed.
    ViewUpdated { view: u64 },
}

pub type ViewHandle<S> = Arc<Mutex<SessionController<S>>>;

/// Shared state accessible from all request handlers.
///
/// Each browser panel is an independent view with its own controller. All
/// views share one history store.
pub struct AppState<S> {
    pub store: Arc<HistoryStore>,
    pub service: Arc<S>,
    pub clipboard: Arc<dyn Clipboard>,
    views: Arc<Mutex<HashMap<u64, ViewHandle<S>>>>,
    next_view: Arc<AtomicU64>,
    /// Broadcast sender for UI events.
    pub event_tx: Arc<broadcast::Sender<UiEvent>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            service: Arc::clone(&self.service),
            clipboard: Arc::clone(&self.clipboard),
            views: Arc::clone(&self.views),
            next_view: Arc::clone(&self.next_view),
            event_tx: Arc::clone(&self.event_tx),
        }
    }
}

impl<S: ImproveService> AppState<S> {
    pub fn new(store: Arc<HistoryStore>, service: Arc<S>, clipboard: Arc<dyn Clipboard>) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            store,
            service,
            clipboard,
            views: Arc::default(),
            next_view: Arc::new(AtomicU64::new(1)),
            event_tx: Arc::new(event_tx),
        }
    }

    /// Open a new view and return its id with the initial snapshot.
    pub fn create_view(&self) -> (u64, ViewSnapshot) {
        let id = self.next_view.fetch_add(1, Ordering::Relaxed);
        let controller = SessionController::new(Arc::clone(&self.service), Arc::clone(&self.store));
        let snapshot = controller.snapshot();
        self.lock_views()
            .insert(id, Arc::new(Mutex::new(controller)));
        (id, snapshot)
    }

    pub fn view(&self, id: u64) -> Option<ViewHandle<S>> {
        self.lock_views().get(&id).cloned()
    }

    /// Close a view. In-flight results for it are discarded when they arrive.
    pub fn drop_view(&self, id: u64) -> bool {
        self.lock_views().remove(&id).is_some()
    }

    pub fn views(&self) -> Vec<(u64, ViewHandle<S>)> {
        let mut views: Vec<_> = self
            .lock_views()
            .iter()
            .map(|(id, view)| (*id, Arc::clone(view)))
            .collect();
        views.sort_by_key(|(id, _)| *id);
        views
    }

    pub fn notify_view(&self, view: u64) {
        let _ = self.event_tx.send(UiEvent::ViewUpdated { view });
    }

    fn lock_views(&self) -> MutexGuard<'_, HashMap<u64, ViewHandle<S>>> {
        self.views.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Lock a view's controller, tolerating poisoning.
pub fn lock_view<S>(view: &ViewHandle<S>) -> MutexGuard<'_, SessionController<S>> {
    view.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use coach::test_support::{RecordingClipboard, ScriptedService};

    pub(crate) fn test_state(service: ScriptedService) -> AppState<ScriptedService> {
        AppState::new(
            Arc::new(HistoryStore::in_memory()),
            Arc::new(service),
            Arc::new(RecordingClipboard::default()),
        )
    }

    #[test]
    fn views_get_distinct_ids_and_can_be_dropped() {
        let state = test_state(ScriptedService::new());
        let (a, _) = state.create_view();
        let (b, _) = state.create_view();
        assert_ne!(a, b);
        assert_eq!(state.views().len(), 2);

        assert!(state.drop_view(a));
        assert!(!state.drop_view(a));
        assert!(state.view(a).is_none());
        assert!(state.view(b).is_some());
    }

    /// A new view starts empty but already sees saved history.
    #[test]
    fn new_view_sees_existing_history() {
        let state = test_state(ScriptedService::new());
        state
            .store
            .append(coach::test_support::artifact("a1", "Saved earlier."));
        let (_, snapshot) = state.create_view();
        assert!(snapshot.artifact.is_none());
        assert_eq!(snapshot.history.len(), 1);
    }
}
