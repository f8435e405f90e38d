//! Change channel for history written by other processes.
//!
//! A [`FileStorage`](crate::io::storage::FileStorage) directory can be shared
//! by several processes. The watcher polls it and calls
//! [`HistoryStore::reload`] whenever the history file changes, which in turn
//! broadcasts an `External` notification to every subscriber.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{Event as NotifyEvent, EventKind, PollWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::io::history_store::HistoryStore;
use crate::io::storage::key_path;

/// Start watching `storage_dir` in a background task.
///
/// Must be called inside a tokio runtime. The task runs until aborted.
pub fn spawn_history_watcher(
    store: Arc<HistoryStore>,
    storage_dir: PathBuf,
    poll_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = run_history_watcher(store, storage_dir, poll_interval).await {
            warn!(error = %err, "history watcher failed");
        }
    })
}

async fn run_history_watcher(
    store: Arc<HistoryStore>,
    storage_dir: PathBuf,
    poll_interval: Duration,
) -> Result<()> {
    let history_path = key_path(&storage_dir, store.key()).context("history storage path")?;
    std::fs::create_dir_all(&storage_dir)
        .with_context(|| format!("create storage dir {}", storage_dir.display()))?;

    let (tx, mut rx) = mpsc::channel::<NotifyEvent>(100);
    let mut watcher = PollWatcher::new(
        move |res: Result<NotifyEvent, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.try_send(event);
            }
        },
        notify::Config::default().with_poll_interval(poll_interval),
    )?;
    watcher.watch(&storage_dir, RecursiveMode::NonRecursive)?;
    info!(path = %storage_dir.display(), "watching history storage");

    // Batch events so a burst of writes causes one reload.
    let mut pending: Vec<NotifyEvent> = Vec::new();
    let mut flush_tick = tokio::time::interval(poll_interval);
    flush_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                pending.push(event);
            }
            _ = flush_tick.tick() => {
                if pending.is_empty() {
                    continue;
                }
                if touches_history(&pending, &history_path) {
                    let changed = store.reload();
                    debug!(changed, "history file touched");
                }
                pending.clear();
            }
        }
    }
}

/// True if any create, modify, or remove event names the history file.
pub fn touches_history(events: &[NotifyEvent], history_path: &Path) -> bool {
    events
        .iter()
        .filter(|event| {
            matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            )
        })
        .any(|event| event.paths.iter().any(|path| path == history_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind};

    use crate::core::artifact::Artifact;
    use crate::core::request::Tone;
    use crate::io::history_store::{ChangeOrigin, HISTORY_KEY};
    use crate::io::storage::FileStorage;

    #[test]
    fn only_history_file_events_count() {
        let dir = Path::new("/ctx/storage");
        let history = dir.join("commentHistory.json");

        let other = NotifyEvent::new(EventKind::Modify(ModifyKind::Any))
            .add_path(dir.join("other.json"));
        let access = NotifyEvent::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(history.clone());
        assert!(!touches_history(&[other.clone(), access], &history));

        let created =
            NotifyEvent::new(EventKind::Create(CreateKind::File)).add_path(history.clone());
        assert!(touches_history(&[other, created], &history));
    }

    /// A write from a second process surfaces as an external change.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn watcher_reloads_after_external_write() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("storage");
        let store = Arc::new(HistoryStore::new(Arc::new(FileStorage::new(&dir))));
        assert!(store.is_empty());
        let mut rx = store.subscribe();

        let handle = spawn_history_watcher(
            Arc::clone(&store),
            dir.clone(),
            Duration::from_millis(20),
        );
        tokio::time::sleep(Duration::from_millis(100)).await;

        let other = HistoryStore::new(Arc::new(FileStorage::new(&dir)));
        other.append(Artifact {
            id: "ext-1".to_string(),
            text: "Written elsewhere.".to_string(),
            word_count: 2,
            tone: Tone::Direct,
            created_at: "2026-10-18 09:30:00".to_string(),
        });
        assert_eq!(other.key(), HISTORY_KEY);

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("notification before timeout")
            .expect("channel open");
        assert_eq!(event.origin, ChangeOrigin::External);
        assert_eq!(store.list()[0].id(), "ext-1");
        handle.abort();
    }
}
