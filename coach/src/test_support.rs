//! Test-only fakes and builders shared by unit and integration tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Result, anyhow};
use tokio::sync::Semaphore;

use crate::core::artifact::Artifact;
use crate::core::error::TransportError;
use crate::core::request::{FeedbackRequest, StandardOptions, Tone};
use crate::core::wire::{ImproveBody, ImprovedComment, ServiceReply};
use crate::io::clipboard::Clipboard;
use crate::io::history_store::HistoryStore;
use crate::io::init::{CoachPaths, InitOptions, init_coach};
use crate::io::service::ImproveService;
use crate::io::storage::FileStorage;

/// Service that replays queued outcomes in order and records every body.
///
/// With a gate, each call waits for one [`release`](Self::release) before
/// answering, which lets tests hold a request in flight.
#[derive(Debug, Default)]
pub struct ScriptedService {
    outcomes: Mutex<VecDeque<Result<ServiceReply, TransportError>>>,
    bodies: Mutex<Vec<ImproveBody>>,
    calls: AtomicUsize,
    gate: Option<Semaphore>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcomes(
        outcomes: impl IntoIterator<Item = Result<ServiceReply, TransportError>>,
    ) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Calls block until released.
    pub fn gated(outcomes: impl IntoIterator<Item = Result<ServiceReply, TransportError>>) -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::with_outcomes(outcomes)
        }
    }

    /// Let one gated call proceed.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn push(&self, outcome: Result<ServiceReply, TransportError>) {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(outcome);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn bodies(&self) -> Vec<ImproveBody> {
        self.bodies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ImproveService for ScriptedService {
    async fn improve(&self, body: &ImproveBody) -> Result<ServiceReply, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bodies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(body.clone());
        if let Some(gate) = &self.gate
            && let Ok(permit) = gate.acquire().await
        {
            permit.forget();
        }
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("no scripted outcome".to_string())))
    }
}

/// Clipboard that remembers what was copied.
#[derive(Debug, Default)]
pub struct RecordingClipboard {
    copied: Mutex<Vec<String>>,
}

impl RecordingClipboard {
    pub fn copied(&self) -> Vec<String> {
        self.copied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Clipboard for RecordingClipboard {
    fn write_text(&self, text: &str) -> Result<()> {
        self.copied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
        Ok(())
    }
}

/// Clipboard that is never available.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingClipboard;

impl Clipboard for FailingClipboard {
    fn write_text(&self, _text: &str) -> Result<()> {
        Err(anyhow!("clipboard unavailable"))
    }
}

/// Initialized `.coach/` context in a temporary directory.
pub struct TempContext {
    dir: tempfile::TempDir,
    paths: CoachPaths,
}

impl TempContext {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let paths = init_coach(dir.path(), &InitOptions::default())?;
        Ok(Self { dir, paths })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn paths(&self) -> &CoachPaths {
        &self.paths
    }

    /// A history store over this context's shared storage directory.
    pub fn store(&self) -> HistoryStore {
        HistoryStore::new(Arc::new(FileStorage::new(&self.paths.storage_dir)))
    }
}

/// Deterministic artifact with the word count of `text`.
pub fn artifact(id: &str, text: &str) -> Artifact {
    Artifact {
        id: id.to_string(),
        text: text.to_string(),
        word_count: crate::core::artifact::count_words(text),
        tone: Tone::Professional,
        created_at: "2026-10-18 09:30:00".to_string(),
    }
}

/// Standard request with default options except `tone`.
pub fn request_with_tone(text: &str, tone: Tone) -> FeedbackRequest {
    FeedbackRequest::standard(
        text,
        StandardOptions {
            tone,
            ..StandardOptions::default()
        },
    )
}

/// Successful reply carrying `comment` and the service-reported metadata.
pub fn ok_reply(comment: &str, word_count: Option<u32>, tone: Option<&str>) -> ServiceReply {
    ServiceReply::ok(ImprovedComment {
        comment: comment.to_string(),
        word_count,
        tone: tone.map(str::to_string),
    })
}
