//! Error kinds for a submission.
//!
//! Every failure a session can end in is one of these values. They are plain
//! data (cloneable, comparable) so they can live inside session state and be
//! rendered by any view.

use serde::Serialize;
use thiserror::Error;

/// Message used when the service reports failure without saying why.
pub const SERVICE_FALLBACK_MESSAGE: &str = "Failed to improve feedback";

/// A string did not name any value of a closed option set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}' (expected one of: {expected})")]
pub struct UnknownOption {
    kind: &'static str,
    value: String,
    expected: String,
}

impl UnknownOption {
    pub(crate) fn new<'a>(
        kind: &'static str,
        value: &str,
        expected: impl Iterator<Item = &'a str>,
    ) -> Self {
        Self {
            kind,
            value: value.to_string(),
            expected: expected.collect::<Vec<_>>().join(", "),
        }
    }
}

/// Local precondition failures. The request never leaves the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("original feedback is required")]
    EmptyFeedback,
    #[error("original feedback is too long ({len} characters, at most {max})")]
    FeedbackTooLong { len: usize, max: usize },
    #[error("custom prompt is empty")]
    EmptyCustomPrompt,
    #[error("custom prompt is too long ({len} characters, at most {max})")]
    CustomPromptTooLong { len: usize, max: usize },
}

/// The call did not produce a usable service reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("HTTP error: status {status}")]
    Status { status: u16 },
    #[error("network error: {0}")]
    Network(String),
    #[error("network error: request timed out after {secs}s")]
    Timeout { secs: u64 },
    #[error("malformed response: {0}")]
    Parse(String),
}

/// Why a submission ended in `Failed` (or was refused).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("a submission is already in flight")]
    Busy,
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The service answered but reported an internal failure.
    #[error("{0}")]
    Service(String),
}

/// Coarse classification used by views and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Validation,
    Busy,
    Transport,
    Service,
}

impl SubmitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SubmitError::Validation(_) => ErrorKind::Validation,
            SubmitError::Busy => ErrorKind::Busy,
            SubmitError::Transport(_) => ErrorKind::Transport,
            SubmitError::Service(_) => ErrorKind::Service,
        }
    }

    /// Build a service error, substituting the fallback for a missing or blank message.
    pub fn from_service_message(message: Option<String>) -> Self {
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| SERVICE_FALLBACK_MESSAGE.to_string());
        SubmitError::Service(message)
    }
}
