//! Lifecycle of a single improvement request.
//!
//! ```text
//! Idle --begin--> Submitting --resolve(ok)--> Succeeded
//!                 Submitting --resolve(err)-> Failed
//! Idle|Succeeded|Failed --begin(invalid)----> Failed
//! any --reset--> Idle
//! ```
//!
//! No state is terminal. Every state except `Submitting` accepts `begin`.

use serde::Serialize;
use tracing::debug;

use crate::core::artifact::{Artifact, ArtifactStamp};
use crate::core::error::{SubmitError, TransportError};
use crate::core::request::{FeedbackRequest, Tone};
use crate::core::wire::{ImproveBody, ServiceReply};

/// Current state of a request session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Submitting,
    Succeeded(Artifact),
    Failed(SubmitError),
}

/// Data-free view of [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

/// State machine for one improvement call at a time.
#[derive(Debug, Clone, Default)]
pub struct RequestSession {
    state: SessionState,
    /// Tone of the in-flight request, copied onto the resulting artifact.
    requested_tone: Option<Tone>,
}

impl RequestSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            SessionState::Idle => Phase::Idle,
            SessionState::Submitting => Phase::Submitting,
            SessionState::Succeeded(_) => Phase::Succeeded,
            SessionState::Failed(_) => Phase::Failed,
        }
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.state, SessionState::Submitting)
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        match &self.state {
            SessionState::Succeeded(artifact) => Some(artifact),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SubmitError> {
        match &self.state {
            SessionState::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Start a submission and return the body to send.
    ///
    /// While `Submitting` this returns [`SubmitError::Busy`] and changes
    /// nothing. A request failing local validation moves straight to `Failed`
    /// and nothing is sent.
    pub fn begin(&mut self, request: &FeedbackRequest) -> Result<ImproveBody, SubmitError> {
        if self.is_submitting() {
            return Err(SubmitError::Busy);
        }
        if let Err(err) = request.validate() {
            let err = SubmitError::Validation(err);
            debug!(error = %err, "request failed validation");
            self.requested_tone = None;
            self.state = SessionState::Failed(err.clone());
            return Err(err);
        }
        self.requested_tone = request.requested_tone();
        self.state = SessionState::Submitting;
        Ok(ImproveBody::from(request))
    }

    /// Apply the outcome of the service call.
    ///
    /// Returns `false` (and changes nothing) unless the session is `Submitting`.
    pub fn resolve(
        &mut self,
        outcome: Result<ServiceReply, TransportError>,
        stamp: ArtifactStamp,
    ) -> bool {
        if !self.is_submitting() {
            return false;
        }
        let requested_tone = self.requested_tone.take();
        self.state = match interpret_outcome(outcome, requested_tone, stamp) {
            Ok(artifact) => SessionState::Succeeded(artifact),
            Err(err) => SessionState::Failed(err),
        };
        true
    }

    pub fn reset(&mut self) {
        self.requested_tone = None;
        self.state = SessionState::Idle;
    }
}

fn interpret_outcome(
    outcome: Result<ServiceReply, TransportError>,
    requested_tone: Option<Tone>,
    stamp: ArtifactStamp,
) -> Result<Artifact, SubmitError> {
    let reply = outcome?;
    if !reply.success {
        return Err(SubmitError::from_service_message(reply.error));
    }
    let data = reply.data.ok_or_else(|| {
        TransportError::Parse("reply reported success without data".to_string())
    })?;
    // Custom-prompt requests carry no tone; use what the service reports.
    let tone = requested_tone
        .or_else(|| data.tone.as_deref().and_then(|raw| raw.parse().ok()))
        .unwrap_or(Tone::Professional);
    Ok(Artifact::from_reply(data, tone, stamp))
}
