//! Generated comments and their stored form.

use serde::{Deserialize, Serialize};

use crate::core::request::Tone;
use crate::core::wire::ImprovedComment;

/// Identity and creation time assigned to a new artifact by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStamp {
    pub id: String,
    /// Display-formatted timestamp.
    pub created_at: String,
}

/// An immutable generated comment.
///
/// `word_count` is fixed when the artifact is created. Later edits to a
/// working copy never change it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    #[serde(rename = "comment")]
    pub text: String,
    pub word_count: u32,
    pub tone: Tone,
    #[serde(rename = "timestamp")]
    pub created_at: String,
}

impl Artifact {
    /// Build an artifact from a successful reply.
    ///
    /// The service-reported word count wins; otherwise words are counted here.
    pub fn from_reply(comment: ImprovedComment, tone: Tone, stamp: ArtifactStamp) -> Self {
        let word_count = comment
            .word_count
            .unwrap_or_else(|| count_words(&comment.comment));
        Self {
            id: stamp.id,
            text: comment.comment,
            word_count,
            tone,
            created_at: stamp.created_at,
        }
    }
}

/// Count whitespace-separated words.
pub fn count_words(text: &str) -> u32 {
    u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX)
}

/// A stored, addressable artifact.
///
/// Serialized flat: `{id, comment, word_count, tone, timestamp}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub artifact: Artifact,
}

impl HistoryEntry {
    pub fn new(artifact: Artifact) -> Self {
        Self { artifact }
    }

    pub fn id(&self) -> &str {
        &self.artifact.id
    }
}
