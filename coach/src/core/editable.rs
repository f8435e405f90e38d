//! Locally edited working copy of an artifact.

use crate::core::artifact::Artifact;
use crate::core::request::Tone;

/// Working copy of a generated comment.
///
/// Edits touch only the copy. The originating artifact (and any history entry
/// holding it) is never rewritten, and `word_count` keeps describing the text
/// as generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditableArtifact {
    base: Artifact,
    text: String,
}

impl EditableArtifact {
    pub fn new(base: &Artifact) -> Self {
        Self {
            base: base.clone(),
            text: base.text.clone(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn base_artifact_id(&self) -> &str {
        &self.base.id
    }

    pub fn word_count(&self) -> u32 {
        self.base.word_count
    }

    pub fn tone(&self) -> Tone {
        self.base.tone
    }

    pub fn created_at(&self) -> &str {
        &self.base.created_at
    }

    /// True once the working copy differs from the generated text.
    pub fn is_edited(&self) -> bool {
        self.text != self.base.text
    }

    /// Text to place on the clipboard: the working copy, verbatim.
    pub fn to_clipboard_text(&self) -> String {
        self.text.clone()
    }
}

impl From<Artifact> for EditableArtifact {
    fn from(base: Artifact) -> Self {
        let text = base.text.clone();
        Self { base, text }
    }
}
