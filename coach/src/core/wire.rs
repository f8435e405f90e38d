//! JSON shapes exchanged with the improvement service.

use serde::{Deserialize, Serialize};

use crate::core::request::{
    FeedbackRequest, FocusArea, GradeLevel, Length, RequestOptions, Subject, Tone,
};

/// Body of `POST /api/improve-feedback`.
///
/// Standard fields are omitted entirely for custom-prompt requests.
/// `custom_prompt` and `focus_areas` are always present, `null` when unused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImproveBody {
    pub original_feedback: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade_level: Option<GradeLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<Tone>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<Length>,
    pub custom_prompt: Option<String>,
    pub focus_areas: Option<Vec<FocusArea>>,
}

impl From<&FeedbackRequest> for ImproveBody {
    fn from(request: &FeedbackRequest) -> Self {
        match &request.options {
            RequestOptions::Standard(options) => Self {
                original_feedback: request.original_text.clone(),
                subject: Some(options.subject),
                grade_level: Some(options.grade_level),
                tone: Some(options.tone),
                length: Some(options.length),
                custom_prompt: None,
                focus_areas: if options.focus_areas.is_empty() {
                    None
                } else {
                    Some(options.focus_areas.iter().copied().collect())
                },
            },
            RequestOptions::CustomPrompt { prompt } => Self {
                original_feedback: request.original_text.clone(),
                subject: None,
                grade_level: None,
                tone: None,
                length: None,
                custom_prompt: Some(prompt.clone()),
                focus_areas: None,
            },
        }
    }
}

/// Response envelope returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceReply {
    pub success: bool,
    #[serde(default)]
    pub data: Option<ImprovedComment>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
}

impl ServiceReply {
    pub fn ok(data: ImprovedComment) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            generated_at: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            generated_at: None,
        }
    }
}

/// Payload of a successful reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImprovedComment {
    pub comment: String,
    #[serde(default)]
    pub word_count: Option<u32>,
    #[serde(default)]
    pub tone: Option<String>,
}
