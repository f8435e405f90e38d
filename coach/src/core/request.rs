//! User-supplied input for an improvement call.
//!
//! Formatting preferences are closed enumerations whose wire spelling matches
//! the service contract. A request carries either the standard option set or
//! a free-form custom prompt, never both.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::{UnknownOption, ValidationError};

/// Upper bound the service accepts for `original_feedback`, in characters.
pub const MAX_FEEDBACK_CHARS: usize = 1000;
/// Upper bound the service accepts for `custom_prompt`, in characters.
pub const MAX_CUSTOM_PROMPT_CHARS: usize = 500;

/// Declares a closed option enum with its wire spelling, `as_str`, `Display`,
/// and a whitespace-tolerant `FromStr`.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$variant_meta:meta])* $variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownOption;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let wanted = raw.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|option| option.as_str() == wanted)
                    .ok_or_else(|| {
                        UnknownOption::new(
                            stringify!($name),
                            raw,
                            $name::ALL.iter().map(|o| o.as_str()),
                        )
                    })
            }
        }
    };
}

wire_enum! {
    /// School subject the feedback is about.
    #[derive(Default)]
    pub enum Subject {
        #[default]
        Math => "math",
        English => "english",
        Science => "science",
        SocialStudies => "social_studies",
        Art => "art",
        Music => "music",
        Pe => "pe",
        Other => "other",
    }
}

wire_enum! {
    #[derive(Default)]
    pub enum GradeLevel {
        #[default]
        General => "general",
        Kindergarten => "kindergarten",
        ElementarySchool => "elementary-school",
        MiddleSchool => "middle-school",
        HighSchool => "high-school",
    }
}

wire_enum! {
    /// Voice of the rewritten comment. Also recorded on every artifact.
    #[derive(Default)]
    pub enum Tone {
        Professional => "professional",
        Encouraging => "encouraging",
        Direct => "direct",
        Warm => "warm",
        #[default]
        StudentFriendly => "student-friendly",
        ParentFriendly => "parent-friendly",
    }
}

wire_enum! {
    /// Target length: short is 1-2 sentences, medium 3-4, long 5+.
    #[derive(Default)]
    pub enum Length {
        Short => "short",
        #[default]
        Medium => "medium",
        Long => "long",
    }
}

wire_enum! {
    /// Aspect the service should emphasize.
    pub enum FocusArea {
        Strengths => "strengths",
        Improvements => "improvements",
        Examples => "examples",
        NextSteps => "next_steps",
        Behavior => "behavior",
        Participation => "participation",
        Growth => "growth",
        Effort => "effort",
    }
}

/// The standard option set used when no custom prompt is given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StandardOptions {
    pub subject: Subject,
    pub grade_level: GradeLevel,
    pub tone: Tone,
    pub length: Length,
    pub focus_areas: BTreeSet<FocusArea>,
}

/// How the service should rewrite the feedback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOptions {
    Standard(StandardOptions),
    /// Free-form instructions replacing every standard option.
    CustomPrompt { prompt: String },
}

/// A single improvement request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackRequest {
    pub original_text: String,
    pub options: RequestOptions,
}

impl FeedbackRequest {
    pub fn standard(original_text: impl Into<String>, options: StandardOptions) -> Self {
        Self {
            original_text: original_text.into(),
            options: RequestOptions::Standard(options),
        }
    }

    pub fn custom(original_text: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            original_text: original_text.into(),
            options: RequestOptions::CustomPrompt {
                prompt: prompt.into(),
            },
        }
    }

    /// Build from form input. An empty custom prompt means none was given,
    /// so the standard options apply.
    pub fn from_input(
        original_text: impl Into<String>,
        custom_prompt: Option<String>,
        options: StandardOptions,
    ) -> Self {
        match custom_prompt {
            Some(prompt) if !prompt.is_empty() => Self::custom(original_text, prompt),
            _ => Self::standard(original_text, options),
        }
    }

    /// Local preconditions checked before anything leaves the client.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.original_text.trim().is_empty() {
            return Err(ValidationError::EmptyFeedback);
        }
        let len = self.original_text.chars().count();
        if len > MAX_FEEDBACK_CHARS {
            return Err(ValidationError::FeedbackTooLong {
                len,
                max: MAX_FEEDBACK_CHARS,
            });
        }
        if let RequestOptions::CustomPrompt { prompt } = &self.options {
            if prompt.trim().is_empty() {
                return Err(ValidationError::EmptyCustomPrompt);
            }
            let len = prompt.chars().count();
            if len > MAX_CUSTOM_PROMPT_CHARS {
                return Err(ValidationError::CustomPromptTooLong {
                    len,
                    max: MAX_CUSTOM_PROMPT_CHARS,
                });
            }
        }
        Ok(())
    }

    /// Tone chosen by the user, if the request carries one.
    pub fn requested_tone(&self) -> Option<Tone> {
        match &self.options {
            RequestOptions::Standard(options) => Some(options.tone),
            RequestOptions::CustomPrompt { .. } => None,
        }
    }
}
