//! In-app survey question sets embedded into generated apps.
//!
//! Two surveys exist: a user-experience (UX) survey and a product-market-fit
//! (PMF) survey. Each is toggled per project; when a survey is enabled but the
//! owner supplied no questions, the default set below is used.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Maximum questions per survey.
pub const MAX_QUESTIONS: usize = 20;

/// Maximum length of a single question prompt.
pub const MAX_QUESTION_LEN: usize = 500;

/// Which survey a question set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurveyKind {
    Ux,
    Pmf,
}

impl SurveyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ux => "UX",
            Self::Pmf => "PMF",
        }
    }
}

/// Type-specific constraints of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    Text,
    Radio {
        options: Vec<String>,
    },
    Scale {
        min: i32,
        max: i32,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        labels: Vec<String>,
    },
    Nps {
        scale: [i32; 2],
    },
}

/// A single survey question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyQuestion {
    pub id: u32,
    pub question: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl SurveyQuestion {
    fn new(id: u32, question: &str, kind: QuestionKind) -> Self {
        Self {
            id,
            question: question.to_string(),
            kind,
        }
    }
}

/// Default UX survey.
pub fn default_ux_questions() -> Vec<SurveyQuestion> {
    vec![
        SurveyQuestion::new(
            1,
            "How easy is it to navigate this app?",
            QuestionKind::Scale {
                min: 1,
                max: 5,
                labels: vec!["Very Difficult".into(), "Very Easy".into()],
            },
        ),
        SurveyQuestion::new(2, "What do you like most about the app?", QuestionKind::Text),
        SurveyQuestion::new(3, "What could be improved?", QuestionKind::Text),
        SurveyQuestion::new(
            4,
            "Overall, how satisfied are you with the app?",
            QuestionKind::Radio {
                options: vec![
                    "Very Satisfied".into(),
                    "Satisfied".into(),
                    "Neutral".into(),
                    "Dissatisfied".into(),
                    "Very Dissatisfied".into(),
                ],
            },
        ),
    ]
}

/// Default PMF survey.
pub fn default_pmf_questions() -> Vec<SurveyQuestion> {
    vec![
        SurveyQuestion::new(
            1,
            "How would you feel if you could no longer use [App Name]?",
            QuestionKind::Radio {
                options: vec![
                    "Very disappointed".into(),
                    "Somewhat disappointed".into(),
                    "Not disappointed (it's not that useful)".into(),
                ],
            },
        ),
        SurveyQuestion::new(
            2,
            "What is the primary benefit you receive from [App Name]?",
            QuestionKind::Text,
        ),
        SurveyQuestion::new(
            3,
            "How likely are you to recommend [App Name] to a friend or colleague?",
            QuestionKind::Nps { scale: [0, 10] },
        ),
        SurveyQuestion::new(
            4,
            "What alternatives would you use if [App Name] were no longer available?",
            QuestionKind::Text,
        ),
    ]
}

/// Default question set for a survey kind.
pub fn default_questions(kind: SurveyKind) -> Vec<SurveyQuestion> {
    match kind {
        SurveyKind::Ux => default_ux_questions(),
        SurveyKind::Pmf => default_pmf_questions(),
    }
}

/// Resolve the question set the generated app will display.
///
/// Returns `None` when the survey is disabled. An enabled survey with no
/// questions (absent or empty) gets the defaults.
pub fn resolve_questions(
    kind: SurveyKind,
    enabled: bool,
    provided: Option<&[SurveyQuestion]>,
) -> Option<Vec<SurveyQuestion>> {
    if !enabled {
        return None;
    }
    match provided {
        Some(questions) if !questions.is_empty() => Some(questions.to_vec()),
        _ => Some(default_questions(kind)),
    }
}

/// Validate an owner-supplied question set.
pub fn validate_questions(questions: &[SurveyQuestion]) -> Result<(), CoreError> {
    if questions.len() > MAX_QUESTIONS {
        return Err(CoreError::Validation(format!(
            "A survey may have at most {MAX_QUESTIONS} questions"
        )));
    }

    let mut seen = HashSet::with_capacity(questions.len());
    for q in questions {
        if !seen.insert(q.id) {
            return Err(CoreError::Validation(format!(
                "Duplicate question id: {}",
                q.id
            )));
        }
        let prompt = q.question.trim();
        if prompt.is_empty() {
            return Err(CoreError::Validation(format!(
                "Question {} must not be empty",
                q.id
            )));
        }
        if prompt.len() > MAX_QUESTION_LEN {
            return Err(CoreError::Validation(format!(
                "Question {} exceeds {MAX_QUESTION_LEN} characters",
                q.id
            )));
        }
        match &q.kind {
            QuestionKind::Text => {}
            QuestionKind::Radio { options } => {
                if options.len() < 2 || options.iter().any(|o| o.trim().is_empty()) {
                    return Err(CoreError::Validation(format!(
                        "Question {} needs at least two non-empty options",
                        q.id
                    )));
                }
            }
            QuestionKind::Scale { min, max, .. } => {
                if min >= max {
                    return Err(CoreError::Validation(format!(
                        "Question {}: scale min must be below max",
                        q.id
                    )));
                }
            }
            QuestionKind::Nps { scale } => {
                if scale[0] >= scale[1] {
                    return Err(CoreError::Validation(format!(
                        "Question {}: NPS scale must be ascending",
                        q.id
                    )));
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
