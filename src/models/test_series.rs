// src/models/test_series.rs

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;
use validator::Validate;

use crate::config::DEFAULT_SECONDS_PER_QUESTION;
use crate::models::question::{PublicQuestion, Question};

/// Represents the 'test_series' table: one generated question set.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TestSeries {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,

    /// Stored as a JSONB array.
    pub questions: Json<Vec<Question>>,

    /// Explicit time limit. `None` means two minutes per question.
    pub duration_seconds: Option<i32>,

    pub negative_marking: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl TestSeries {
    pub fn effective_duration(&self) -> u32 {
        self.duration_seconds
            .and_then(|d| u32::try_from(d).ok())
            .unwrap_or_else(|| default_duration(self.questions.len()))
    }

    pub fn question_set(&self) -> QuestionSet {
        QuestionSet {
            questions: self.questions.0.clone(),
            negative_marking: self.negative_marking,
        }
    }
}

/// Time limit for a question count when none is configured.
pub fn default_duration(question_count: usize) -> u32 {
    u32::try_from(question_count)
        .unwrap_or(u32::MAX)
        .saturating_mul(DEFAULT_SECONDS_PER_QUESTION)
}

/// The part of a test series needed to rescore an attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionSet {
    pub questions: Vec<Question>,
    pub negative_marking: bool,
}

/// DTO for creating a test series from generated questions.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTestSeriesRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(custom(function = validate_questions))]
    pub questions: Vec<Question>,
    #[validate(range(min = 1, max = 86400))]
    pub duration_seconds: Option<i32>,
    #[serde(default)]
    pub negative_marking: bool,
}

fn validate_questions(questions: &[Question]) -> Result<(), validator::ValidationError> {
    if questions.is_empty() {
        return Err(validator::ValidationError::new("questions_cannot_be_empty"));
    }
    if questions.len() > 500 {
        return Err(validator::ValidationError::new("too_many_questions"));
    }

    let mut seen = HashSet::new();
    for question in questions {
        if question.id.is_empty() || !seen.insert(question.id.as_str()) {
            return Err(validator::ValidationError::new("question_ids_must_be_unique"));
        }
        if question.prompt.len() > 5000 {
            return Err(validator::ValidationError::new("prompt_too_long"));
        }
        if question.options().iter().any(|opt| opt.len() > 1000) {
            return Err(validator::ValidationError::new("option_too_long"));
        }
        if question.marks.is_some_and(|marks| !marks.is_finite() || marks <= 0.0) {
            return Err(validator::ValidationError::new("marks_must_be_positive"));
        }
        if question
            .negative_marks
            .is_some_and(|penalty| !penalty.is_finite() || penalty < 0.0)
        {
            return Err(validator::ValidationError::new("negative_marks_cannot_be_negative"));
        }
    }
    Ok(())
}

/// DTO for returning a test series to a candidate.
#[derive(Debug, Serialize)]
pub struct PublicTestSeries {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub duration_seconds: u32,
    pub negative_marking: bool,
    pub question_count: usize,
    pub questions: Vec<PublicQuestion>,
}

impl From<&TestSeries> for PublicTestSeries {
    fn from(series: &TestSeries) -> Self {
        PublicTestSeries {
            id: series.id,
            title: series.title.clone(),
            description: series.description.clone(),
            duration_seconds: series.effective_duration(),
            negative_marking: series.negative_marking,
            question_count: series.questions.len(),
            questions: series.questions.iter().map(PublicQuestion::from).collect(),
        }
    }
}
