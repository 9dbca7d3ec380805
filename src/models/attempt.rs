// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;

use crate::config::LOCAL_ATTEMPT_PREFIX;
use crate::models::question::AnswerValue;

/// Represents the 'test_attempts' table: a submitted attempt at a test series.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct TestAttempt {
    /// Database id, or `local-<uuid>` when the attempt could not be saved.
    pub id: String,
    pub user_id: Uuid,
    pub test_series_id: Uuid,

    /// May be fractional under negative marking. Older records may lack it.
    pub score: Option<f64>,

    pub total_questions: i32,

    /// Seconds spent, `duration - time_left` at submit.
    pub time_taken: i32,

    /// One entry per question, in question order.
    pub answers: Json<Vec<AnswerRecord>>,

    pub completed_at: chrono::DateTime<chrono::Utc>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl TestAttempt {
    /// Whether this attempt only exists in memory because saving it failed.
    pub fn is_local(&self) -> bool {
        self.id.starts_with(LOCAL_ATTEMPT_PREFIX)
    }
}

/// The recorded answer for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_id: String,

    /// `None` when the question was left unattempted.
    #[serde(default)]
    pub selected_option: Option<AnswerValue>,

    /// Trusted by the result scorer when present.
    #[serde(default)]
    pub is_correct: Option<bool>,
}

/// The fields sent to persistence when a session is submitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAttempt {
    pub user_id: Uuid,
    pub test_series_id: Uuid,
    pub score: f64,
    pub total_questions: i32,
    pub time_taken: i32,
    pub answers: Vec<AnswerRecord>,
}

impl NewAttempt {
    /// Builds the record kept when persistence is unavailable.
    pub fn into_local_attempt(self) -> TestAttempt {
        let now = chrono::Utc::now();
        TestAttempt {
            id: format!("{}-{}", LOCAL_ATTEMPT_PREFIX, Uuid::new_v4()),
            user_id: self.user_id,
            test_series_id: self.test_series_id,
            score: Some(self.score),
            total_questions: self.total_questions,
            time_taken: self.time_taken,
            answers: Json(self.answers),
            completed_at: now,
            created_at: now,
        }
    }
}

/// Row summary for listing a user's attempts.
#[derive(Debug, Serialize, FromRow)]
pub struct AttemptSummary {
    pub id: String,
    pub test_series_id: Uuid,
    pub title: String,
    pub score: Option<f64>,
    pub total_questions: i32,
    pub time_taken: i32,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}
