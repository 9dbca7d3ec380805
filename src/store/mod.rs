// src/store/mod.rs

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptSummary, NewAttempt, TestAttempt},
        test_series::{CreateTestSeriesRequest, QuestionSet, TestSeries},
    },
};

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

/// Shared handle to whichever store the server runs on.
pub type SharedStore = Arc<dyn TestSeriesStore>;

/// Persistence for question sets and submitted attempts.
#[async_trait]
pub trait TestSeriesStore: Send + Sync {
    async fn create_test_series(
        &self,
        owner_id: Uuid,
        request: CreateTestSeriesRequest,
    ) -> Result<TestSeries, AppError>;

    async fn get_test_series(&self, id: Uuid) -> Result<TestSeries, AppError>;

    /// Loads the questions needed to rescore an attempt.
    async fn load_question_set(&self, test_series_id: Uuid) -> Result<QuestionSet, AppError> {
        Ok(self.get_test_series(test_series_id).await?.question_set())
    }

    async fn save_attempt(&self, attempt: NewAttempt) -> Result<TestAttempt, AppError>;

    async fn get_attempt(&self, id: &str) -> Result<TestAttempt, AppError>;

    /// Attempts of one user, newest first.
    async fn list_attempts(&self, user_id: Uuid) -> Result<Vec<AttemptSummary>, AppError>;
}
