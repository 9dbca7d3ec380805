// src/store/memory.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use sqlx::types::Json;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptSummary, NewAttempt, TestAttempt},
        test_series::{CreateTestSeriesRequest, TestSeries},
    },
    store::TestSeriesStore,
};

/// Process-local store, used when no database is configured and in tests.
#[derive(Default)]
pub struct MemoryStore {
    series: RwLock<HashMap<Uuid, TestSeries>>,
    attempts: RwLock<Vec<TestAttempt>>,
    fail_saves: AtomicBool,
    save_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `save_attempt` fail.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of `save_attempt` calls, successful or not.
    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TestSeriesStore for MemoryStore {
    async fn create_test_series(
        &self,
        owner_id: Uuid,
        request: CreateTestSeriesRequest,
    ) -> Result<TestSeries, AppError> {
        let series = TestSeries {
            id: Uuid::new_v4(),
            owner_id,
            title: request.title,
            description: request.description,
            questions: Json(request.questions),
            duration_seconds: request.duration_seconds,
            negative_marking: request.negative_marking,
            created_at: chrono::Utc::now(),
        };

        self.series.write().await.insert(series.id, series.clone());
        Ok(series)
    }

    async fn get_test_series(&self, id: Uuid) -> Result<TestSeries, AppError> {
        self.series
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(AppError::NotFound("Test series not found".to_string()))
    }

    async fn save_attempt(&self, attempt: NewAttempt) -> Result<TestAttempt, AppError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(AppError::InternalServerError(
                "attempt store unavailable".to_string(),
            ));
        }

        let now = chrono::Utc::now();
        let saved = TestAttempt {
            id: Uuid::new_v4().to_string(),
            user_id: attempt.user_id,
            test_series_id: attempt.test_series_id,
            score: Some(attempt.score),
            total_questions: attempt.total_questions,
            time_taken: attempt.time_taken,
            answers: Json(attempt.answers),
            completed_at: now,
            created_at: now,
        };

        self.attempts.write().await.push(saved.clone());
        Ok(saved)
    }

    async fn get_attempt(&self, id: &str) -> Result<TestAttempt, AppError> {
        self.attempts
            .read()
            .await
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(AppError::NotFound("Attempt not found".to_string()))
    }

    async fn list_attempts(&self, user_id: Uuid) -> Result<Vec<AttemptSummary>, AppError> {
        let series = self.series.read().await;
        let attempts = self.attempts.read().await;

        let mut summaries: Vec<AttemptSummary> = attempts
            .iter()
            .filter(|a| a.user_id == user_id)
            .map(|a| AttemptSummary {
                id: a.id.clone(),
                test_series_id: a.test_series_id,
                title: series
                    .get(&a.test_series_id)
                    .map(|s| s.title.clone())
                    .unwrap_or_default(),
                score: a.score,
                total_questions: a.total_questions,
                time_taken: a.time_taken,
                completed_at: a.completed_at,
            })
            .collect();

        summaries.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{Question, QuestionKind};

    fn request() -> CreateTestSeriesRequest {
        CreateTestSeriesRequest {
            title: "Kinematics drill".to_string(),
            description: None,
            questions: vec![Question {
                id: "q1".to_string(),
                prompt: "g?".to_string(),
                topic: Some("Physics".to_string()),
                marks: None,
                negative_marks: None,
                kind: QuestionKind::Numerical {
                    answer: Some(9.8),
                    tolerance: 0.1,
                },
            }],
            duration_seconds: None,
            negative_marking: true,
        }
    }

    fn new_attempt(user_id: Uuid, test_series_id: Uuid) -> NewAttempt {
        NewAttempt {
            user_id,
            test_series_id,
            score: 1.0,
            total_questions: 1,
            time_taken: 30,
            answers: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_question_set_round_trips() {
        let store = MemoryStore::new();
        let series = store.create_test_series(Uuid::new_v4(), request()).await.unwrap();

        let set = store.load_question_set(series.id).await.unwrap();
        assert_eq!(set.questions.len(), 1);
        assert!(set.negative_marking);
        assert!(store.load_question_set(Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn test_failing_saves_are_counted() {
        let store = MemoryStore::new();
        store.fail_saves(true);

        let result = store.save_attempt(new_attempt(Uuid::new_v4(), Uuid::new_v4())).await;
        assert!(result.is_err());
        assert_eq!(store.save_calls(), 1);
    }

    #[tokio::test]
    async fn test_list_attempts_filters_by_user() {
        let store = MemoryStore::new();
        let series = store.create_test_series(Uuid::new_v4(), request()).await.unwrap();
        let me = Uuid::new_v4();

        let saved = store.save_attempt(new_attempt(me, series.id)).await.unwrap();
        store.save_attempt(new_attempt(Uuid::new_v4(), series.id)).await.unwrap();

        let mine = store.list_attempts(me).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "Kinematics drill");
        assert_eq!(store.get_attempt(&saved.id).await.unwrap(), saved);
    }
}
