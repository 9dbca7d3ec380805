// src/store/pg.rs

use async_trait::async_trait;
use sqlx::{PgPool, types::Json};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptSummary, NewAttempt, TestAttempt},
        test_series::{CreateTestSeriesRequest, TestSeries},
    },
    store::TestSeriesStore,
};

/// Postgres-backed store. Questions and answers live in JSONB columns.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TestSeriesStore for PgStore {
    async fn create_test_series(
        &self,
        owner_id: Uuid,
        request: CreateTestSeriesRequest,
    ) -> Result<TestSeries, AppError> {
        sqlx::query_as::<_, TestSeries>(
            r#"
            INSERT INTO test_series (owner_id, title, description, questions, duration_seconds, negative_marking)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, owner_id, title, description, questions, duration_seconds, negative_marking, created_at
            "#,
        )
        .bind(owner_id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(Json(&request.questions))
        .bind(request.duration_seconds)
        .bind(request.negative_marking)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create test series: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })
    }

    async fn get_test_series(&self, id: Uuid) -> Result<TestSeries, AppError> {
        sqlx::query_as::<_, TestSeries>(
            r#"
            SELECT id, owner_id, title, description, questions, duration_seconds, negative_marking, created_at
            FROM test_series
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch test series {}: {:?}", id, e);
            AppError::InternalServerError(e.to_string())
        })?
        .ok_or(AppError::NotFound("Test series not found".to_string()))
    }

    async fn save_attempt(&self, attempt: NewAttempt) -> Result<TestAttempt, AppError> {
        sqlx::query_as::<_, TestAttempt>(
            r#"
            INSERT INTO test_attempts (user_id, test_series_id, score, total_questions, time_taken, answers, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING
                id::TEXT AS id,
                user_id,
                test_series_id,
                score,
                total_questions,
                time_taken,
                answers,
                completed_at,
                created_at
            "#,
        )
        .bind(attempt.user_id)
        .bind(attempt.test_series_id)
        .bind(attempt.score)
        .bind(attempt.total_questions)
        .bind(attempt.time_taken)
        .bind(Json(&attempt.answers))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to save test attempt: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })
    }

    async fn get_attempt(&self, id: &str) -> Result<TestAttempt, AppError> {
        let id = Uuid::parse_str(id)
            .map_err(|_| AppError::NotFound("Attempt not found".to_string()))?;

        sqlx::query_as::<_, TestAttempt>(
            r#"
            SELECT
                id::TEXT AS id,
                user_id,
                test_series_id,
                score,
                total_questions,
                time_taken,
                answers,
                completed_at,
                created_at
            FROM test_attempts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))
    }

    async fn list_attempts(&self, user_id: Uuid) -> Result<Vec<AttemptSummary>, AppError> {
        sqlx::query_as::<_, AttemptSummary>(
            r#"
            SELECT
                a.id::TEXT AS id,
                a.test_series_id,
                s.title,
                a.score,
                a.total_questions,
                a.time_taken,
                a.completed_at
            FROM test_attempts a
            JOIN test_series s ON a.test_series_id = s.id
            WHERE a.user_id = $1
            ORDER BY a.completed_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list attempts: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })
    }
}
