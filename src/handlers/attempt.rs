// src/handlers/attempt.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Serialize;

use crate::{
    config::Config,
    error::AppError,
    exam::{ResultScorer, ResultStatistics},
    models::attempt::TestAttempt,
    store::SharedStore,
    utils::jwt::Claims,
};

/// Lists the caller's stored attempts, newest first.
pub async fn list_attempts(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let attempts = store.list_attempts(claims.user_id()?).await?;
    Ok(Json(attempts))
}

#[derive(Debug, Serialize)]
pub struct AttemptResult {
    pub attempt: TestAttempt,
    pub statistics: ResultStatistics,
}

/// Recomputes the statistics of a stored attempt.
///
/// The question set is fetched by the attempt's test series id. If that
/// fails the statistics are computed over no questions rather than erroring.
pub async fn get_attempt_result(
    State(store): State<SharedStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let attempt = store.get_attempt(&id).await?;

    if attempt.user_id != user_id {
        return Err(AppError::NotFound("Attempt not found".to_string()));
    }

    let mut scorer = ResultScorer::loading(attempt, config.marking_scheme);
    let statistics = scorer.resolve(store.as_ref()).await.clone();
    let (attempt, _) = scorer.into_parts();

    Ok(Json(AttemptResult { attempt, statistics }))
}
