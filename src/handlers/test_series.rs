// src/handlers/test_series.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::test_series::{CreateTestSeriesRequest, PublicTestSeries},
    store::SharedStore,
    utils::{html::sanitize_question, jwt::Claims},
};

/// Stores a generated question set as a new test series.
///
/// * Validates the payload (non-empty, unique question ids, sizes).
/// * Sanitises all question text before storage.
/// * Returns 201 with the public view (no answer keys).
pub async fn create_test_series(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Json(mut payload): Json<CreateTestSeriesRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let owner_id = claims.user_id()?;
    payload.questions = payload.questions.into_iter().map(sanitize_question).collect();

    let series = store.create_test_series(owner_id, payload).await?;
    tracing::info!(test_series_id = %series.id, questions = series.questions.len(), "Test series created");

    Ok((StatusCode::CREATED, Json(PublicTestSeries::from(&series))))
}

/// Returns a test series without its answer keys.
pub async fn get_test_series(
    State(store): State<SharedStore>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let series = store.get_test_series(id).await?;
    Ok(Json(PublicTestSeries::from(&series)))
}
