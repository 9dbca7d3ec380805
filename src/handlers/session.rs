// src/handlers/session.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::{
    config::Config,
    error::AppError,
    exam::{
        ExamController, ExamSession, SessionRegistry, SessionSettings,
        registry::ExitOutcome, session::LifelineOutcome,
    },
    models::session::{NavigateRequest, QuestionIndexRequest, SelectAnswerRequest, SessionView},
    store::SharedStore,
    utils::jwt::Claims,
};

/// Error for a session id that is no longer live.
fn not_live(sessions: &SessionRegistry, id: Uuid) -> AppError {
    if sessions.finished(id).is_some() {
        AppError::Conflict("Session already submitted".to_string())
    } else {
        AppError::NotFound("Session not found".to_string())
    }
}

/// Locks a live session that belongs to the caller.
async fn lock_owned(
    sessions: &SessionRegistry,
    id: Uuid,
    user_id: Uuid,
) -> Result<OwnedMutexGuard<ExamController>, AppError> {
    let live = sessions.get(id).ok_or_else(|| not_live(sessions, id))?;
    let controller = live.lock_owned().await;

    // Other users' sessions are indistinguishable from missing ones.
    if controller.session().user_id() != user_id {
        return Err(AppError::NotFound("Session not found".to_string()));
    }
    Ok(controller)
}

/// Starts a timed session over a test series.
///
/// The countdown starts immediately and the session is submitted
/// automatically when it reaches zero.
pub async fn start_session(
    State(store): State<SharedStore>,
    State(config): State<Config>,
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(test_series_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let series = store.get_test_series(test_series_id).await?;

    let session = ExamSession::new(
        series.id,
        user_id,
        series.questions.0.clone(),
        SessionSettings {
            duration_seconds: Some(series.effective_duration()),
            negative_marking: series.negative_marking,
        },
    )?;

    let session_id = sessions.start(session, config.marking_scheme, store);
    sessions.spawn_ticker(session_id);

    let controller = lock_owned(&sessions, session_id, user_id).await?;
    Ok((StatusCode::CREATED, Json(SessionView::new(session_id, controller.session()))))
}

pub async fn get_session(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let controller = lock_owned(&sessions, id, claims.user_id()?).await?;
    Ok(Json(SessionView::new(id, controller.session())))
}

/// Records, overwrites or clears the answer to one question.
pub async fn select_answer(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<SelectAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut controller = lock_owned(&sessions, id, claims.user_id()?).await?;

    match req.answer {
        Some(answer) => controller.select_answer(req.question_index, answer)?,
        None => controller.clear_answer(req.question_index)?,
    }

    Ok(Json(SessionView::new(id, controller.session())))
}

pub async fn navigate(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<NavigateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut controller = lock_owned(&sessions, id, claims.user_id()?).await?;
    controller.navigate(req.index)?;
    Ok(Json(SessionView::new(id, controller.session())))
}

pub async fn toggle_review(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<QuestionIndexRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut controller = lock_owned(&sessions, id, claims.user_id()?).await?;
    controller.toggle_mark_for_review(req.question_index)?;
    Ok(Json(SessionView::new(id, controller.session())))
}

#[derive(Debug, Serialize)]
pub struct LifelineResponse {
    pub lifeline: LifelineOutcome,
    pub session: SessionView,
}

/// Removes two wrong options from a question, once per question.
pub async fn use_lifeline(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<QuestionIndexRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut controller = lock_owned(&sessions, id, claims.user_id()?).await?;
    let lifeline = controller.use_lifeline(req.question_index)?;

    Ok(Json(LifelineResponse {
        lifeline,
        session: SessionView::new(id, controller.session()),
    }))
}

/// Pauses or resumes the countdown.
pub async fn toggle_pause(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut controller = lock_owned(&sessions, id, claims.user_id()?).await?;
    let paused = controller.toggle_pause()?;
    tracing::debug!(session_id = %id, paused, "Pause toggled");
    Ok(Json(SessionView::new(id, controller.session())))
}

/// Submits the session and returns the scored result.
///
/// Repeating the call (or racing the expiry auto-submit) returns the
/// result of the one submission that happened.
pub async fn submit_session(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    if let Some(live) = sessions.get(id) {
        let mut controller = live.lock().await;
        if controller.session().user_id() != user_id {
            return Err(AppError::NotFound("Session not found".to_string()));
        }
        controller.submit().await;
    }

    let finished = sessions
        .finished(id)
        .filter(|f| f.attempt.user_id == user_id)
        .ok_or(AppError::NotFound("Session not found".to_string()))?;

    Ok(Json(finished.result()))
}

/// Leaves the session without scoring it.
pub async fn exit_session(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    match sessions.exit(id, claims.user_id()?).await {
        ExitOutcome::Exited => Ok(StatusCode::NO_CONTENT),
        ExitOutcome::NotOwner => Err(AppError::NotFound("Session not found".to_string())),
        ExitOutcome::NotLive => Err(not_live(&sessions, id)),
    }
}

/// Result of a finished session, including unsaved (local) attempts.
pub async fn get_session_result(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    match sessions.finished(id) {
        Some(finished) if finished.attempt.user_id == user_id => Ok(Json(finished.result())),
        Some(_) => Err(AppError::NotFound("Session not found".to_string())),
        None if sessions.get(id).is_some() => {
            Err(AppError::Conflict("Session is still in progress".to_string()))
        }
        None => Err(AppError::NotFound("Session not found".to_string())),
    }
}
