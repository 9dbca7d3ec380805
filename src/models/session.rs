// src/models/session.rs

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::exam::session::{ExamSession, TimerState};
use crate::models::question::{AnswerValue, PublicQuestion};

/// DTO for answering a question. `answer: null` clears the answer.
#[derive(Debug, Deserialize)]
pub struct SelectAnswerRequest {
    pub question_index: usize,
    pub answer: Option<AnswerValue>,
}

/// DTO for actions that target one question (review mark, lifeline).
#[derive(Debug, Deserialize)]
pub struct QuestionIndexRequest {
    pub question_index: usize,
}

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub index: usize,
}

/// An option still offered to the candidate.
#[derive(Debug, Serialize)]
pub struct VisibleOption {
    pub index: usize,
    pub text: String,
}

/// Snapshot of a live session as the candidate sees it.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub test_series_id: Uuid,
    pub state: TimerState,
    pub time_left: u32,
    pub duration: u32,
    pub pause_left: u32,
    pub total_questions: usize,
    pub current_index: usize,
    pub current_question: PublicQuestion,
    /// Options of the current question minus the ones a lifeline removed.
    pub visible_options: Vec<VisibleOption>,
    pub answers: BTreeMap<usize, AnswerValue>,
    pub marked_for_review: BTreeSet<usize>,
    pub lifeline_used: BTreeSet<usize>,
    pub eliminated_options: BTreeMap<usize, BTreeSet<usize>>,
    pub negative_marking: bool,
}

impl SessionView {
    pub fn new(session_id: Uuid, session: &ExamSession) -> Self {
        let current = session.current_question();
        let hidden = session.eliminated_options().get(&session.current_index());

        let visible_options = current
            .options()
            .iter()
            .enumerate()
            .filter(|(index, _)| hidden.is_none_or(|h| !h.contains(index)))
            .map(|(index, text)| VisibleOption {
                index,
                text: text.clone(),
            })
            .collect();

        SessionView {
            session_id,
            test_series_id: session.test_series_id(),
            state: session.timer_state(),
            time_left: session.time_left(),
            duration: session.duration(),
            pause_left: session.pause_left(),
            total_questions: session.questions().len(),
            current_index: session.current_index(),
            current_question: PublicQuestion::from(current),
            visible_options,
            answers: session.answers().clone(),
            marked_for_review: session.marked_for_review().clone(),
            lifeline_used: session.lifeline_used().clone(),
            eliminated_options: session.eliminated_options().clone(),
            negative_marking: session.negative_marking(),
        }
    }
}
