// src/exam/session.rs

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rand::Rng;
use rand::seq::index;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{LIFELINE_ELIMINATIONS, MAX_PAUSE_SECONDS};
use crate::exam::marking::{MarkingScheme, Outcome, ScoringPolicy, clamp_score};
use crate::models::attempt::{AnswerRecord, NewAttempt};
use crate::models::question::{AnswerValue, Question};
use crate::models::test_series::default_duration;

/// Rejected interactions with a running session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a test session needs at least one question")]
    NoQuestions,

    #[error("a test session needs a positive duration")]
    ZeroDuration,

    #[error("question index {index} is out of range for {len} questions")]
    QuestionOutOfRange { index: usize, len: usize },

    #[error("option {option} has been eliminated for question {index}")]
    OptionEliminated { index: usize, option: usize },

    #[error("the session has already been submitted")]
    AlreadySubmitted,

    #[error("the session has been exited")]
    Closed,

    #[error("the pause allowance of this session is used up")]
    PauseLimitReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    Running,
    Paused,
    Expired,
    Submitted,
    Exited,
}

/// Result of one timer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing changed (paused, expired or submitting).
    Idle,
    Ticked,
    /// The countdown just reached zero. Reported once per session.
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "eliminated", rename_all = "snake_case")]
pub enum LifelineOutcome {
    Applied(BTreeSet<usize>),
    AlreadyUsed,
    /// The question has no discrete wrong options to hide. Not consumed.
    Unavailable,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionSettings {
    /// Seconds for the whole attempt. Defaults to two minutes per question.
    pub duration_seconds: Option<u32>,
    pub negative_marking: bool,
}

/// State of one in-progress attempt at a fixed question list.
///
/// Every mutation goes through `&mut self`; the owner serialises events
/// (ticks, answers, submit) so there is exactly one writer.
#[derive(Debug, Clone)]
pub struct ExamSession {
    test_series_id: Uuid,
    user_id: Uuid,
    questions: Arc<[Question]>,
    current_index: usize,
    answers: BTreeMap<usize, AnswerValue>,
    marked_for_review: BTreeSet<usize>,
    lifeline_used: BTreeSet<usize>,
    eliminated_options: BTreeMap<usize, BTreeSet<usize>>,
    duration: u32,
    time_left: u32,
    paused: bool,
    /// Seconds spent paused so far, capped by `MAX_PAUSE_SECONDS`.
    paused_seconds: u32,
    submitting: bool,
    closed: bool,
    negative_marking: bool,
}

impl ExamSession {
    pub fn new(
        test_series_id: Uuid,
        user_id: Uuid,
        questions: impl Into<Arc<[Question]>>,
        settings: SessionSettings,
    ) -> Result<Self, SessionError> {
        let questions = questions.into();
        if questions.is_empty() {
            return Err(SessionError::NoQuestions);
        }

        let duration = settings
            .duration_seconds
            .unwrap_or_else(|| default_duration(questions.len()));
        if duration == 0 {
            return Err(SessionError::ZeroDuration);
        }

        Ok(Self {
            test_series_id,
            user_id,
            questions,
            current_index: 0,
            answers: BTreeMap::new(),
            marked_for_review: BTreeSet::new(),
            lifeline_used: BTreeSet::new(),
            eliminated_options: BTreeMap::new(),
            duration,
            time_left: duration,
            paused: false,
            paused_seconds: 0,
            submitting: false,
            closed: false,
            negative_marking: settings.negative_marking,
        })
    }

    pub fn test_series_id(&self) -> Uuid {
        self.test_series_id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn questions(&self) -> &Arc<[Question]> {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> &Question {
        &self.questions[self.current_index]
    }

    pub fn answers(&self) -> &BTreeMap<usize, AnswerValue> {
        &self.answers
    }

    pub fn marked_for_review(&self) -> &BTreeSet<usize> {
        &self.marked_for_review
    }

    pub fn lifeline_used(&self) -> &BTreeSet<usize> {
        &self.lifeline_used
    }

    pub fn eliminated_options(&self) -> &BTreeMap<usize, BTreeSet<usize>> {
        &self.eliminated_options
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Pause time still available, in seconds.
    pub fn pause_left(&self) -> u32 {
        MAX_PAUSE_SECONDS.saturating_sub(self.paused_seconds)
    }

    pub fn negative_marking(&self) -> bool {
        self.negative_marking
    }

    pub fn scoring_policy(&self, scheme: MarkingScheme) -> ScoringPolicy {
        ScoringPolicy::new(scheme, self.negative_marking)
    }

    pub fn timer_state(&self) -> TimerState {
        if self.closed {
            TimerState::Exited
        } else if self.submitting {
            TimerState::Submitted
        } else if self.time_left == 0 {
            TimerState::Expired
        } else if self.paused {
            TimerState::Paused
        } else {
            TimerState::Running
        }
    }

    /// Advances the countdown by one second unless paused.
    ///
    /// Paused ticks draw from the pause allowance instead; once it is used
    /// up the session resumes on its own.
    pub fn tick(&mut self) -> TickOutcome {
        if self.submitting || self.closed || self.time_left == 0 {
            return TickOutcome::Idle;
        }

        if self.paused {
            self.paused_seconds = self.paused_seconds.saturating_add(1);
            if self.paused_seconds >= MAX_PAUSE_SECONDS {
                self.paused = false;
                tracing::info!(
                    test_series_id = %self.test_series_id,
                    user_id = %self.user_id,
                    "Pause allowance used up, resuming countdown"
                );
            }
            return TickOutcome::Idle;
        }

        self.time_left -= 1;
        if self.time_left == 0 {
            TickOutcome::Expired
        } else {
            TickOutcome::Ticked
        }
    }

    /// Flips between running and paused. Returns the new paused flag.
    pub fn toggle_pause(&mut self) -> Result<bool, SessionError> {
        self.ensure_open()?;
        if !self.paused && self.pause_left() == 0 {
            return Err(SessionError::PauseLimitReached);
        }
        self.paused = !self.paused;
        Ok(self.paused)
    }

    /// Records (or overwrites) the answer for a question. Allowed while paused.
    pub fn select_answer(&mut self, index: usize, answer: AnswerValue) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.ensure_index(index)?;

        if let Some(eliminated) = self.eliminated_options.get(&index) {
            if let Some(option) = answer
                .chosen_options()
                .into_iter()
                .find(|option| eliminated.contains(option))
            {
                return Err(SessionError::OptionEliminated { index, option });
            }
        }

        self.answers.insert(index, answer);
        Ok(())
    }

    pub fn clear_answer(&mut self, index: usize) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.ensure_index(index)?;
        self.answers.remove(&index);
        Ok(())
    }

    /// Returns whether the question is now marked.
    pub fn toggle_mark_for_review(&mut self, index: usize) -> Result<bool, SessionError> {
        self.ensure_open()?;
        self.ensure_index(index)?;

        if self.marked_for_review.remove(&index) {
            Ok(false)
        } else {
            self.marked_for_review.insert(index);
            Ok(true)
        }
    }

    /// Moves to a question, clamping to the valid range. Returns the new index.
    pub fn navigate(&mut self, index: usize) -> Result<usize, SessionError> {
        self.ensure_open()?;
        self.current_index = index.min(self.questions.len() - 1);
        Ok(self.current_index)
    }

    /// Hides up to two wrong options of a question, once per question.
    pub fn use_lifeline<R: Rng + ?Sized>(
        &mut self,
        index: usize,
        rng: &mut R,
    ) -> Result<LifelineOutcome, SessionError> {
        self.ensure_open()?;
        self.ensure_index(index)?;

        if self.lifeline_used.contains(&index) {
            return Ok(LifelineOutcome::AlreadyUsed);
        }

        let wrong = self.questions[index].wrong_option_indices();
        if wrong.is_empty() {
            return Ok(LifelineOutcome::Unavailable);
        }

        let amount = LIFELINE_ELIMINATIONS.min(wrong.len());
        let eliminated: BTreeSet<usize> = index::sample(rng, wrong.len(), amount)
            .into_iter()
            .map(|i| wrong[i])
            .collect();

        self.eliminated_options.insert(index, eliminated.clone());
        self.lifeline_used.insert(index);
        Ok(LifelineOutcome::Applied(eliminated))
    }

    /// Starts submission and scores the attempt. Only the first call
    /// returns the attempt; later calls are no-ops.
    pub fn begin_submit(&mut self, scheme: MarkingScheme) -> Option<NewAttempt> {
        if self.submitting || self.closed {
            return None;
        }
        self.submitting = true;

        let policy = self.scoring_policy(scheme);
        let mut raw_score = 0.0;
        let mut answers = Vec::with_capacity(self.questions.len());

        for (index, question) in self.questions.iter().enumerate() {
            let selected = self.answers.get(&index).cloned();
            let is_correct = selected
                .as_ref()
                .is_some_and(|answer| question.is_correct(answer));

            let outcome = Outcome::classify(question, selected.as_ref(), Some(is_correct));
            raw_score += policy.contribution(question, outcome);

            answers.push(AnswerRecord {
                question_id: question.id.clone(),
                selected_option: selected,
                is_correct: Some(is_correct),
            });
        }

        let score = clamp_score(raw_score);
        let time_taken = self.duration - self.time_left;

        tracing::info!(
            test_series_id = %self.test_series_id,
            user_id = %self.user_id,
            score,
            time_taken,
            "Session submitted"
        );

        Some(NewAttempt {
            user_id: self.user_id,
            test_series_id: self.test_series_id,
            score,
            total_questions: i32::try_from(self.questions.len()).unwrap_or(i32::MAX),
            time_taken: i32::try_from(time_taken).unwrap_or(i32::MAX),
            answers,
        })
    }

    /// Ends the session without scoring it. Nothing can be submitted afterwards.
    pub fn close(&mut self) {
        self.closed = true;
        self.paused = false;
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        if self.submitting {
            return Err(SessionError::AlreadySubmitted);
        }
        Ok(())
    }

    fn ensure_index(&self, index: usize) -> Result<(), SessionError> {
        if index >= self.questions.len() {
            return Err(SessionError::QuestionOutOfRange {
                index,
                len: self.questions.len(),
            });
        }
        Ok(())
    }
}
