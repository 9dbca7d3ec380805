// src/exam/controller.rs

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::exam::marking::MarkingScheme;
use crate::exam::session::{ExamSession, LifelineOutcome, SessionError, TickOutcome};
use crate::models::attempt::TestAttempt;
use crate::models::question::AnswerValue;
use crate::store::SharedStore;

/// Called once with the finalized attempt.
pub type CompletionCallback = Box<dyn FnOnce(TestAttempt) + Send + 'static>;

/// Drives one session from start to a finalized, persisted attempt.
///
/// The controller owns the random source used by lifelines and hands the
/// scored attempt to the store on submit. A failed save never loses the
/// result: a local attempt is built from the same fields instead.
pub struct ExamController {
    session: ExamSession,
    scheme: MarkingScheme,
    store: SharedStore,
    rng: StdRng,
    on_complete: Option<CompletionCallback>,
}

impl ExamController {
    pub fn new(
        session: ExamSession,
        scheme: MarkingScheme,
        store: SharedStore,
        on_complete: CompletionCallback,
    ) -> Self {
        Self {
            session,
            scheme,
            store,
            rng: StdRng::from_os_rng(),
            on_complete: Some(on_complete),
        }
    }

    /// Replaces the random source, e.g. with a seeded one.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn session(&self) -> &ExamSession {
        &self.session
    }

    pub fn tick(&mut self) -> TickOutcome {
        self.session.tick()
    }

    pub fn toggle_pause(&mut self) -> Result<bool, SessionError> {
        self.session.toggle_pause()
    }

    pub fn select_answer(&mut self, index: usize, answer: AnswerValue) -> Result<(), SessionError> {
        self.session.select_answer(index, answer)
    }

    pub fn clear_answer(&mut self, index: usize) -> Result<(), SessionError> {
        self.session.clear_answer(index)
    }

    pub fn toggle_mark_for_review(&mut self, index: usize) -> Result<bool, SessionError> {
        self.session.toggle_mark_for_review(index)
    }

    pub fn navigate(&mut self, index: usize) -> Result<usize, SessionError> {
        self.session.navigate(index)
    }

    pub fn use_lifeline(&mut self, index: usize) -> Result<LifelineOutcome, SessionError> {
        self.session.use_lifeline(index, &mut self.rng)
    }

    /// Scores and persists the attempt.
    ///
    /// Returns `None` when a submit already started. At most one save call
    /// is made per session and there is no retry.
    pub async fn submit(&mut self) -> Option<TestAttempt> {
        let submission = self.session.begin_submit(self.scheme)?;

        let attempt = match self.store.save_attempt(submission.clone()).await {
            Ok(saved) => saved,
            Err(e) => {
                tracing::warn!(
                    test_series_id = %submission.test_series_id,
                    "Failed to save test attempt, keeping a local copy: {}",
                    e
                );
                submission.into_local_attempt()
            }
        };

        if let Some(on_complete) = self.on_complete.take() {
            on_complete(attempt.clone());
        }

        Some(attempt)
    }

    /// Abandons the session without scoring or saving anything.
    ///
    /// The session is closed in place, so a tick or submit that was already
    /// waiting on this controller finds nothing to do.
    pub fn exit(&mut self) {
        self.session.close();
        self.on_complete = None;

        tracing::info!(
            test_series_id = %self.session.test_series_id(),
            user_id = %self.session.user_id(),
            answered = self.session.answers().len(),
            "Session exited without submitting"
        );
    }
}
