// src/exam/registry.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use uuid::Uuid;

use crate::config::{FINISHED_RETENTION, SWEEP_INTERVAL, TICK_INTERVAL, UNSAVED_RETENTION};
use crate::exam::controller::ExamController;
use crate::exam::marking::{MarkingScheme, ScoringPolicy};
use crate::exam::result::{ResultStatistics, compute_statistics};
use crate::exam::session::{ExamSession, TickOutcome};
use crate::models::attempt::TestAttempt;
use crate::models::question::Question;
use crate::store::SharedStore;

pub type LiveSession = Arc<tokio::sync::Mutex<ExamController>>;

/// A submitted session kept for its result screen.
#[derive(Debug, Clone)]
pub struct FinishedSession {
    pub attempt: TestAttempt,
    pub questions: Arc<[Question]>,
    pub policy: ScoringPolicy,
    pub finished_at: Instant,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionResult {
    pub attempt: TestAttempt,
    /// False when the attempt could not be stored and only exists here.
    pub saved: bool,
    pub statistics: ResultStatistics,
}

impl FinishedSession {
    /// Stored attempts can be rescored from the store later, local ones cannot.
    pub fn retention(&self) -> Duration {
        if self.attempt.is_local() {
            UNSAVED_RETENTION
        } else {
            FINISHED_RETENTION
        }
    }

    pub fn result(&self) -> SessionResult {
        SessionResult {
            saved: !self.attempt.is_local(),
            statistics: compute_statistics(&self.attempt, &self.questions, &self.policy),
            attempt: self.attempt.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Exited,
    NotOwner,
    /// Unknown, already exited, or already submitted.
    NotLive,
}

/// Live sessions by id, plus the results of sessions that finished.
///
/// The maps are only locked for lookups and inserts, never across an await.
/// Each controller sits behind its own async mutex, which serialises ticks,
/// interactions and submit for that session.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    live: Arc<Mutex<HashMap<Uuid, LiveSession>>>,
    finished: Arc<Mutex<HashMap<Uuid, FinishedSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new session. Its completion moves it from live to finished.
    pub fn start(&self, session: ExamSession, scheme: MarkingScheme, store: SharedStore) -> Uuid {
        let id = Uuid::new_v4();
        let questions = session.questions().clone();
        let policy = session.scoring_policy(scheme);

        let live = self.live.clone();
        let finished = self.finished.clone();
        let on_complete = Box::new(move |attempt: TestAttempt| {
            tracing::info!(session_id = %id, attempt_id = %attempt.id, "Session finished");
            finished
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(
                    id,
                    FinishedSession {
                        attempt,
                        questions,
                        policy,
                        finished_at: Instant::now(),
                    },
                );
            live.lock().unwrap_or_else(PoisonError::into_inner).remove(&id);
        });

        let controller = ExamController::new(session, scheme, store, on_complete);
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(tokio::sync::Mutex::new(controller)));

        tracing::info!(session_id = %id, "Session started");
        id
    }

    pub fn get(&self, id: Uuid) -> Option<LiveSession> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    pub fn finished(&self, id: Uuid) -> Option<FinishedSession> {
        self.finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn finished_count(&self) -> usize {
        self.finished.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Drops finished results past their retention. Returns how many went.
    pub fn sweep_finished(&self) -> usize {
        let now = Instant::now();
        let mut finished = self.finished.lock().unwrap_or_else(PoisonError::into_inner);

        let before = finished.len();
        finished.retain(|_, f| now.duration_since(f.finished_at) < f.retention());
        before - finished.len()
    }

    /// Periodically sweeps finished results for the lifetime of the server.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + SWEEP_INTERVAL, SWEEP_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                let removed = registry.sweep_finished();
                if removed > 0 {
                    tracing::debug!(removed, "Swept finished sessions");
                }
            }
        })
    }

    /// Ends a live session of `user_id` without scoring it.
    ///
    /// The controller is closed under its lock before the entry goes, so a
    /// ticker already waiting on that lock cannot submit it afterwards.
    pub async fn exit(&self, id: Uuid, user_id: Uuid) -> ExitOutcome {
        let Some(live) = self.get(id) else {
            return ExitOutcome::NotLive;
        };
        let mut controller = live.lock().await;

        if controller.session().user_id() != user_id {
            return ExitOutcome::NotOwner;
        }
        if controller.session().is_submitting() || controller.session().is_closed() {
            return ExitOutcome::NotLive;
        }

        controller.exit();
        self.live.lock().unwrap_or_else(PoisonError::into_inner).remove(&id);
        ExitOutcome::Exited
    }

    /// Drives the countdown of a session once per second and submits it
    /// when time runs out. Stops once the session is gone, submitting or exited.
    pub fn spawn_ticker(&self, id: Uuid) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                let Some(live) = registry.get(id) else {
                    break;
                };
                let mut controller = live.lock().await;

                match controller.tick() {
                    TickOutcome::Expired => {
                        tracing::info!(session_id = %id, "Time is up, submitting");
                        controller.submit().await;
                        break;
                    }
                    _ if controller.session().is_submitting() || controller.session().is_closed() => break,
                    _ => {}
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exam::session::SessionSettings;
    use crate::models::question::{AnswerValue, QuestionKind};
    use crate::config::MAX_PAUSE_SECONDS;
    use crate::store::MemoryStore;

    fn session(duration: u32) -> ExamSession {
        let questions = vec![Question {
            id: "q0".to_string(),
            prompt: "?".to_string(),
            topic: None,
            marks: None,
            negative_marks: None,
            kind: QuestionKind::SingleCorrect {
                options: vec!["a".into(), "b".into()],
                correct_answer: Some(1),
            },
        }];
        ExamSession::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            questions,
            SessionSettings {
                duration_seconds: Some(duration),
                negative_marking: false,
            },
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_submits_on_expiry() {
        let store = Arc::new(MemoryStore::new());
        let registry = SessionRegistry::new();
        let id = registry.start(session(3), MarkingScheme::FLAT, store.clone());

        registry
            .get(id)
            .unwrap()
            .lock()
            .await
            .select_answer(0, AnswerValue::Choice(1))
            .unwrap();

        let ticker = registry.spawn_ticker(id);
        tokio::time::sleep(Duration::from_secs(5)).await;
        ticker.await.unwrap();

        assert!(registry.get(id).is_none());
        let finished = registry.finished(id).unwrap();
        assert_eq!(finished.attempt.time_taken, 3);
        assert_eq!(finished.attempt.score, Some(1.0));
        assert_eq!(store.save_calls(), 1);

        let result = finished.result();
        assert!(result.saved);
        assert_eq!(result.statistics.correct, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_respects_pause() {
        let store = Arc::new(MemoryStore::new());
        let registry = SessionRegistry::new();
        let id = registry.start(session(10), MarkingScheme::FLAT, store);
        let ticker = registry.spawn_ticker(id);

        tokio::time::sleep(Duration::from_millis(2500)).await;
        let live = registry.get(id).unwrap();
        live.lock().await.toggle_pause().unwrap();
        let paused_at = live.lock().await.session().time_left();

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(live.lock().await.session().time_left(), paused_at);
        assert!(registry.finished(id).is_none());

        ticker.abort();
    }

    #[tokio::test]
    async fn test_manual_submit_moves_to_finished() {
        let store = Arc::new(MemoryStore::new());
        let registry = SessionRegistry::new();
        let id = registry.start(session(60), MarkingScheme::FLAT, store.clone());

        let live = registry.get(id).unwrap();
        assert!(live.lock().await.submit().await.is_some());
        assert!(live.lock().await.submit().await.is_none());

        assert_eq!(registry.live_count(), 0);
        assert!(registry.finished(id).is_some());
        assert_eq!(store.save_calls(), 1);
    }

    #[tokio::test]
    async fn test_exit_discards_without_saving() {
        let store = Arc::new(MemoryStore::new());
        let registry = SessionRegistry::new();
        let session = session(60);
        let user_id = session.user_id();
        let id = registry.start(session, MarkingScheme::FLAT, store.clone());

        assert_eq!(registry.exit(id, Uuid::new_v4()).await, ExitOutcome::NotOwner);
        assert_eq!(registry.exit(id, user_id).await, ExitOutcome::Exited);
        assert_eq!(registry.exit(id, user_id).await, ExitOutcome::NotLive);
        assert!(registry.get(id).is_none());
        assert!(registry.finished(id).is_none());
        assert_eq!(store.save_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_stops_a_ticker_waiting_on_the_session() {
        let store = Arc::new(MemoryStore::new());
        let registry = SessionRegistry::new();
        let session = session(1);
        let user_id = session.user_id();
        let id = registry.start(session, MarkingScheme::FLAT, store.clone());
        let ticker = registry.spawn_ticker(id);

        let live = registry.get(id).unwrap();
        let guard = live.lock().await;

        // Exit queues on the session lock first, then the expiring tick queues behind it.
        let exiting = tokio::spawn({
            let registry = registry.clone();
            async move { registry.exit(id, user_id).await }
        });
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(1500)).await;
        drop(guard);

        assert_eq!(exiting.await.unwrap(), ExitOutcome::Exited);
        tokio::time::sleep(Duration::from_secs(3)).await;
        ticker.await.unwrap();

        assert_eq!(store.save_calls(), 0);
        assert!(registry.finished(id).is_none());
        assert_eq!(registry.live_count(), 0);
        assert!(live.lock().await.session().is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_session_still_expires() {
        let store = Arc::new(MemoryStore::new());
        let registry = SessionRegistry::new();
        let id = registry.start(session(10), MarkingScheme::FLAT, store.clone());
        registry.get(id).unwrap().lock().await.toggle_pause().unwrap();
        let ticker = registry.spawn_ticker(id);

        tokio::time::sleep(Duration::from_secs(u64::from(MAX_PAUSE_SECONDS) + 15)).await;
        ticker.await.unwrap();

        assert_eq!(registry.live_count(), 0);
        let finished = registry.finished(id).unwrap();
        assert_eq!(finished.attempt.time_taken, 10);
        assert_eq!(store.save_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_drops_expired_results() {
        let store = Arc::new(MemoryStore::new());
        let registry = SessionRegistry::new();

        let saved = registry.start(session(60), MarkingScheme::FLAT, store.clone());
        registry.get(saved).unwrap().lock().await.submit().await.unwrap();

        store.fail_saves(true);
        let local = registry.start(session(60), MarkingScheme::FLAT, store.clone());
        registry.get(local).unwrap().lock().await.submit().await.unwrap();

        assert_eq!(registry.finished_count(), 2);
        assert_eq!(registry.sweep_finished(), 0);

        tokio::time::advance(FINISHED_RETENTION + Duration::from_secs(1)).await;
        assert_eq!(registry.sweep_finished(), 1);
        assert!(registry.finished(saved).is_none());
        assert!(!registry.finished(local).unwrap().result().saved);

        tokio::time::advance(UNSAVED_RETENTION).await;
        assert_eq!(registry.sweep_finished(), 1);
        assert_eq!(registry.finished_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_periodically() {
        let store = Arc::new(MemoryStore::new());
        let registry = SessionRegistry::new();
        let id = registry.start(session(60), MarkingScheme::FLAT, store);
        registry.get(id).unwrap().lock().await.submit().await.unwrap();

        let sweeper = registry.spawn_sweeper();
        tokio::time::sleep(FINISHED_RETENTION + SWEEP_INTERVAL * 2).await;

        assert_eq!(registry.finished_count(), 0);
        sweeper.abort();
    }
}
