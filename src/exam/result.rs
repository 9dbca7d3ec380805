// src/exam/result.rs

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::exam::marking::{MarkingScheme, Outcome, ScoringPolicy, clamp_score};
use crate::models::attempt::{AnswerRecord, TestAttempt};
use crate::models::question::{AnswerValue, Question};
use crate::models::test_series::QuestionSet;
use crate::store::TestSeriesStore;

/// Qualitative band of a percentage score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceLabel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl PerformanceLabel {
    pub fn from_percentage(percentage: i64) -> Self {
        match percentage {
            p if p >= 80 => PerformanceLabel::Excellent,
            p if p >= 60 => PerformanceLabel::Good,
            p if p >= 40 => PerformanceLabel::Fair,
            _ => PerformanceLabel::Poor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionResult {
    pub question_id: String,
    pub topic: String,
    pub outcome: Outcome,
    pub selected_option: Option<AnswerValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicScore {
    pub topic: String,
    pub score: f64,
}

/// Display statistics of a finished attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultStatistics {
    pub total_questions: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub unattempted: usize,
    /// Percentage of attempted questions answered correctly.
    pub accuracy: i64,
    pub avg_time_per_question: i64,
    pub current_score: f64,
    pub max_score: f64,
    pub percentage: i64,
    pub performance: PerformanceLabel,
    pub topic_scores: Vec<TopicScore>,
    pub questions: Vec<QuestionResult>,
}

/// Rounds half up, like `Math.round`.
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Recomputes statistics for an attempt over its question set.
///
/// Neither input is modified. Every ratio is 0 when its denominator is 0,
/// so an empty question set yields all-zero statistics.
pub fn compute_statistics(attempt: &TestAttempt, questions: &[Question], policy: &ScoringPolicy) -> ResultStatistics {
    let records: HashMap<&str, &AnswerRecord> = attempt
        .answers
        .iter()
        .map(|record| (record.question_id.as_str(), record))
        .collect();

    let mut correct = 0;
    let mut incorrect = 0;
    let mut unattempted = 0;
    let mut recomputed = 0.0;
    let mut topics: BTreeMap<String, f64> = BTreeMap::new();
    let mut results = Vec::with_capacity(questions.len());

    for question in questions {
        let record = records.get(question.id.as_str());
        let selected = record.and_then(|r| r.selected_option.as_ref());
        let outcome = Outcome::classify(question, selected, record.and_then(|r| r.is_correct));

        match outcome {
            Outcome::Correct => correct += 1,
            Outcome::Incorrect => incorrect += 1,
            Outcome::Unattempted => unattempted += 1,
        }

        let contribution = policy.contribution(question, outcome);
        recomputed += contribution;
        *topics.entry(question.topic_or_default().to_string()).or_insert(0.0) += contribution;

        results.push(QuestionResult {
            question_id: question.id.clone(),
            topic: question.topic_or_default().to_string(),
            outcome,
            selected_option: selected.cloned(),
        });
    }

    let total_questions = questions.len();
    let attempted = correct + incorrect;
    let accuracy = if attempted == 0 {
        0
    } else {
        round_half_up(correct as f64 / attempted as f64 * 100.0)
    };

    let avg_time_per_question = if total_questions == 0 {
        0
    } else {
        round_half_up(f64::from(attempt.time_taken) / total_questions as f64)
    };

    let current_score = attempt.score.unwrap_or_else(|| clamp_score(recomputed));
    let max_score = policy.max_score(questions);
    let percentage = if max_score == 0.0 {
        0
    } else {
        round_half_up(current_score / max_score * 100.0)
    };

    ResultStatistics {
        total_questions,
        correct,
        incorrect,
        unattempted,
        accuracy,
        avg_time_per_question,
        current_score,
        max_score,
        percentage,
        performance: PerformanceLabel::from_percentage(percentage),
        topic_scores: topics
            .into_iter()
            .map(|(topic, score)| TopicScore { topic, score })
            .collect(),
        questions: results,
    }
}

/// Statistics view over a stored attempt whose question set may still
/// need fetching. Stays in the loading state until resolved.
pub struct ResultScorer {
    attempt: TestAttempt,
    scheme: MarkingScheme,
    statistics: Option<ResultStatistics>,
}

impl ResultScorer {
    /// Scorer that will fetch the question set by the attempt's test series id.
    pub fn loading(attempt: TestAttempt, scheme: MarkingScheme) -> Self {
        Self {
            attempt,
            scheme,
            statistics: None,
        }
    }

    /// Scorer over a question set supplied directly. Ready immediately.
    pub fn with_question_set(attempt: TestAttempt, set: &QuestionSet, scheme: MarkingScheme) -> Self {
        let policy = ScoringPolicy::new(scheme, set.negative_marking);
        let statistics = compute_statistics(&attempt, &set.questions, &policy);
        Self {
            attempt,
            scheme,
            statistics: Some(statistics),
        }
    }

    pub fn attempt(&self) -> &TestAttempt {
        &self.attempt
    }

    pub fn is_loading(&self) -> bool {
        self.statistics.is_none()
    }

    pub fn statistics(&self) -> Option<&ResultStatistics> {
        self.statistics.as_ref()
    }

    /// Fetches the question set once. A failed fetch scores against an
    /// empty set instead of returning an error.
    pub async fn resolve(&mut self, store: &dyn TestSeriesStore) -> &ResultStatistics {
        let statistics = match self.statistics.take() {
            Some(statistics) => statistics,
            None => {
                let set = match store.load_question_set(self.attempt.test_series_id).await {
                    Ok(set) => set,
                    Err(e) => {
                        tracing::warn!(
                            test_series_id = %self.attempt.test_series_id,
                            "Failed to load question set for result: {}",
                            e
                        );
                        QuestionSet::default()
                    }
                };
                let policy = ScoringPolicy::new(self.scheme, set.negative_marking);
                compute_statistics(&self.attempt, &set.questions, &policy)
            }
        };
        self.statistics.insert(statistics)
    }

    pub fn into_parts(self) -> (TestAttempt, Option<ResultStatistics>) {
        (self.attempt, self.statistics)
    }
}
