// src/models/question.rs

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Topic used for aggregation when a question does not name one.
pub const DEFAULT_TOPIC: &str = "General";

/// Absolute tolerance applied to numerical answers that do not declare their own.
const NUMERIC_EPSILON: f64 = 1e-9;

/// A single question of a test series.
///
/// The envelope (`id`, `topic`, marking overrides) is shared by every kind;
/// the answer key lives in [`QuestionKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Stable identifier, used to match answers when an attempt is rescored.
    pub id: String,

    pub prompt: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    /// Marks awarded for a correct answer. Falls back to the marking scheme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks: Option<f64>,

    /// Marks deducted for a wrong answer when negative marking is on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_marks: Option<f64>,

    #[serde(flatten)]
    pub kind: QuestionKind,
}

/// Shape-specific payload of a question, tagged by `"type"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    SingleCorrect {
        options: Vec<String>,
        #[serde(default)]
        correct_answer: Option<usize>,
    },
    MultipleCorrect {
        options: Vec<String>,
        #[serde(default)]
        correct_answers: Vec<usize>,
    },
    Numerical {
        #[serde(default)]
        answer: Option<f64>,
        #[serde(default)]
        tolerance: f64,
    },
    MatrixMatch {
        left: Vec<String>,
        right: Vec<String>,
        /// Left label -> right label.
        #[serde(default)]
        mapping: BTreeMap<String, String>,
    },
    AssertionReason {
        assertion: String,
        reason: String,
        options: Vec<String>,
        #[serde(default)]
        correct_answer: Option<usize>,
    },
    Paragraph {
        passage: String,
        sub_questions: Vec<SubQuestion>,
    },
}

/// One item of a paragraph question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubQuestion {
    pub prompt: String,
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answer: Option<usize>,
}

/// A candidate's response to one question, tagged by `"kind"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    /// Index of a single chosen option.
    Choice(usize),
    /// Indices of every chosen option (multi-select).
    Choices(Vec<usize>),
    Number(f64),
    Matching(BTreeMap<String, String>),
    /// One optional choice per paragraph sub-question.
    SubAnswers(Vec<Option<usize>>),
}

impl AnswerValue {
    /// Option indices this answer selects, for kinds that select discrete options.
    pub fn chosen_options(&self) -> Vec<usize> {
        match self {
            AnswerValue::Choice(index) => vec![*index],
            AnswerValue::Choices(indices) => indices.clone(),
            _ => Vec::new(),
        }
    }
}

impl Question {
    pub fn topic_or_default(&self) -> &str {
        self.topic.as_deref().unwrap_or(DEFAULT_TOPIC)
    }

    /// Discrete options shown for this question. Empty for numerical,
    /// matrix and paragraph questions.
    pub fn options(&self) -> &[String] {
        match &self.kind {
            QuestionKind::SingleCorrect { options, .. }
            | QuestionKind::MultipleCorrect { options, .. }
            | QuestionKind::AssertionReason { options, .. } => options,
            _ => &[],
        }
    }

    /// Checks an answer against the key. A missing key or an answer of the
    /// wrong shape is never correct.
    pub fn is_correct(&self, answer: &AnswerValue) -> bool {
        match (&self.kind, answer) {
            (
                QuestionKind::SingleCorrect { correct_answer, .. }
                | QuestionKind::AssertionReason { correct_answer, .. },
                AnswerValue::Choice(chosen),
            ) => *correct_answer == Some(*chosen),

            (QuestionKind::MultipleCorrect { correct_answers, .. }, AnswerValue::Choices(chosen)) => {
                let expected: BTreeSet<usize> = correct_answers.iter().copied().collect();
                let chosen: BTreeSet<usize> = chosen.iter().copied().collect();
                !expected.is_empty() && expected == chosen
            }

            (QuestionKind::MultipleCorrect { correct_answers, .. }, AnswerValue::Choice(chosen)) => {
                correct_answers.contains(chosen)
            }

            (QuestionKind::Numerical { answer: Some(expected), tolerance }, AnswerValue::Number(given)) => {
                (given - expected).abs() <= tolerance.abs().max(NUMERIC_EPSILON)
            }

            (QuestionKind::MatrixMatch { mapping, .. }, AnswerValue::Matching(given)) => {
                !mapping.is_empty() && mapping == given
            }

            (QuestionKind::Paragraph { sub_questions, .. }, AnswerValue::SubAnswers(given)) => {
                !sub_questions.is_empty()
                    && sub_questions.len() == given.len()
                    && sub_questions.iter().zip(given).all(|(sub, chosen)| {
                        sub.correct_answer.is_some() && sub.correct_answer == *chosen
                    })
            }

            _ => false,
        }
    }

    /// Option indices known to be wrong. Empty when the question has no
    /// discrete options or its key is missing.
    pub fn wrong_option_indices(&self) -> Vec<usize> {
        match &self.kind {
            QuestionKind::SingleCorrect { options, correct_answer: Some(correct) }
            | QuestionKind::AssertionReason { options, correct_answer: Some(correct), .. } => {
                (0..options.len()).filter(|i| i != correct).collect()
            }
            QuestionKind::MultipleCorrect { options, correct_answers } if !correct_answers.is_empty() => {
                (0..options.len())
                    .filter(|i| !correct_answers.contains(i))
                    .collect()
            }
            _ => Vec::new(),
        }
    }
}

/// DTO for sending a question to the candidate (answer keys stripped).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: String,
    pub prompt: String,
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marks: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_marks: Option<f64>,
    #[serde(flatten)]
    pub kind: PublicQuestionKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PublicQuestionKind {
    SingleCorrect { options: Vec<String> },
    MultipleCorrect { options: Vec<String> },
    Numerical,
    MatrixMatch { left: Vec<String>, right: Vec<String> },
    AssertionReason { assertion: String, reason: String, options: Vec<String> },
    Paragraph { passage: String, sub_questions: Vec<PublicSubQuestion> },
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicSubQuestion {
    pub prompt: String,
    pub options: Vec<String>,
}

impl From<&Question> for PublicQuestion {
    fn from(question: &Question) -> Self {
        let kind = match &question.kind {
            QuestionKind::SingleCorrect { options, .. } => PublicQuestionKind::SingleCorrect {
                options: options.clone(),
            },
            QuestionKind::MultipleCorrect { options, .. } => PublicQuestionKind::MultipleCorrect {
                options: options.clone(),
            },
            QuestionKind::Numerical { .. } => PublicQuestionKind::Numerical,
            QuestionKind::MatrixMatch { left, right, .. } => PublicQuestionKind::MatrixMatch {
                left: left.clone(),
                right: right.clone(),
            },
            QuestionKind::AssertionReason { assertion, reason, options, .. } => {
                PublicQuestionKind::AssertionReason {
                    assertion: assertion.clone(),
                    reason: reason.clone(),
                    options: options.clone(),
                }
            }
            QuestionKind::Paragraph { passage, sub_questions } => PublicQuestionKind::Paragraph {
                passage: passage.clone(),
                sub_questions: sub_questions
                    .iter()
                    .map(|sub| PublicSubQuestion {
                        prompt: sub.prompt.clone(),
                        options: sub.options.clone(),
                    })
                    .collect(),
            },
        };

        PublicQuestion {
            id: question.id.clone(),
            prompt: question.prompt.clone(),
            topic: question.topic_or_default().to_string(),
            marks: question.marks,
            negative_marks: question.negative_marks,
            kind,
        }
    }
}
