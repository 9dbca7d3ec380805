// src/exam/marking.rs

use serde::{Deserialize, Serialize};

use crate::models::question::{AnswerValue, Question};

/// Marks per correct answer and the magnitude deducted per wrong one.
///
/// The same scheme drives scoring at submit time and every later
/// recomputation from raw answers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkingScheme {
    pub correct: f64,
    pub incorrect: f64,
}

impl MarkingScheme {
    /// +1 per correct, -0.25 per wrong.
    pub const FLAT: Self = Self {
        correct: 1.0,
        incorrect: 0.25,
    };

    /// +4 per correct, -1 per wrong.
    pub const PLUS_FOUR_MINUS_ONE: Self = Self {
        correct: 4.0,
        incorrect: 1.0,
    };

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "flat" => Some(Self::FLAT),
            "plus_four_minus_one" | "jee" => Some(Self::PLUS_FOUR_MINUS_ONE),
            _ => None,
        }
    }
}

impl Default for MarkingScheme {
    fn default() -> Self {
        Self::FLAT
    }
}

/// How one question ended up in an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Correct,
    Incorrect,
    Unattempted,
}

impl Outcome {
    /// Classifies a response. An explicit correctness flag wins over the
    /// answer key; no selection means unattempted.
    pub fn classify(question: &Question, selected: Option<&AnswerValue>, explicit: Option<bool>) -> Self {
        let Some(selected) = selected else {
            return Outcome::Unattempted;
        };

        let correct = explicit.unwrap_or_else(|| question.is_correct(selected));
        if correct {
            Outcome::Correct
        } else {
            Outcome::Incorrect
        }
    }
}

/// A marking scheme plus whether wrong answers cost anything.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoringPolicy {
    pub scheme: MarkingScheme,
    pub negative_marking: bool,
}

impl ScoringPolicy {
    pub fn new(scheme: MarkingScheme, negative_marking: bool) -> Self {
        Self {
            scheme,
            negative_marking,
        }
    }

    pub fn marks_for(&self, question: &Question) -> f64 {
        question.marks.unwrap_or(self.scheme.correct)
    }

    pub fn penalty_for(&self, question: &Question) -> f64 {
        if !self.negative_marking {
            return 0.0;
        }
        question.negative_marks.unwrap_or(self.scheme.incorrect).abs()
    }

    /// Signed marks one question contributes to a total.
    pub fn contribution(&self, question: &Question, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Correct => self.marks_for(question),
            Outcome::Incorrect => -self.penalty_for(question),
            Outcome::Unattempted => 0.0,
        }
    }

    pub fn max_score(&self, questions: &[Question]) -> f64 {
        questions.iter().map(|q| self.marks_for(q)).sum()
    }
}

/// Aggregate scores are never reported below zero.
pub fn clamp_score(raw: f64) -> f64 {
    raw.max(0.0)
}
