// src/utils/html.rs

use crate::models::question::{Question, QuestionKind};

/// Clean HTML content using the ammonia library.
///
/// Whitelist-based: safe tags (like <b>, <sub>) survive, <script>, <iframe>
/// and event-handler attributes are stripped. Generated question text is
/// rendered as HTML by the client, so it goes through here before storage.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

fn clean_all(items: &mut [String]) {
    for item in items.iter_mut() {
        *item = clean_html(item);
    }
}

/// Sanitises every piece of text of a question that a client may render.
pub fn sanitize_question(mut question: Question) -> Question {
    question.prompt = clean_html(&question.prompt);
    question.topic = question.topic.as_deref().map(clean_html);

    match &mut question.kind {
        QuestionKind::SingleCorrect { options, .. } | QuestionKind::MultipleCorrect { options, .. } => {
            clean_all(options);
        }
        QuestionKind::Numerical { .. } => {}
        QuestionKind::MatrixMatch { left, right, .. } => {
            clean_all(left);
            clean_all(right);
        }
        QuestionKind::AssertionReason { assertion, reason, options, .. } => {
            *assertion = clean_html(assertion);
            *reason = clean_html(reason);
            clean_all(options);
        }
        QuestionKind::Paragraph { passage, sub_questions } => {
            *passage = clean_html(passage);
            for sub in sub_questions.iter_mut() {
                sub.prompt = clean_html(&sub.prompt);
                clean_all(&mut sub.options);
            }
        }
    }

    question
}
