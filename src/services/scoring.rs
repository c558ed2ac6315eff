//! Scoring rules for submitted answers.
//!
//! Objective questions are scored automatically at submission time. Essays
//! always start at zero and only change when a grader overwrites the
//! per-answer score. A submission's total is always the plain sum of its
//! per-answer scores.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::services::exam::QuestionKind;

/// Score a single answer against its question's key.
///
/// Multiple choice compares the stored strings exactly. Checkbox answers are
/// JSON arrays of option strings compared as sets, so order and duplicates
/// do not matter; anything unparseable scores zero.
#[must_use]
pub fn score_answer(kind: QuestionKind, correct_answer: Option<&str>, points: i32, answer: &str) -> i32 {
    let Some(correct) = correct_answer else {
        return 0;
    };
    let full_marks = match kind {
        QuestionKind::MultipleChoice => answer == correct,
        QuestionKind::MultipleCheckboxes => match (parse_selection(answer), parse_selection(correct)) {
            (Some(given), Some(expected)) => given == expected,
            _ => false,
        },
        QuestionKind::Essay => false,
    };
    if full_marks { points.max(0) } else { 0 }
}

/// Parse a checkbox selection stored as a JSON array of strings.
#[must_use]
pub fn parse_selection(raw: &str) -> Option<BTreeSet<String>> {
    serde_json::from_str::<Vec<String>>(raw)
        .ok()
        .map(|items| items.into_iter().collect())
}

/// Sum of per-answer scores.
#[must_use]
pub fn aggregate<I>(scores: I) -> i32
where
    I: IntoIterator<Item = i32>,
{
    scores.into_iter().sum()
}

/// Score as a percentage of the maximum. A zero maximum yields zero.
#[must_use]
pub fn percentage(score: i32, max_score: i32) -> f64 {
    if max_score <= 0 {
        return 0.0;
    }
    f64::from(score) * 100.0 / f64::from(max_score)
}

#[must_use]
pub fn passed(percent: f64, passing_score: i32) -> bool {
    percent >= f64::from(passing_score)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
    F,
}

impl LetterGrade {
    pub const ALL: [Self; 5] = [Self::A, Self::B, Self::C, Self::D, Self::F];

    #[must_use]
    pub fn from_percentage(percent: f64) -> Self {
        if percent >= 90.0 {
            Self::A
        } else if percent >= 80.0 {
            Self::B
        } else if percent >= 70.0 {
            Self::C
        } else if percent >= 60.0 {
            Self::D
        } else {
            Self::F
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }
}

#[cfg(test)]
#[path = "scoring_test.rs"]
mod tests;
