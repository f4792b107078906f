//! Grading results. Derived from records and answer state, never stored as
//! the source of truth.

use serde::{Deserialize, Serialize};

use crate::label::Label;
use crate::shape::Shape;

/// How one answer slot was judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Correct,
    Incorrect,
    /// The answer key could not be resolved; excluded from `graded`.
    Ungraded,
}

/// Result for a single slot: a sub-question, gap, position, or stimulus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    pub question_index: usize,
    pub slot: usize,
    pub shape: Shape,
    /// Canonical label the learner chose, if any.
    pub user_answer: Option<Label>,
    /// Canonical answer key, if it could be resolved.
    pub correct_answer: Option<Label>,
    pub outcome: Outcome,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl ItemResult {
    pub fn is_correct(&self) -> bool {
        self.outcome == Outcome::Correct
    }
}

/// Aggregate over any number of items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradingResult {
    pub correct_count: usize,
    /// Items with a resolvable answer key.
    pub graded: usize,
    pub total: usize,
    pub items: Vec<ItemResult>,
}

impl GradingResult {
    pub fn from_items(items: Vec<ItemResult>) -> Self {
        let mut result = Self::default();
        result.extend(items);
        result
    }

    pub fn extend(&mut self, items: impl IntoIterator<Item = ItemResult>) {
        for item in items {
            self.total += 1;
            match item.outcome {
                Outcome::Correct => {
                    self.correct_count += 1;
                    self.graded += 1;
                }
                Outcome::Incorrect => self.graded += 1,
                Outcome::Ungraded => {}
            }
            self.items.push(item);
        }
    }

    pub fn merge(&mut self, other: GradingResult) {
        self.extend(other.items);
    }

    /// Share of graded items answered correctly, `None` if nothing was graded.
    pub fn accuracy(&self) -> Option<f64> {
        (self.graded > 0).then(|| self.correct_count as f64 / self.graded as f64)
    }

    pub fn incorrect(&self) -> impl Iterator<Item = &ItemResult> {
        self.items
            .iter()
            .filter(|i| i.outcome == Outcome::Incorrect)
    }

    pub fn ungraded(&self) -> usize {
        self.total - self.graded
    }
}

/// Judge one slot against its key. A missing selection is wrong, a missing
/// key is ungraded.
pub fn judge(selected: Option<Label>, key: Option<Label>) -> Outcome {
    match (selected, key) {
        (_, None) => Outcome::Ungraded,
        (Some(s), Some(k)) if s == k => Outcome::Correct,
        _ => Outcome::Incorrect,
    }
}
