//! Per-question answer state and the submission state machine.
//!
//! `Unanswered -> Answered -> Submitted`. Submitted is terminal unless the
//! attempt policy allows a retry, in which case a new selection reopens the
//! question and the earlier attempt is kept as history.

use serde::{Deserialize, Serialize};

use crate::grading::GradingResult;
use crate::label::Label;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionPhase {
    Unanswered,
    Answered,
    Submitted,
}

/// What happens to a selection made after submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptPolicy {
    #[default]
    LockedAfterSubmit,
    AllowRetry,
}

/// Why a state change was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerRejection {
    NoSuchSlot,
    Locked,
}

/// Selections for one question, keyed by slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerState {
    selections: Vec<Option<Label>>,
    phase: QuestionPhase,
    /// Recorded results of previous submissions, oldest first.
    attempts: Vec<GradingResult>,
}

impl AnswerState {
    pub fn new(slots: usize) -> Self {
        Self {
            selections: vec![None; slots],
            phase: QuestionPhase::Unanswered,
            attempts: Vec::new(),
        }
    }

    pub fn phase(&self) -> QuestionPhase {
        self.phase
    }

    pub fn selections(&self) -> &[Option<Label>] {
        &self.selections
    }

    pub fn selection(&self, slot: usize) -> Option<Label> {
        self.selections.get(slot).copied().flatten()
    }

    pub fn slot_count(&self) -> usize {
        self.selections.len()
    }

    /// Set (or with `None`, clear) the selection for a slot.
    pub fn select(
        &mut self,
        slot: usize,
        label: Option<Label>,
        policy: AttemptPolicy,
    ) -> Result<(), AnswerRejection> {
        if slot >= self.selections.len() {
            return Err(AnswerRejection::NoSuchSlot);
        }
        if self.phase == QuestionPhase::Submitted && policy == AttemptPolicy::LockedAfterSubmit {
            return Err(AnswerRejection::Locked);
        }
        self.selections[slot] = label;
        self.phase = if self.selections.iter().any(Option::is_some) {
            QuestionPhase::Answered
        } else {
            QuestionPhase::Unanswered
        };
        Ok(())
    }

    /// The result of the last submission, if the question is still submitted.
    pub fn submitted_result(&self) -> Option<&GradingResult> {
        match self.phase {
            QuestionPhase::Submitted => self.attempts.last(),
            _ => None,
        }
    }

    pub fn attempts(&self) -> &[GradingResult] {
        &self.attempts
    }

    pub(crate) fn record_submission(&mut self, result: GradingResult) {
        self.attempts.push(result);
        self.phase = QuestionPhase::Submitted;
    }
}
