//! Error taxonomy for examforge.
//!
//! Collaborator errors are defined here so the engine can classify them for
//! retry and degradation decisions without string matching.

use thiserror::Error;

use crate::label::Label;

/// A question record is missing a field its shape requires, or carries it
/// with the wrong type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// A required field is absent.
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },

    /// A field is present but has an unusable type.
    #[error("field `{field}` has the wrong type, expected {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    /// A required list is present but holds nothing usable.
    #[error("field `{field}` is empty")]
    Empty { field: &'static str },

    /// The record is not a JSON object.
    #[error("record is not an object")]
    NotAnObject,

    /// No shape is configured for the type and none can be inferred from
    /// the record structure.
    #[error("cannot determine a question shape for type `{type_name}`")]
    UnknownShape { type_name: String },
}

/// Errors that can occur when calling an external collaborator
/// (speech synthesis, image generation, question generation).
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    /// The service rejected or failed the synthesis request.
    #[error("synthesis failed: {0}")]
    SynthesisFailed(String),

    /// The collaborator is not configured or cannot be reached.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    /// The service returned a rate-limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// The response could not be parsed into question records.
    #[error("could not parse generated payload: {0}")]
    Parse(String),
}

impl CollaboratorError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            CollaboratorError::Unavailable(_) | CollaboratorError::Parse(_)
        )
    }

    /// Returns the retry-after delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            CollaboratorError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

/// Static configuration could not be turned into a usable table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A weight row does not sum to one or holds a negative entry.
    #[error("weights for tier {tier} are invalid: {reason}")]
    InvalidWeights { tier: u8, reason: String },

    /// A tier key could not be parsed.
    #[error("invalid tier key: {0}")]
    InvalidTier(String),

    /// A shape name in the `[shapes]` table is not one of the known shapes.
    #[error("unknown shape `{shape}` for type `{type_name}`")]
    UnknownShape { type_name: String, shape: String },
}

/// Errors surfaced by session operations on the assessment engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// No question exists at this index.
    #[error("no question at index {0}")]
    NoSuchQuestion(usize),

    /// The record at this index was rejected during loading.
    #[error("question {index} was rejected: {reason}")]
    Rejected { index: usize, reason: String },

    /// The question has no answer slot with this number.
    #[error("question {index} has no slot {slot}")]
    NoSuchSlot { index: usize, slot: usize },

    /// The question was already submitted and re-attempts are disabled.
    #[error("question {0} is locked after submission")]
    Locked(usize),

    /// A canonical label names no option of the slot's choice set.
    #[error("question {index} slot {slot} has {options} options, label {label} is out of range")]
    LabelOutOfRange {
        index: usize,
        slot: usize,
        label: Label,
        options: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_permanence() {
        assert!(CollaboratorError::Unavailable("off".into()).is_permanent());
        assert!(CollaboratorError::Parse("bad".into()).is_permanent());
        assert!(!CollaboratorError::Timeout(5).is_permanent());
        assert!(!CollaboratorError::Network("reset".into()).is_permanent());
    }

    #[test]
    fn rate_limit_hint() {
        let err = CollaboratorError::RateLimited {
            retry_after_ms: 1500,
        };
        assert_eq!(err.retry_after_ms(), Some(1500));
        assert_eq!(err.to_string(), "rate limited, retry after 1500ms");
        assert_eq!(CollaboratorError::Timeout(3).retry_after_ms(), None);
    }
}
