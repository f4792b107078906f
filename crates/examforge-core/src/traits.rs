//! Collaborator interfaces for speech, images, and question generation.
//!
//! These async traits are implemented by the `examforge-providers` crate.
//! Every call is fallible; the engine degrades rather than aborting.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CollaboratorError;
use crate::tier::Tier;

// ---------------------------------------------------------------------------
// Speech
// ---------------------------------------------------------------------------

/// Speaker voice for synthesized audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    Female,
    Male,
}

impl Voice {
    /// Dialogue turns alternate voices, starting with the female speaker.
    pub fn for_turn(turn: usize) -> Self {
        if turn % 2 == 0 {
            Voice::Female
        } else {
            Voice::Male
        }
    }
}

impl std::fmt::Display for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Voice::Female => write!(f, "female"),
            Voice::Male => write!(f, "male"),
        }
    }
}

/// Request to turn one utterance into audio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    pub tier: Tier,
    pub voice: Voice,
    /// Speaking-rate adjustment in percent, e.g. `-25`.
    pub rate_percent: i8,
}

/// Opaque reference to synthesized audio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioHandle {
    /// Location the front end can play from.
    pub uri: String,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

/// Text-to-speech backend.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    async fn synthesize(&self, request: &SpeechRequest) -> Result<AudioHandle, CollaboratorError>;
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// Image generation backend. `Ok(None)` means "use a placeholder".
#[async_trait]
pub trait ImageSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    async fn synthesize(&self, description: &str) -> Result<Option<Vec<u8>>, CollaboratorError>;
}

// ---------------------------------------------------------------------------
// Question generation
// ---------------------------------------------------------------------------

/// What to ask a generator for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub tier: Tier,
    pub category: String,
    pub type_names: Vec<String>,
    pub count: usize,
}

/// Produces raw question-set text, usually JSON from a language model.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<String, CollaboratorError>;
}

/// Pull question records out of a generator response.
///
/// Tries the whole text as JSON, then the first fenced ```json block, then
/// the outermost `{...}` span. Accepts `{"questions": [...]}` or a bare array.
pub fn extract_json_payload(raw: &str) -> Result<Vec<Value>, CollaboratorError> {
    let candidates = [
        Some(raw.trim()),
        fenced_block(raw),
        outermost_braces(raw),
    ];
    let mut last_error = String::from("empty response");
    for candidate in candidates.into_iter().flatten() {
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) => return records_from(value),
            Err(e) => last_error = e.to_string(),
        }
    }
    Err(CollaboratorError::Parse(last_error))
}

pub(crate) fn records_from(value: Value) -> Result<Vec<Value>, CollaboratorError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("questions") {
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(CollaboratorError::Parse(
                "`questions` is not an array".into(),
            )),
            None if map.contains_key("type") => Ok(vec![Value::Object(map)]),
            None => Err(CollaboratorError::Parse(
                "no `questions` array in response".into(),
            )),
        },
        _ => Err(CollaboratorError::Parse(
            "response is neither an object nor an array".into(),
        )),
    }
}

fn fenced_block(raw: &str) -> Option<&str> {
    let start = raw.find("```json").map(|i| i + "```json".len())?;
    let body = &raw[start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

fn outermost_braces(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}
