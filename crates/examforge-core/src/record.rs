//! Raw question records and the field-access helpers normalization uses.
//!
//! Answer encodings vary between record producers: a bare label, a label
//! list, a concatenated label string, or the full option text. All of them
//! resolve to canonical [`Label`]s here. Anything that still does not
//! resolve becomes `None`, which grades as ungraded rather than wrong.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RecordError;
use crate::label::Label;
use crate::shape::{ChoiceOption, Shape};
use crate::tier::Tier;

/// A generated item as received: a `type` plus free-form fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl QuestionRecord {
    pub fn new(type_name: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            type_name: type_name.into(),
            fields,
        }
    }

    /// Accept any JSON value, rejecting non-objects and records without a
    /// string `type`.
    pub fn from_value(value: Value) -> Result<Self, RecordError> {
        let Value::Object(mut fields) = value else {
            return Err(RecordError::NotAnObject);
        };
        let type_name = match fields.remove("type") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::String(_)) => return Err(RecordError::Empty { field: "type" }),
            Some(Value::Null) | None => return Err(RecordError::MissingField { field: "type" }),
            Some(_) => {
                return Err(RecordError::WrongType {
                    field: "type",
                    expected: "string",
                })
            }
        };
        Ok(Self { type_name, fields })
    }

    /// A field, treating `null` as absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// First non-empty text among `keys`. Lists of strings are joined with
    /// newlines; numbers are written out.
    pub fn text(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|k| self.get(k))
            .find_map(value_text)
    }

    /// A list of strings. A lone string counts as a one-item list; objects
    /// contribute their `text` field.
    pub fn text_list(&self, key: &'static str) -> Result<Option<Vec<String>>, RecordError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(vec![s.clone()])),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    value_text(item).ok_or(RecordError::WrongType {
                        field: key,
                        expected: "list of strings",
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(_) => Err(RecordError::WrongType {
                field: key,
                expected: "list of strings",
            }),
        }
    }

    /// A required list of strings with at least one entry.
    pub fn required_text_list(&self, key: &'static str) -> Result<Vec<String>, RecordError> {
        let list = self
            .text_list(key)?
            .ok_or(RecordError::MissingField { field: key })?;
        if list.iter().all(|s| s.trim().is_empty()) {
            return Err(RecordError::Empty { field: key });
        }
        Ok(list)
    }

    /// An array field.
    pub fn array(&self, key: &'static str) -> Result<Option<&Vec<Value>>, RecordError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items)),
            Some(_) => Err(RecordError::WrongType {
                field: key,
                expected: "array",
            }),
        }
    }

    /// Options in canonical order, from `key`.
    pub fn options(&self, key: &'static str) -> Result<Option<Vec<ChoiceOption>>, RecordError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Array(items)) => parse_options(items, key).map(Some),
            Some(_) => Err(RecordError::WrongType {
                field: key,
                expected: "array",
            }),
        }
    }

    pub fn category(&self) -> Option<&str> {
        self.get("category").and_then(Value::as_str)
    }

    /// A record-level `vocab_level` that overrides the descriptor's tier.
    pub fn vocab_override(&self) -> Option<Tier> {
        match self.get("vocab_level")? {
            Value::Number(n) => n.as_i64().map(Tier::or_lowest),
            Value::String(s) => Some(Tier::parse_lenient(s)),
            _ => None,
        }
    }

    /// Guess a shape from the record's structure when the type name has no
    /// configured shape.
    pub fn infer_shape(&self) -> Option<Shape> {
        if self.has("gaps") {
            return Some(Shape::GapFill);
        }
        if let Some(Value::Array(questions)) = self.get("questions") {
            let objects_with_options = questions
                .iter()
                .any(|q| q.get("options").is_some_and(Value::is_array));
            if objects_with_options {
                return Some(Shape::Dialogue);
            }
            if self.has("options") {
                return Some(Shape::Matching);
            }
        }
        if self.has("words") {
            return Some(Shape::Ordering);
        }
        let sentences = self.text_list("sentences").ok().flatten();
        let list_answer = self
            .get("answers")
            .or_else(|| self.get("answer"))
            .is_some_and(Value::is_array);
        if let Some(sentences) = &sentences {
            if !self.has("options") {
                let labelled = sentences
                    .iter()
                    .all(|s| Label::split_prefix(s).0.is_some());
                if labelled {
                    return Some(Shape::Ordering);
                }
            } else if list_answer {
                if sentences.iter().any(|s| has_blank(s)) {
                    return Some(Shape::GapFill);
                }
                return Some(Shape::Matching);
            }
        }
        if self.has("dialogues") && self.has("options") && list_answer {
            return Some(Shape::Ordering);
        }
        if self.has("options") || self.has("answer") {
            return Some(Shape::SingleChoice);
        }
        None
    }
}

fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(value_text)
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(map) => ["text", "content", "question"]
            .iter()
            .find_map(|k| map.get(*k).and_then(value_text))?,
        _ => return None,
    };
    (!text.trim().is_empty()).then_some(text)
}

/// Whether a sentence carries a fill-in blank marker.
pub fn has_blank(sentence: &str) -> bool {
    ["（）", "()", "（ ）", "( )", "__"]
        .iter()
        .any(|marker| sentence.contains(marker))
}

/// Parse an option list. Strings may carry a label prefix (`"B. 后面"`);
/// objects use `text` and an optional `image`. When every option is
/// labelled with a distinct in-range label, labels decide canonical order;
/// otherwise list position does.
pub fn parse_options(items: &[Value], field: &'static str) -> Result<Vec<ChoiceOption>, RecordError> {
    let mut parsed = Vec::with_capacity(items.len());
    for item in items {
        let (label, option) = match item {
            Value::String(s) => {
                let (label, text) = Label::split_prefix(s);
                (label, ChoiceOption::text(text))
            }
            Value::Number(n) => (None, ChoiceOption::text(n.to_string())),
            Value::Object(map) => {
                let text = map
                    .get("text")
                    .or_else(|| map.get("content"))
                    .and_then(value_text)
                    .unwrap_or_default();
                let (label, text) = Label::split_prefix(&text);
                let image = map
                    .get("image")
                    .or_else(|| map.get("image_description"))
                    .and_then(value_text);
                (
                    label,
                    ChoiceOption {
                        text: text.to_string(),
                        image,
                    },
                )
            }
            _ => {
                return Err(RecordError::WrongType {
                    field,
                    expected: "list of strings or objects",
                })
            }
        };
        parsed.push((label, option));
    }
    Ok(order_by_labels(parsed))
}

/// Put labelled entries into label order when the labels form `A..` without
/// gaps or duplicates; otherwise keep list order.
pub fn order_by_labels<T>(entries: Vec<(Option<Label>, T)>) -> Vec<T> {
    let n = entries.len();
    let mut seen = vec![false; n];
    let consistent = entries.iter().all(|(label, _)| match label {
        Some(l) if l.index() < n && !seen[l.index()] => {
            seen[l.index()] = true;
            true
        }
        _ => false,
    });
    if consistent {
        let mut entries = entries;
        entries.sort_by_key(|(label, _)| label.map(Label::index));
        entries.into_iter().map(|(_, t)| t).collect()
    } else {
        entries.into_iter().map(|(_, t)| t).collect()
    }
}

/// Resolve one answer value against an option set.
pub fn resolve_label(value: &Value, options: &[ChoiceOption]) -> Option<Label> {
    match value {
        Value::String(s) => resolve_label_str(s, options),
        Value::Array(items) if items.len() == 1 => resolve_label(&items[0], options),
        _ => None,
    }
}

/// Resolve an answer string: a label, a label-prefixed option, or an
/// option's full text (trimmed, ASCII case-insensitive).
pub fn resolve_label_str(s: &str, options: &[ChoiceOption]) -> Option<Label> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let in_range = |l: &Label| options.is_empty() || l.index() < options.len();
    if let Some(label) = Label::parse(s).filter(in_range) {
        // A one-letter option text ("A") is still a label here.
        return Some(label);
    }
    if let Some(pos) = options
        .iter()
        .position(|o| o.text.trim().eq_ignore_ascii_case(s))
    {
        return Label::from_index(pos);
    }
    match Label::split_prefix(s) {
        (Some(label), _) if in_range(&label) => Some(label),
        _ => None,
    }
}

const SEQUENCE_SEPARATORS: [&str; 8] = ["->", "→", ",", "，", "、", "|", " ", ";"];

/// Resolve a sequence of answers (matching, ordering, shared gap fill).
///
/// Lists resolve element-wise. Strings are split on common separators; a
/// separator-free string of exactly `expected` label letters (`"CBA"`) is
/// read one letter per slot. The result is padded or truncated to
/// `expected`.
pub fn resolve_sequence(value: &Value, options: &[ChoiceOption], expected: usize) -> Vec<Option<Label>> {
    let mut labels: Vec<Option<Label>> = match value {
        Value::Array(items) => items.iter().map(|v| resolve_label(v, options)).collect(),
        Value::String(s) => split_sequence(s)
            .into_iter()
            .map(|piece| resolve_label_str(piece, options))
            .collect(),
        _ => Vec::new(),
    };
    if labels.len() == 1 && expected > 1 {
        if let Value::String(s) = value {
            let letters: Vec<Option<Label>> = s
                .trim()
                .chars()
                .map(|c| Label::parse(&c.to_string()))
                .collect();
            if letters.len() == expected && letters.iter().all(Option::is_some) {
                labels = letters;
            }
        }
    }
    labels.resize(expected, None);
    labels
}

fn split_sequence(s: &str) -> Vec<&str> {
    let mut pieces = vec![s];
    for sep in SEQUENCE_SEPARATORS {
        pieces = pieces.into_iter().flat_map(|p| p.split(sep)).collect();
    }
    pieces.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

/// Per-item warning for a sequence that did not line up with its slots.
pub fn sequence_warning(value: Option<&Value>, resolved: &[Option<Label>]) -> Option<String> {
    let missing = resolved.iter().filter(|l| l.is_none()).count();
    match value {
        None => Some("answer is missing; items will be ungraded".to_string()),
        Some(_) if missing > 0 => Some(format!(
            "{missing} of {} answers could not be resolved to a label",
            resolved.len()
        )),
        Some(_) => None,
    }
}
