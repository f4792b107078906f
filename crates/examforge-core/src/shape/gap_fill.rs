//! A passage with numbered gaps, each graded on its own.
//!
//! Two record layouts normalize here: a passage with a `gaps` list carrying
//! per-gap options, and a list of `sentences` with blanks sharing one
//! `options` list, answered by an `answers` list.

use serde_json::Value;

use crate::descriptor::TypeDescriptor;
use crate::error::RecordError;
use crate::label::Label;
use crate::record::{parse_options, resolve_label, resolve_sequence, sequence_warning, QuestionRecord};
use crate::render::RenderPlan;

use super::{
    check_max_options, check_min_words, ChoiceOption, ExplanationSource, RenderContext, Shape,
    ShapeAdapter,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gap {
    /// Number as it appears in the passage.
    pub number: usize,
    pub choice_set: usize,
    pub answer: Option<Label>,
    pub explanation: Option<String>,
    /// Sentence carrying this gap, in the shared-options layout.
    pub sentence: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GapFill {
    pub passage: Option<String>,
    pub option_sets: Vec<Vec<ChoiceOption>>,
    pub gaps: Vec<Gap>,
}

impl GapFill {
    pub fn normalize(
        record: &QuestionRecord,
        _descriptor: &TypeDescriptor,
        warnings: &mut Vec<String>,
    ) -> Result<Self, RecordError> {
        if let Some(items) = record.array("gaps")? {
            return Self::from_gap_list(record, items, warnings);
        }
        if record.has("sentences") {
            return Self::from_shared_options(record, warnings);
        }
        Err(RecordError::MissingField { field: "gaps" })
    }

    fn from_gap_list(
        record: &QuestionRecord,
        items: &[Value],
        warnings: &mut Vec<String>,
    ) -> Result<Self, RecordError> {
        if items.is_empty() {
            return Err(RecordError::Empty { field: "gaps" });
        }
        let passage = record.text(&["passages", "content", "text"]);
        if passage.is_none() {
            warnings.push("no passage text; gaps are shown on their own".to_string());
        }
        let shared = record.options("options")?;
        let mut option_sets: Vec<Vec<ChoiceOption>> = Vec::new();
        if let Some(shared) = shared {
            option_sets.push(shared);
        }

        let mut gaps = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let Value::Object(map) = item else {
                return Err(RecordError::WrongType {
                    field: "gaps",
                    expected: "list of objects",
                });
            };
            let choice_set = match map.get("options") {
                Some(Value::Array(options)) if !options.is_empty() => {
                    option_sets.push(parse_options(options, "options")?);
                    option_sets.len() - 1
                }
                _ if !option_sets.is_empty() && record.has("options") => 0,
                _ => return Err(RecordError::MissingField { field: "options" }),
            };
            let number = map
                .get("gap_number")
                .and_then(|v| match v {
                    Value::Number(n) => n.as_u64().map(|n| n as usize),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                })
                .unwrap_or(i + 1);
            let answer = map
                .get("answer")
                .and_then(|v| resolve_label(v, &option_sets[choice_set]));
            if answer.is_none() {
                warnings.push(format!("gap {number} has no usable answer; it will be ungraded"));
            }
            gaps.push(Gap {
                number,
                choice_set,
                answer,
                explanation: map
                    .get("explanation")
                    .and_then(Value::as_str)
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_string),
                sentence: None,
            });
        }
        Ok(Self {
            passage,
            option_sets,
            gaps,
        })
    }

    fn from_shared_options(
        record: &QuestionRecord,
        warnings: &mut Vec<String>,
    ) -> Result<Self, RecordError> {
        let sentences = record.required_text_list("sentences")?;
        let options = record
            .options("options")?
            .ok_or(RecordError::MissingField { field: "options" })?;
        if options.is_empty() {
            return Err(RecordError::Empty { field: "options" });
        }
        let value = record.get("answers").or_else(|| record.get("answer"));
        let answers = value
            .map(|v| resolve_sequence(v, &options, sentences.len()))
            .unwrap_or_else(|| vec![None; sentences.len()]);
        warnings.extend(sequence_warning(value, &answers));
        let explanations = record.text_list("explanations")?.unwrap_or_default();

        let gaps = sentences
            .into_iter()
            .zip(answers)
            .enumerate()
            .map(|(i, (sentence, answer))| Gap {
                number: i + 1,
                choice_set: 0,
                answer,
                explanation: explanations.get(i).cloned(),
                sentence: Some(sentence),
            })
            .collect();
        Ok(Self {
            passage: record.text(&["passages", "content"]),
            option_sets: vec![options],
            gaps,
        })
    }

    /// Whether every gap draws from the same option set.
    pub fn is_shared(&self) -> bool {
        self.option_sets.len() == 1 && self.gaps.len() > 1
    }
}

impl ShapeAdapter for GapFill {
    fn shape(&self) -> Shape {
        Shape::GapFill
    }

    fn slot_count(&self) -> usize {
        self.gaps.len()
    }

    fn choice_sets(&self) -> Vec<&[ChoiceOption]> {
        self.option_sets.iter().map(Vec::as_slice).collect()
    }

    fn choice_set_of(&self, slot: usize) -> usize {
        self.gaps.get(slot).map_or(0, |g| g.choice_set)
    }

    fn answer_key(&self, slot: usize) -> Option<Label> {
        self.gaps.get(slot).and_then(|g| g.answer)
    }

    fn explanation(&self, slot: usize) -> ExplanationSource<'_> {
        ExplanationSource {
            text: self.gaps.get(slot).and_then(|g| g.explanation.as_deref()),
            key: None,
        }
    }

    fn slot_id(&self, slot: usize) -> String {
        self.gaps
            .get(slot)
            .map_or(slot + 1, |g| g.number)
            .to_string()
    }

    fn render(&self, ctx: &mut RenderContext<'_>, plan: &mut RenderPlan) {
        ctx.instruction(plan);
        if let Some(passage) = &self.passage {
            let block = ctx.passage(passage);
            plan.push(block);
        }
        for (slot, gap) in self.gaps.iter().enumerate() {
            let text = gap
                .sentence
                .clone()
                .unwrap_or_else(|| gap.number.to_string());
            let block = ctx.prompt(Some(slot), gap.number, &text);
            plan.push(block);
        }
        ctx.inputs(self, plan);
    }

    fn cardinality_warnings(&self, descriptor: &TypeDescriptor) -> Vec<String> {
        let mut warnings = Vec::new();
        if let Some(range) = descriptor.gap_count {
            if !range.contains(self.gaps.len()) {
                warnings.push(format!("{} gaps, expected {range}", self.gaps.len()));
            }
        }
        for (i, set) in self.option_sets.iter().enumerate() {
            check_max_options(descriptor, &format!("option set {}", i + 1), set.len(), &mut warnings);
        }
        let text = match &self.passage {
            Some(passage) => passage.clone(),
            None => self
                .gaps
                .iter()
                .filter_map(|g| g.sentence.as_deref())
                .collect(),
        };
        check_min_words(descriptor, &text, &mut warnings);
        warnings
    }
}
