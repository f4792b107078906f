//! A shared stimulus followed by independent sub-questions.
//!
//! The stimulus is spoken when the type requires audio or the record has
//! `audio_content`; otherwise it is shown as passage text. Each
//! sub-question is its own slot with its own option set.

use serde_json::Value;

use crate::descriptor::TypeDescriptor;
use crate::error::RecordError;
use crate::label::Label;
use crate::record::{parse_options, resolve_label, QuestionRecord};
use crate::render::RenderPlan;
use crate::traits::Voice;

use super::{
    check_max_options, check_min_words, split_utterances, ChoiceOption, ExplanationSource,
    RenderContext, Shape, ShapeAdapter,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubQuestion {
    pub id: String,
    pub prompt: String,
    pub options: Vec<ChoiceOption>,
    pub answer: Option<Label>,
    pub explanation: Option<String>,
    /// A quoted key sentence from the stimulus backing the answer.
    pub explanation_key: Option<String>,
    /// Per-question override of the descriptor's `question_audio`.
    pub audio_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dialogue {
    /// Stimulus as turns (spoken) or paragraphs (read).
    pub segments: Vec<String>,
    pub spoken: bool,
    pub sub_questions: Vec<SubQuestion>,
}

impl Dialogue {
    pub fn normalize(
        record: &QuestionRecord,
        descriptor: &TypeDescriptor,
        warnings: &mut Vec<String>,
    ) -> Result<Self, RecordError> {
        let spoken = descriptor.requires_audio || record.has("audio_content");
        let segments = if let Some(turns) = record.text_list("dialogues")? {
            turns
        } else if let Some(audio) = record.text(&["audio_content"]) {
            split_utterances(&audio)
        } else if let Some(paragraphs) = record.text_list("passages")? {
            paragraphs
        } else if let Some(text) = record.text(&["text", "content"]) {
            if spoken {
                split_utterances(&text)
            } else {
                vec![text]
            }
        } else {
            tracing::debug!(type_name = %record.type_name, "dialogue has no stimulus");
            warnings.push("no stimulus text; sub-questions are shown on their own".to_string());
            Vec::new()
        };

        let items = record
            .array("questions")?
            .ok_or(RecordError::MissingField { field: "questions" })?;
        if items.is_empty() {
            return Err(RecordError::Empty { field: "questions" });
        }
        let sub_questions = items
            .iter()
            .enumerate()
            .map(|(i, item)| sub_question(i, item, warnings))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            segments,
            spoken,
            sub_questions,
        })
    }

    fn voiced(&self, sub: &SubQuestion, descriptor: &TypeDescriptor) -> bool {
        self.spoken && sub.audio_enabled.unwrap_or(descriptor.question_audio)
    }
}

fn sub_question(
    position: usize,
    item: &Value,
    warnings: &mut Vec<String>,
) -> Result<SubQuestion, RecordError> {
    let Value::Object(map) = item else {
        return Err(RecordError::WrongType {
            field: "questions",
            expected: "list of objects",
        });
    };
    let text_of = |key: &str| {
        map.get(key).and_then(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    };

    let options = match map.get("options") {
        Some(Value::Array(items)) if !items.is_empty() => parse_options(items, "options")?,
        Some(Value::Array(_)) => return Err(RecordError::Empty { field: "options" }),
        Some(_) => {
            return Err(RecordError::WrongType {
                field: "options",
                expected: "array",
            })
        }
        None => return Err(RecordError::MissingField { field: "options" }),
    };

    let id = text_of("id")
        .or_else(|| text_of("question_id"))
        .or_else(|| text_of("index"))
        .unwrap_or_else(|| (position + 1).to_string());
    let answer = map.get("answer").and_then(|v| resolve_label(v, &options));
    if answer.is_none() {
        warnings.push(format!(
            "sub-question {id} has no usable answer; it will be ungraded"
        ));
    }

    Ok(SubQuestion {
        prompt: text_of("text").or_else(|| text_of("question")).unwrap_or_default(),
        options,
        answer,
        explanation: text_of("explanation"),
        explanation_key: text_of("explanation_key"),
        audio_enabled: map.get("audio_enabled").and_then(Value::as_bool),
        id,
    })
}

impl ShapeAdapter for Dialogue {
    fn shape(&self) -> Shape {
        Shape::Dialogue
    }

    fn slot_count(&self) -> usize {
        self.sub_questions.len()
    }

    fn choice_sets(&self) -> Vec<&[ChoiceOption]> {
        self.sub_questions
            .iter()
            .map(|q| q.options.as_slice())
            .collect()
    }

    fn choice_set_of(&self, slot: usize) -> usize {
        slot
    }

    fn answer_key(&self, slot: usize) -> Option<Label> {
        self.sub_questions.get(slot).and_then(|q| q.answer)
    }

    fn explanation(&self, slot: usize) -> ExplanationSource<'_> {
        self.sub_questions
            .get(slot)
            .map(|q| ExplanationSource {
                text: q.explanation.as_deref(),
                key: q.explanation_key.as_deref(),
            })
            .unwrap_or_default()
    }

    fn slot_id(&self, slot: usize) -> String {
        self.sub_questions
            .get(slot)
            .map_or_else(|| (slot + 1).to_string(), |q| q.id.clone())
    }

    fn render(&self, ctx: &mut RenderContext<'_>, plan: &mut RenderPlan) {
        ctx.instruction(plan);
        if self.spoken {
            plan.blocks.extend(ctx.dialogue_clips(&self.segments));
        } else {
            for paragraph in &self.segments {
                let block = ctx.passage(paragraph);
                plan.push(block);
            }
        }
        for (slot, sub) in self.sub_questions.iter().enumerate() {
            if self.voiced(sub, ctx.descriptor) {
                let clip = ctx.clip(&sub.prompt, Voice::Female);
                plan.push(clip);
            }
            let block = ctx.prompt(Some(slot), slot + 1, &sub.prompt);
            plan.push(block);
        }
        ctx.inputs(self, plan);
    }

    fn cardinality_warnings(&self, descriptor: &TypeDescriptor) -> Vec<String> {
        let mut warnings = Vec::new();
        if let Some(range) = descriptor.question_count_range {
            if !range.contains(self.sub_questions.len()) {
                warnings.push(format!(
                    "{} sub-questions, expected {range}",
                    self.sub_questions.len()
                ));
            }
        }
        for sub in &self.sub_questions {
            check_max_options(
                descriptor,
                &format!("sub-question {}", sub.id),
                sub.options.len(),
                &mut warnings,
            );
        }
        check_min_words(descriptor, &self.segments.concat(), &mut warnings);
        warnings
    }
}
