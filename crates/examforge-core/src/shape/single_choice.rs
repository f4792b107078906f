//! One prompt, one option set, one correct label.
//!
//! Covers listening and reading choice items as well as true/false
//! judgement, which is single choice over a fixed `["对", "错"]` option set.

use crate::descriptor::TypeDescriptor;
use crate::error::RecordError;
use crate::label::Label;
use crate::record::{resolve_label, QuestionRecord};
use crate::render::RenderPlan;

use super::{
    check_max_options, check_min_words, split_utterances, ChoiceOption, ExplanationSource,
    RenderContext, Shape, ShapeAdapter,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SingleChoice {
    /// Spoken stimulus.
    pub audio: Option<String>,
    /// A spoken question read after the stimulus.
    pub audio_question: Option<String>,
    pub passage: Option<String>,
    pub image: Option<String>,
    pub prompt: Option<String>,
    pub options: Vec<ChoiceOption>,
    pub answer: Option<Label>,
    pub explanation: Option<String>,
}

impl SingleChoice {
    pub fn normalize(
        record: &QuestionRecord,
        descriptor: &TypeDescriptor,
        warnings: &mut Vec<String>,
    ) -> Result<Self, RecordError> {
        let mut options = match record.options("options")? {
            Some(options) if !options.is_empty() => options,
            Some(_) if descriptor.default_options.is_empty() => {
                return Err(RecordError::Empty { field: "options" })
            }
            _ if !descriptor.default_options.is_empty() => {
                tracing::debug!(type_name = %record.type_name, "using configured default options");
                descriptor
                    .default_options
                    .iter()
                    .map(ChoiceOption::text)
                    .collect()
            }
            _ => return Err(RecordError::MissingField { field: "options" }),
        };

        if let Some(images) = record.text_list("option_images")? {
            for (option, image) in options.iter_mut().zip(images) {
                option.image = Some(image);
            }
        }

        let mut audio = record.text(&["audio_content"]);
        let content = record.text(&["passages", "text", "content"]);
        if audio.is_none() && descriptor.requires_audio {
            tracing::debug!(type_name = %record.type_name, "no audio_content, speaking content instead");
            audio = content.clone();
        }
        let passage = content.filter(|c| audio.as_deref() != Some(c.as_str()));

        let audio_question = record.text(&["audio_question"]).filter(|_| audio.is_some());
        let prompt = record
            .text(&["question", "question_content", "target_sentence"])
            .or_else(|| audio_question.clone());

        let answer = match record.get("answer") {
            Some(value) => {
                let answer = resolve_label(value, &options);
                if answer.is_none() {
                    warnings.push(format!(
                        "answer {value} does not match any option; item will be ungraded"
                    ));
                }
                answer
            }
            None => {
                warnings.push("answer is missing; item will be ungraded".to_string());
                None
            }
        };

        Ok(Self {
            audio,
            audio_question,
            passage,
            image: record.text(&["image_description"]),
            prompt,
            options,
            answer,
            explanation: record.text(&["explanation"]),
        })
    }
}

impl ShapeAdapter for SingleChoice {
    fn shape(&self) -> Shape {
        Shape::SingleChoice
    }

    fn slot_count(&self) -> usize {
        1
    }

    fn choice_sets(&self) -> Vec<&[ChoiceOption]> {
        vec![&self.options]
    }

    fn choice_set_of(&self, _slot: usize) -> usize {
        0
    }

    fn answer_key(&self, slot: usize) -> Option<Label> {
        (slot == 0).then_some(self.answer).flatten()
    }

    fn explanation(&self, _slot: usize) -> ExplanationSource<'_> {
        ExplanationSource {
            text: self.explanation.as_deref(),
            key: None,
        }
    }

    fn render(&self, ctx: &mut RenderContext<'_>, plan: &mut RenderPlan) {
        ctx.instruction(plan);
        if let Some(image) = &self.image {
            plan.push(ctx.image(image));
        }
        if let Some(audio) = &self.audio {
            let turns = split_utterances(audio);
            plan.blocks.extend(ctx.dialogue_clips(&turns));
            if let Some(question) = &self.audio_question {
                plan.push(ctx.clip(question, crate::traits::Voice::Female));
            }
        }
        if let Some(passage) = &self.passage {
            let block = ctx.passage(passage);
            plan.push(block);
        }
        if let Some(prompt) = &self.prompt {
            let block = ctx.prompt(Some(0), 1, prompt);
            plan.push(block);
        }
        ctx.inputs(self, plan);
    }

    fn cardinality_warnings(&self, descriptor: &TypeDescriptor) -> Vec<String> {
        let mut warnings = Vec::new();
        check_max_options(descriptor, "question", self.options.len(), &mut warnings);
        let stimulus = self
            .audio
            .as_deref()
            .or(self.passage.as_deref())
            .or(self.prompt.as_deref())
            .unwrap_or_default();
        check_min_words(descriptor, stimulus, &mut warnings);
        warnings
    }
}
