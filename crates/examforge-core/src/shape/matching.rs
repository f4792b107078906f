//! Pair each stimulus with one candidate from a shared pool.

use crate::descriptor::TypeDescriptor;
use crate::error::RecordError;
use crate::label::Label;
use crate::record::{resolve_sequence, sequence_warning, QuestionRecord};
use crate::render::RenderPlan;

use super::{
    check_max_options, check_min_words, ChoiceOption, ExplanationSource, RenderContext, Shape,
    ShapeAdapter,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matching {
    pub stimuli: Vec<String>,
    pub candidates: Vec<ChoiceOption>,
    /// Canonical candidate label for each stimulus.
    pub answers: Vec<Option<Label>>,
    pub explanations: Vec<String>,
}

impl Matching {
    pub fn normalize(
        record: &QuestionRecord,
        descriptor: &TypeDescriptor,
        warnings: &mut Vec<String>,
    ) -> Result<Self, RecordError> {
        let stimuli = if record.has("sentences") {
            record.required_text_list("sentences")?
        } else if record.has("questions") {
            record.required_text_list("questions")?
        } else if record.has("dialogues") {
            record.required_text_list("dialogues")?
        } else {
            return Err(RecordError::MissingField { field: "sentences" });
        };

        let mut candidates = record
            .options("options")?
            .ok_or(RecordError::MissingField { field: "options" })?;
        if candidates.is_empty() {
            return Err(RecordError::Empty { field: "options" });
        }
        let images = match record.text_list("option_images")? {
            Some(images) => Some(images),
            None if descriptor.requires_image => record.text_list("image_description")?,
            None => None,
        };
        if let Some(images) = images {
            if images.len() != candidates.len() {
                warnings.push(format!(
                    "{} image descriptions for {} options",
                    images.len(),
                    candidates.len()
                ));
            }
            for (candidate, image) in candidates.iter_mut().zip(images) {
                candidate.image = Some(image);
            }
        }
        if candidates.len() < stimuli.len() {
            warnings.push(format!(
                "{} options cannot cover {} stimuli",
                candidates.len(),
                stimuli.len()
            ));
        }

        let value = record.get("answers").or_else(|| record.get("answer"));
        let answers = value
            .map(|v| resolve_sequence(v, &candidates, stimuli.len()))
            .unwrap_or_else(|| vec![None; stimuli.len()]);
        warnings.extend(sequence_warning(value, &answers));

        Ok(Self {
            stimuli,
            candidates,
            answers,
            explanations: record.text_list("explanations")?.unwrap_or_default(),
        })
    }
}

impl ShapeAdapter for Matching {
    fn shape(&self) -> Shape {
        Shape::Matching
    }

    fn slot_count(&self) -> usize {
        self.stimuli.len()
    }

    fn choice_sets(&self) -> Vec<&[ChoiceOption]> {
        vec![&self.candidates]
    }

    fn choice_set_of(&self, _slot: usize) -> usize {
        0
    }

    fn answer_key(&self, slot: usize) -> Option<Label> {
        self.answers.get(slot).copied().flatten()
    }

    fn explanation(&self, slot: usize) -> ExplanationSource<'_> {
        ExplanationSource {
            text: self.explanations.get(slot).map(String::as_str),
            key: None,
        }
    }

    fn shuffles_display(&self) -> bool {
        true
    }

    fn render(&self, ctx: &mut RenderContext<'_>, plan: &mut RenderPlan) {
        ctx.instruction(plan);
        for (slot, stimulus) in self.stimuli.iter().enumerate() {
            let block = ctx.prompt(Some(slot), slot + 1, stimulus);
            plan.push(block);
        }
        ctx.inputs(self, plan);
    }

    fn cardinality_warnings(&self, descriptor: &TypeDescriptor) -> Vec<String> {
        let mut warnings = Vec::new();
        if let Some(range) = descriptor.sentence_count_range {
            if !range.contains(self.stimuli.len()) {
                warnings.push(format!("{} stimuli, expected {range}", self.stimuli.len()));
            }
        }
        check_max_options(descriptor, "candidate pool", self.candidates.len(), &mut warnings);
        check_min_words(descriptor, &self.stimuli.concat(), &mut warnings);
        warnings
    }
}
