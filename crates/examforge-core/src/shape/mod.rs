//! The closed set of question shapes and their shared adapter interface.
//!
//! Type names map onto five shapes through the registry's `[shapes]` table
//! (or structural inference). Each shape owns its record normalization,
//! rendering and slot layout; grading is uniform over per-slot labels.

use std::fmt;
use std::str::FromStr;

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::descriptor::TypeDescriptor;
use crate::error::{ConfigError, RecordError};
use crate::grading::{judge, ItemResult};
use crate::label::{Label, LabelMapping};
use crate::phonetic::annotate_pinyin;
use crate::record::QuestionRecord;
use crate::render::{AudioClip, DisplayChoice, ImageAsset, InputSlot, RenderBlock, RenderPlan};
use crate::rewriter::DifficultyRewriter;
use crate::tier::Tier;
use crate::traits::{SpeechRequest, Voice};

pub mod dialogue;
pub mod gap_fill;
pub mod matching;
pub mod ordering;
pub mod single_choice;

pub use dialogue::{Dialogue, SubQuestion};
pub use gap_fill::{Gap, GapFill};
pub use matching::Matching;
pub use ordering::{Ordering, OrderingKind};
pub use single_choice::SingleChoice;

/// Structural category of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    SingleChoice,
    Dialogue,
    Ordering,
    GapFill,
    Matching,
}

impl Shape {
    pub const ALL: [Shape; 5] = [
        Shape::SingleChoice,
        Shape::Dialogue,
        Shape::Ordering,
        Shape::GapFill,
        Shape::Matching,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Shape::SingleChoice => "single_choice",
            Shape::Dialogue => "dialogue",
            Shape::Ordering => "ordering",
            Shape::GapFill => "gap_fill",
            Shape::Matching => "matching",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Shape {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Shape::ALL
            .into_iter()
            .find(|shape| shape.as_str() == normalized)
            .ok_or_else(|| ConfigError::UnknownShape {
                type_name: String::new(),
                shape: s.to_string(),
            })
    }
}

/// One selectable option in canonical order; its label is its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub text: String,
    /// Description of a picture shown with the option.
    #[serde(default)]
    pub image: Option<String>,
}

impl ChoiceOption {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }
}

/// Explanation material for one slot, before templating.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplanationSource<'a> {
    pub text: Option<&'a str>,
    pub key: Option<&'a str>,
}

/// Shared render/collect/grade lifecycle over a normalized question.
pub trait ShapeAdapter {
    fn shape(&self) -> Shape;

    /// Number of independently graded answer slots.
    fn slot_count(&self) -> usize;

    /// Option sets in canonical order.
    fn choice_sets(&self) -> Vec<&[ChoiceOption]>;

    /// Which option set a slot picks from.
    fn choice_set_of(&self, slot: usize) -> usize;

    fn answer_key(&self, slot: usize) -> Option<Label>;

    fn explanation(&self, slot: usize) -> ExplanationSource<'_>;

    /// Identifier used in explanation templates.
    fn slot_id(&self, slot: usize) -> String {
        (slot + 1).to_string()
    }

    /// Whether display order may be randomized for this shape.
    fn shuffles_display(&self) -> bool {
        false
    }

    /// Append blocks and choice sets for this question to `plan`.
    fn render(&self, ctx: &mut RenderContext<'_>, plan: &mut RenderPlan);

    /// Descriptor bounds this question falls outside of.
    fn cardinality_warnings(&self, descriptor: &TypeDescriptor) -> Vec<String>;

    /// Grade every slot against its canonical key.
    fn grade(&self, question_index: usize, selections: &[Option<Label>]) -> Vec<ItemResult> {
        (0..self.slot_count())
            .map(|slot| {
                let user_answer = selections.get(slot).copied().flatten();
                let correct_answer = self.answer_key(slot);
                ItemResult {
                    question_index,
                    slot,
                    shape: self.shape(),
                    user_answer,
                    correct_answer,
                    outcome: judge(user_answer, correct_answer),
                    explanation: None,
                }
            })
            .collect()
    }
}

/// A record normalized into its shape's canonical form.
#[derive(Debug, Clone, PartialEq)]
pub enum QuestionBody {
    SingleChoice(SingleChoice),
    Dialogue(Dialogue),
    Ordering(Ordering),
    GapFill(GapFill),
    Matching(Matching),
}

impl QuestionBody {
    pub fn adapter(&self) -> &dyn ShapeAdapter {
        match self {
            QuestionBody::SingleChoice(q) => q,
            QuestionBody::Dialogue(q) => q,
            QuestionBody::Ordering(q) => q,
            QuestionBody::GapFill(q) => q,
            QuestionBody::Matching(q) => q,
        }
    }

    pub fn shape(&self) -> Shape {
        self.adapter().shape()
    }
}

/// Output of normalization: the canonical body plus non-fatal findings.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub body: QuestionBody,
    pub warnings: Vec<String>,
}

/// Normalize a raw record into `shape`, failing only when a field the shape
/// requires is absent or unusable.
pub fn normalize(
    record: &QuestionRecord,
    shape: Shape,
    descriptor: &TypeDescriptor,
) -> Result<Normalized, RecordError> {
    let mut warnings = Vec::new();
    let body = match shape {
        Shape::SingleChoice => {
            QuestionBody::SingleChoice(SingleChoice::normalize(record, descriptor, &mut warnings)?)
        }
        Shape::Dialogue => {
            QuestionBody::Dialogue(Dialogue::normalize(record, descriptor, &mut warnings)?)
        }
        Shape::Ordering => {
            QuestionBody::Ordering(Ordering::normalize(record, descriptor, &mut warnings)?)
        }
        Shape::GapFill => {
            QuestionBody::GapFill(GapFill::normalize(record, descriptor, &mut warnings)?)
        }
        Shape::Matching => {
            QuestionBody::Matching(Matching::normalize(record, descriptor, &mut warnings)?)
        }
    };
    warnings.extend(body.adapter().cardinality_warnings(descriptor));
    Ok(Normalized { body, warnings })
}

// ---------------------------------------------------------------------------
// Display layout
// ---------------------------------------------------------------------------

/// Display mappings for every option set of one question instance. Built
/// once at load and held for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayLayout {
    mappings: Vec<LabelMapping>,
}

impl DisplayLayout {
    pub fn build<R: Rng + ?Sized>(
        adapter: &dyn ShapeAdapter,
        descriptor: &TypeDescriptor,
        shuffle: bool,
        rng: &mut R,
    ) -> Self {
        let shuffle = shuffle && adapter.shuffles_display();
        let mappings = adapter
            .choice_sets()
            .iter()
            .map(|set| {
                if shuffle {
                    LabelMapping::shuffled(set.len(), &descriptor.option_labels, rng)
                } else {
                    LabelMapping::identity(set.len(), &descriptor.option_labels)
                }
            })
            .collect();
        Self { mappings }
    }

    pub fn mapping(&self, set: usize) -> Option<&LabelMapping> {
        self.mappings.get(set)
    }

    pub fn mappings(&self) -> &[LabelMapping] {
        &self.mappings
    }
}

/// Outcome of interpreting learner input for one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selected {
    Label(Label),
    Cleared,
    /// The input matched no display label or option text.
    Unresolved,
}

/// Interpret `input` (a display label or an option's full text) for `slot`.
pub fn collect_answer(
    adapter: &dyn ShapeAdapter,
    layout: &DisplayLayout,
    slot: usize,
    input: &str,
) -> Selected {
    let input = input.trim();
    if input.is_empty() {
        return Selected::Cleared;
    }
    let set = adapter.choice_set_of(slot);
    if let Some(label) = layout.mapping(set).and_then(|m| m.to_canonical(input)) {
        return Selected::Label(label);
    }
    let (_, bare) = Label::split_prefix(input);
    adapter
        .choice_sets()
        .get(set)
        .and_then(|options| options.iter().position(|o| o.text.trim() == bare))
        .and_then(Label::from_index)
        .map_or(Selected::Unresolved, Selected::Label)
}

// ---------------------------------------------------------------------------
// Rendering helpers
// ---------------------------------------------------------------------------

/// Everything an adapter needs to turn itself into a plan.
pub struct RenderContext<'a> {
    pub rewriter: &'a DifficultyRewriter,
    pub descriptor: &'a TypeDescriptor,
    /// Tier whose weights drive rewriting.
    pub vocab_tier: Tier,
    /// Session tier, used for speech rate.
    pub session_tier: Tier,
    pub layout: &'a DisplayLayout,
    pub rng: &'a mut dyn RngCore,
}

impl RenderContext<'_> {
    /// Rewrite learner-visible text for the vocabulary tier.
    pub fn text(&mut self, text: &str) -> String {
        self.rewriter.rewrite(text, self.vocab_tier, &mut *self.rng)
    }

    /// Pinyin for rewritten text when the type shows it.
    pub fn pinyin(&self, text: &str) -> Option<String> {
        if self.descriptor.show_pinyin {
            annotate_pinyin(text)
        } else {
            None
        }
    }

    pub fn instruction(&self, plan: &mut RenderPlan) {
        if let Some(text) = self.descriptor.instruction() {
            plan.push(RenderBlock::Instruction {
                text: text.to_string(),
            });
        }
    }

    pub fn passage(&mut self, text: &str) -> RenderBlock {
        let text = self.text(text);
        RenderBlock::Passage {
            pinyin: self.pinyin(&text),
            text,
        }
    }

    pub fn prompt(&mut self, slot: Option<usize>, index: usize, text: &str) -> RenderBlock {
        let rewritten = self.text(text);
        RenderBlock::Prompt {
            slot,
            text: self.descriptor.format_question(index, &rewritten),
            pinyin: self.pinyin(&rewritten),
        }
    }

    /// A pending audio clip for one utterance, speaker prefix removed.
    pub fn clip(&mut self, text: &str, voice: Voice) -> RenderBlock {
        let spoken = self.text(strip_speaker(text));
        RenderBlock::Audio {
            clip: AudioClip::pending(SpeechRequest {
                text: spoken,
                tier: self.session_tier,
                voice,
                rate_percent: self.session_tier.speech_rate_percent(),
            }),
        }
    }

    /// Clips for a sequence of dialogue turns, alternating voices.
    pub fn dialogue_clips<S: AsRef<str>>(&mut self, turns: &[S]) -> Vec<RenderBlock> {
        turns
            .iter()
            .map(|t| t.as_ref())
            .filter(|t| !t.trim().is_empty())
            .enumerate()
            .map(|(turn, text)| self.clip(text, Voice::for_turn(turn)))
            .collect()
    }

    pub fn image(&self, description: &str) -> RenderBlock {
        RenderBlock::Image {
            image: ImageAsset::pending(description),
        }
    }

    /// Options of `set` in display order, rewritten and labelled.
    pub fn choice_set(&mut self, set: usize, options: &[ChoiceOption]) -> Vec<DisplayChoice> {
        let layout = self.layout;
        let Some(mapping) = layout.mapping(set) else {
            return Vec::new();
        };
        let order: Vec<(String, Label)> = mapping
            .display_labels()
            .iter()
            .cloned()
            .zip(mapping.display_order().iter().copied())
            .collect();
        order
            .into_iter()
            .filter_map(|(label, canonical)| {
                let option = options.get(canonical.index())?;
                let text = self.text(&option.text);
                Some(DisplayChoice {
                    formatted: self.descriptor.format_option(&label, &text),
                    pinyin: self.pinyin(&text),
                    label,
                    text,
                    image: option.image.as_deref().map(ImageAsset::pending),
                })
            })
            .collect()
    }

    /// Render every option set of `adapter` and one input slot per slot.
    pub fn inputs(&mut self, adapter: &dyn ShapeAdapter, plan: &mut RenderPlan) {
        for (set, options) in adapter.choice_sets().into_iter().enumerate() {
            let choices = self.choice_set(set, options);
            plan.choice_sets.push(choices);
        }
        for slot in 0..adapter.slot_count() {
            plan.slots.push(InputSlot {
                slot,
                choice_set: adapter.choice_set_of(slot),
                selected: None,
            });
        }
    }
}

/// Split a block of spoken text into utterances on sentence terminators and
/// newlines. Terminators stay with their utterance.
pub fn split_utterances(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c == '\n' {
            push_trimmed(&mut out, &mut current);
            continue;
        }
        current.push(c);
        if matches!(c, '。' | '？' | '！' | '?' | '!') {
            push_trimmed(&mut out, &mut current);
        }
    }
    push_trimmed(&mut out, &mut current);
    out
}

fn push_trimmed(out: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
    current.clear();
}

/// Drop a short `Speaker：` prefix from an utterance.
pub fn strip_speaker(text: &str) -> &str {
    let trimmed = text.trim();
    let Some((at, sep)) = trimmed.char_indices().find(|(_, c)| matches!(c, '：' | ':')) else {
        return trimmed;
    };
    if is_speaker_tag(&trimmed[..at]) {
        trimmed[at + sep.len_utf8()..].trim()
    } else {
        trimmed
    }
}

/// A CJK name of up to six characters (`男`, `小王`), or up to three short
/// ASCII words (`Speaker A`, `Woman`).
fn is_speaker_tag(speaker: &str) -> bool {
    let speaker = speaker.trim();
    if speaker.is_empty() {
        return false;
    }
    if speaker.is_ascii() {
        let words: Vec<&str> = speaker.split_whitespace().collect();
        words.len() <= 3
            && speaker.len() <= 20
            && words
                .iter()
                .all(|w| w.chars().all(|c| c.is_ascii_alphanumeric()))
    } else {
        speaker.chars().count() <= 6 && speaker.chars().all(|c| c.is_alphanumeric() || c == ' ')
    }
}

/// Count of letters and digits, the measure used for `min_words`.
pub(crate) fn content_len(text: &str) -> usize {
    text.chars().filter(|c| c.is_alphanumeric()).count()
}

pub(crate) fn check_min_words(descriptor: &TypeDescriptor, text: &str, warnings: &mut Vec<String>) {
    let len = content_len(text);
    if descriptor.min_words > 0 && len < descriptor.min_words {
        warnings.push(format!(
            "stimulus has {len} characters, fewer than the configured minimum of {}",
            descriptor.min_words
        ));
    }
}

pub(crate) fn check_max_options(
    descriptor: &TypeDescriptor,
    what: &str,
    count: usize,
    warnings: &mut Vec<String>,
) {
    if descriptor.max_options > 0 && count > descriptor.max_options {
        warnings.push(format!(
            "{what} has {count} options, more than the configured maximum of {}",
            descriptor.max_options
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn shape_names() {
        assert_eq!("gap_fill".parse::<Shape>().unwrap(), Shape::GapFill);
        assert_eq!("Single-Choice".parse::<Shape>().unwrap(), Shape::SingleChoice);
        assert!("essay".parse::<Shape>().is_err());
        assert_eq!(Shape::Matching.to_string(), "matching");
        assert_eq!(serde_json::to_string(&Shape::Dialogue).unwrap(), "\"dialogue\"");
    }

    #[test]
    fn utterance_splitting() {
        let turns = split_utterances("男：你好！女：你好。\n今天几号？");
        assert_eq!(turns, vec!["男：你好！", "女：你好。", "今天几号？"]);
        assert!(split_utterances("  ").is_empty());
        assert_eq!(split_utterances("没有句号"), vec!["没有句号"]);
    }

    #[test]
    fn speaker_prefixes() {
        assert_eq!(strip_speaker("男：你好！"), "你好！");
        assert_eq!(strip_speaker("Speaker A: hi"), "hi");
        assert_eq!(strip_speaker("  Woman 2 : 你好 "), "你好");
        assert_eq!(
            strip_speaker("Note that the time is 10:30"),
            "Note that the time is 10:30"
        );
        assert_eq!(strip_speaker("你好"), "你好");
        assert_eq!(
            strip_speaker("这是一句很长的话没有说话人：后面"),
            "这是一句很长的话没有说话人：后面"
        );
    }

    #[test]
    fn collect_by_label_or_text() {
        let q = SingleChoice {
            options: vec![ChoiceOption::text("6岁"), ChoiceOption::text("8岁")],
            answer: Label::parse("A"),
            ..Default::default()
        };
        let descriptor = TypeDescriptor::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let layout = DisplayLayout::build(&q, &descriptor, true, &mut rng);
        assert_eq!(
            collect_answer(&q, &layout, 0, "b"),
            Selected::Label(Label::parse("B").unwrap())
        );
        assert_eq!(
            collect_answer(&q, &layout, 0, "6岁"),
            Selected::Label(Label::parse("A").unwrap())
        );
        assert_eq!(collect_answer(&q, &layout, 0, " "), Selected::Cleared);
        assert_eq!(collect_answer(&q, &layout, 0, "10岁"), Selected::Unresolved);
    }

    #[test]
    fn single_choice_is_never_shuffled() {
        let q = SingleChoice {
            options: (0..4).map(|i| ChoiceOption::text(i.to_string())).collect(),
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let layout = DisplayLayout::build(&q, &TypeDescriptor::default(), true, &mut rng);
        assert!(!layout.mapping(0).unwrap().is_permuted());
    }
}
