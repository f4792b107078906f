//! Reconstruct an order: sentences into a paragraph, pictures into the order
//! a dialogue describes them, or words into a sentence.
//!
//! Every position is a slot picking from the shared item set. Items keep
//! their canonical labels however they are shuffled for display, so grading
//! never depends on where an item was shown.

use serde_json::Value;

use crate::descriptor::TypeDescriptor;
use crate::error::RecordError;
use crate::label::{Label, LabelMapping};
use crate::record::{order_by_labels, resolve_sequence, sequence_warning, QuestionRecord};
use crate::render::{RenderBlock, RenderPlan};

use super::{
    check_max_options, check_min_words, ChoiceOption, ExplanationSource, RenderContext, Shape,
    ShapeAdapter,
};

/// What is being put in order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderingKind {
    #[default]
    Sentences,
    /// Pictures ordered by a sequence of dialogue turns.
    Images,
    Words,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ordering {
    pub kind: OrderingKind,
    pub items: Vec<ChoiceOption>,
    /// Per-position stimuli (dialogue turns). Empty means bare positions.
    pub slot_prompts: Vec<String>,
    pub spoken: bool,
    /// Canonical item label for each position.
    pub answer: Vec<Option<Label>>,
    pub explanation: Option<String>,
    pub explanations: Vec<String>,
}

impl Ordering {
    pub fn normalize(
        record: &QuestionRecord,
        descriptor: &TypeDescriptor,
        warnings: &mut Vec<String>,
    ) -> Result<Self, RecordError> {
        let explanation = record.text(&["explanation"]);
        let explanations = record.text_list("explanations")?.unwrap_or_default();

        if let Some(words) = record.text_list("words")? {
            if words.is_empty() {
                return Err(RecordError::Empty { field: "words" });
            }
            let items: Vec<ChoiceOption> = words.iter().map(|w| ChoiceOption::text(w.trim())).collect();
            let answer = match record.get("answer") {
                Some(Value::String(sentence)) if !looks_like_labels(sentence, items.len()) => {
                    derive_word_order(&words, sentence).unwrap_or_else(|| {
                        warnings.push(
                            "answer sentence cannot be built from the given words; \
                             positions will be ungraded"
                                .to_string(),
                        );
                        vec![None; items.len()]
                    })
                }
                value => {
                    let resolved = value
                        .map(|v| resolve_sequence(v, &items, items.len()))
                        .unwrap_or_else(|| vec![None; items.len()]);
                    warnings.extend(sequence_warning(value, &resolved));
                    resolved
                }
            };
            return Ok(Self {
                kind: OrderingKind::Words,
                items,
                slot_prompts: Vec::new(),
                spoken: false,
                answer,
                explanation,
                explanations,
            });
        }

        let (kind, items, slot_prompts) = if let Some(turns) = record.text_list("dialogues")? {
            let mut items = record
                .options("options")?
                .ok_or(RecordError::MissingField { field: "options" })?;
            let images = record.text_list("image_description")?;
            for (i, item) in items.iter_mut().enumerate() {
                item.image = images
                    .as_ref()
                    .and_then(|d| d.get(i).cloned())
                    .or_else(|| descriptor.requires_image.then(|| item.text.clone()));
            }
            (OrderingKind::Images, items, turns)
        } else if let Some(sentences) = record.text_list("sentences")? {
            let labelled = sentences
                .iter()
                .map(|s| {
                    let (label, text) = Label::split_prefix(s);
                    (label, ChoiceOption::text(text))
                })
                .collect();
            (OrderingKind::Sentences, order_by_labels(labelled), Vec::new())
        } else if let Some(items) = record.options("options")? {
            let kind = if descriptor.requires_image {
                OrderingKind::Images
            } else {
                OrderingKind::Sentences
            };
            (kind, items, Vec::new())
        } else {
            return Err(RecordError::MissingField { field: "sentences" });
        };

        if items.is_empty() {
            return Err(RecordError::Empty { field: "sentences" });
        }
        let positions = if slot_prompts.is_empty() {
            items.len()
        } else {
            slot_prompts.len()
        };
        let value = record.get("answer").or_else(|| record.get("answers"));
        let answer = value
            .map(|v| resolve_sequence(v, &items, positions))
            .unwrap_or_else(|| vec![None; positions]);
        warnings.extend(sequence_warning(value, &answer));

        Ok(Self {
            kind,
            items,
            slot_prompts,
            spoken: descriptor.requires_audio,
            answer,
            explanation,
            explanations,
        })
    }

    /// The whole answer as display labels, e.g. `"C → B → A"`. `None` when
    /// any position has no key.
    pub fn correct_order(&self, mapping: Option<&LabelMapping>) -> Option<String> {
        let labels: Option<Vec<String>> = self
            .answer
            .iter()
            .map(|key| {
                let key = (*key)?;
                Some(match mapping.and_then(|m| m.to_display(key)) {
                    Some(display) => display.to_string(),
                    None => key.to_string(),
                })
            })
            .collect();
        labels.map(|l| l.join(" → "))
    }

    /// Whether a complete selection reproduces the whole answer.
    pub fn is_exact(&self, selections: &[Option<Label>]) -> bool {
        !self.answer.is_empty()
            && self.answer.len() == selections.len()
            && self
                .answer
                .iter()
                .zip(selections)
                .all(|(key, chosen)| key.is_some() && key == chosen)
    }
}

/// A separator-free string of exactly `n` letters is a label sequence, not a
/// sentence.
fn looks_like_labels(s: &str, n: usize) -> bool {
    let letters: Vec<char> = s.chars().filter(|c| !c.is_whitespace() && *c != ',').collect();
    letters.len() == n && letters.iter().all(|c| c.is_ascii_uppercase())
}

/// Find the order in which `words` spell out `sentence`, ignoring
/// punctuation and whitespace in the sentence. Each word is used once.
pub fn derive_word_order(words: &[String], sentence: &str) -> Option<Vec<Option<Label>>> {
    let target: String = sentence
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();
    let pieces: Vec<String> = words
        .iter()
        .map(|w| w.chars().filter(|c| c.is_alphanumeric()).collect())
        .collect();
    let mut used = vec![false; pieces.len()];
    let mut order = Vec::with_capacity(pieces.len());
    if place(&target, &pieces, &mut used, &mut order) {
        Some(order.into_iter().map(Label::from_index).collect())
    } else {
        None
    }
}

fn place(rest: &str, pieces: &[String], used: &mut [bool], order: &mut Vec<usize>) -> bool {
    if rest.is_empty() {
        return used.iter().all(|u| *u);
    }
    for i in 0..pieces.len() {
        if used[i] || pieces[i].is_empty() || !rest.starts_with(pieces[i].as_str()) {
            continue;
        }
        used[i] = true;
        order.push(i);
        if place(&rest[pieces[i].len()..], pieces, used, order) {
            return true;
        }
        order.pop();
        used[i] = false;
    }
    false
}

impl ShapeAdapter for Ordering {
    fn shape(&self) -> Shape {
        Shape::Ordering
    }

    fn slot_count(&self) -> usize {
        self.answer.len()
    }

    fn choice_sets(&self) -> Vec<&[ChoiceOption]> {
        vec![&self.items]
    }

    fn choice_set_of(&self, _slot: usize) -> usize {
        0
    }

    fn answer_key(&self, slot: usize) -> Option<Label> {
        self.answer.get(slot).copied().flatten()
    }

    fn explanation(&self, slot: usize) -> ExplanationSource<'_> {
        ExplanationSource {
            text: self
                .explanations
                .get(slot)
                .map(String::as_str)
                .or(self.explanation.as_deref()),
            key: None,
        }
    }

    fn shuffles_display(&self) -> bool {
        true
    }

    fn render(&self, ctx: &mut RenderContext<'_>, plan: &mut RenderPlan) {
        ctx.instruction(plan);
        if self.spoken {
            plan.blocks.extend(ctx.dialogue_clips(&self.slot_prompts));
        }
        for slot in 0..self.slot_count() {
            let block = match self.slot_prompts.get(slot) {
                Some(turn) if !self.spoken => ctx.prompt(Some(slot), slot + 1, turn),
                _ => RenderBlock::Prompt {
                    slot: Some(slot),
                    text: (slot + 1).to_string(),
                    pinyin: None,
                },
            };
            plan.push(block);
        }
        ctx.inputs(self, plan);
    }

    fn cardinality_warnings(&self, descriptor: &TypeDescriptor) -> Vec<String> {
        let mut warnings = Vec::new();
        if let Some(range) = descriptor.sentence_count_range {
            if !range.contains(self.items.len()) {
                warnings.push(format!("{} items, expected {range}", self.items.len()));
            }
        }
        if self.kind == OrderingKind::Images {
            check_max_options(descriptor, "picture set", self.items.len(), &mut warnings);
        }
        let stimulus = if self.slot_prompts.is_empty() {
            self.items.iter().map(|i| i.text.as_str()).collect::<String>()
        } else {
            self.slot_prompts.concat()
        };
        check_min_words(descriptor, &stimulus, &mut warnings);
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::{GradingResult, Outcome};
    use crate::shape::{collect_answer, DisplayLayout, Selected};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use serde_json::json;

    fn l(s: &str) -> Option<Label> {
        Label::parse(s)
    }

    fn sentence_ordering() -> Ordering {
        let r = QuestionRecord::from_value(json!({
            "type": "句子排序题",
            "sentences": [
                "A.你是否也有这样的特点呢",
                "B.比如说，做事努力、对自己要求严格等",
                "C.调查发现，优秀的人都有一些共同点。"
            ],
            "answer": ["C", "B", "A"],
            "explanation": "首句总述共同点"
        }))
        .unwrap();
        Ordering::normalize(&r, &TypeDescriptor::default(), &mut Vec::new()).unwrap()
    }

    #[test]
    fn labelled_sentences() {
        let q = sentence_ordering();
        assert_eq!(q.kind, OrderingKind::Sentences);
        assert_eq!(q.items[2].text, "调查发现，优秀的人都有一些共同点。");
        assert_eq!(q.answer, vec![l("C"), l("B"), l("A")]);
        assert_eq!(q.correct_order(None).as_deref(), Some("C → B → A"));
        assert!(q.is_exact(&[l("C"), l("B"), l("A")]));
        assert!(!q.is_exact(&[l("C"), l("A"), l("B")]));
    }

    #[test]
    fn word_order_is_derived_from_the_sentence() {
        let r = QuestionRecord::from_value(json!({
            "type": "连词成句",
            "words": ["事情", "被他", "了", "解决", "已经"],
            "answer": "事情已经被他解决了。"
        }))
        .unwrap();
        let q = Ordering::normalize(&r, &TypeDescriptor::default(), &mut Vec::new()).unwrap();
        assert_eq!(q.kind, OrderingKind::Words);
        assert_eq!(q.answer, vec![l("A"), l("E"), l("B"), l("D"), l("C")]);
    }

    #[test]
    fn word_order_backtracks() {
        let words: Vec<String> = ["了", "了解", "我"].iter().map(|s| s.to_string()).collect();
        let order = derive_word_order(&words, "我了解了").unwrap();
        assert_eq!(order, vec![l("C"), l("B"), l("A")]);
        assert!(derive_word_order(&words, "我不了解").is_none());
    }

    #[test]
    fn unusable_word_answer_is_ungraded() {
        let r = QuestionRecord::from_value(json!({
            "type": "连词成句",
            "words": ["我", "你"],
            "answer": "他们"
        }))
        .unwrap();
        let mut warnings = Vec::new();
        let q = Ordering::normalize(&r, &TypeDescriptor::default(), &mut warnings).unwrap();
        assert_eq!(warnings.len(), 1);
        let result = GradingResult::from_items(q.grade(0, &[l("A"), l("B")]));
        assert_eq!(result.graded, 0);
        assert_eq!(result.total, 2);
    }

    #[test]
    fn picture_ordering_by_dialogue() {
        let descriptor = TypeDescriptor {
            requires_audio: true,
            requires_image: true,
            ..Default::default()
        };
        let r = QuestionRecord::from_value(json!({
            "type": "图片排序题",
            "dialogues": ["钱小姐你的电话，好的谢谢。", "你看，这个衣服怎么样? 很漂亮。"],
            "options": ["一个男生举着电话", "一对情侣在服装店买衣服"],
            "answer": ["A", "B"],
            "explanations": ["接电话", "买衣服"]
        }))
        .unwrap();
        let q = Ordering::normalize(&r, &descriptor, &mut Vec::new()).unwrap();
        assert_eq!(q.kind, OrderingKind::Images);
        assert!(q.spoken);
        assert_eq!(q.items[0].image.as_deref(), Some("一个男生举着电话"));
        assert_eq!(q.explanation(1).text, Some("买衣服"));
    }

    #[test]
    fn missing_items_is_malformed() {
        let r = QuestionRecord::from_value(json!({"type": "句子排序题", "answer": ["A"]})).unwrap();
        let err = Ordering::normalize(&r, &TypeDescriptor::default(), &mut Vec::new()).unwrap_err();
        assert_eq!(err, RecordError::MissingField { field: "sentences" });
    }

    #[test]
    fn shuffled_display_grades_on_canonical_labels() {
        let q = sentence_ordering();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let layout = DisplayLayout::build(&q, &TypeDescriptor::default(), true, &mut rng);
        let mapping = layout.mapping(0).unwrap();
        let picks: Vec<Option<Label>> = q
            .answer
            .iter()
            .enumerate()
            .map(|(slot, key)| {
                let shown = mapping.to_display(key.unwrap()).unwrap().to_string();
                match collect_answer(&q, &layout, slot, &shown) {
                    Selected::Label(label) => Some(label),
                    _ => None,
                }
            })
            .collect();
        let items = q.grade(0, &picks);
        assert!(items.iter().all(|i| i.outcome == Outcome::Correct));
    }

    proptest! {
        #[test]
        fn grading_is_invariant_to_display_permutation(perm in Just(vec![0usize, 1, 2]).prop_shuffle()) {
            let q = sentence_ordering();
            let order: Vec<Label> = perm.iter().filter_map(|&i| Label::from_index(i)).collect();
            let mapping = LabelMapping::from_order(order, &[]);
            let picks: Vec<Option<Label>> = q
                .answer
                .iter()
                .map(|key| {
                    let shown = mapping.to_display(key.unwrap()).unwrap().to_string();
                    mapping.to_canonical(&shown)
                })
                .collect();
            let items = q.grade(0, &picks);
            prop_assert!(items.iter().all(|i| i.outcome == Outcome::Correct));
        }
    }
}
