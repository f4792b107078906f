//! Difficulty-adaptive lexical rewriter.
//!
//! Each multi-character token is independently re-drawn: a source tier is
//! sampled from the weight row for the target tier, and the token is kept if
//! it already belongs to that tier's vocabulary, otherwise replaced by a
//! random word from it. Repeated calls on the same text differ; only the
//! aggregate tier mixture follows the weight row.

use std::sync::Arc;

use rand::Rng;
use serde_json::Value;

use crate::segment::Segmenter;
use crate::tier::Tier;
use crate::vocabulary::VocabularyCorpus;
use crate::weights::LevelWeightTable;

/// Outcome of rewriting a value that may not be a string.
#[derive(Debug, Clone, PartialEq)]
pub enum Rewritten {
    /// The value was coerced to text and rewritten.
    Text(String),
    /// An array, rewritten element by element.
    List(Vec<Rewritten>),
    /// The value could not be coerced; it is returned as given.
    Unchanged { value: Value, warning: String },
}

impl Rewritten {
    /// The rewritten text, or the original value's JSON rendering. List
    /// elements are joined one per line.
    pub fn into_text(self) -> String {
        match self {
            Rewritten::Text(text) => text,
            Rewritten::List(items) => items
                .into_iter()
                .map(Rewritten::into_text)
                .collect::<Vec<_>>()
                .join("\n"),
            Rewritten::Unchanged { value, .. } => value.to_string(),
        }
    }
}

/// Recalibrates text vocabulary toward a target tier.
#[derive(Debug, Clone)]
pub struct DifficultyRewriter {
    corpus: Arc<VocabularyCorpus>,
    weights: Arc<LevelWeightTable>,
    segmenter: Segmenter,
}

impl DifficultyRewriter {
    pub fn new(corpus: Arc<VocabularyCorpus>, weights: Arc<LevelWeightTable>) -> Self {
        let segmenter = Segmenter::from_corpus(&corpus);
        Self {
            corpus,
            weights,
            segmenter,
        }
    }

    /// A rewriter with no vocabulary; every call returns its input.
    pub fn passthrough() -> Self {
        Self::new(
            Arc::new(VocabularyCorpus::empty()),
            Arc::new(LevelWeightTable::default()),
        )
    }

    pub fn corpus(&self) -> &VocabularyCorpus {
        &self.corpus
    }

    pub fn weights(&self) -> &LevelWeightTable {
        &self.weights
    }

    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    /// Rewrite `text` for `target`.
    pub fn rewrite<R: Rng + ?Sized>(&self, text: &str, target: Tier, rng: &mut R) -> String {
        let mut out = String::with_capacity(text.len());
        for token in self.segmenter.segment(text) {
            out.push_str(self.rewrite_token(token, target, rng));
        }
        out
    }

    /// Rewrite a single token.
    pub fn rewrite_token<'a, R: Rng + ?Sized>(
        &'a self,
        token: &'a str,
        target: Tier,
        rng: &mut R,
    ) -> &'a str {
        if token.chars().nth(1).is_none() {
            return token;
        }
        let source = self.weights.sample(target, rng);
        if self.corpus.contains(source, token) {
            return token;
        }
        self.corpus.sample(source, rng).unwrap_or(token)
    }

    /// Rewrite a JSON value: strings, numbers and booleans are coerced to
    /// text, arrays are rewritten element by element, and objects and nulls
    /// are handed back with a warning.
    pub fn rewrite_value<R: Rng + ?Sized>(
        &self,
        value: &Value,
        target: Tier,
        rng: &mut R,
    ) -> Rewritten {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Array(items) => {
                return Rewritten::List(
                    items
                        .iter()
                        .map(|item| self.rewrite_value(item, target, rng))
                        .collect(),
                );
            }
            other => {
                let warning = format!(
                    "cannot rewrite a {} value, leaving it unchanged",
                    json_kind(other)
                );
                tracing::warn!("{warning}");
                return Rewritten::Unchanged {
                    value: other.clone(),
                    warning,
                };
            }
        };
        Rewritten::Text(self.rewrite(&text, target, rng))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn tier(n: u8) -> Tier {
        Tier::new(n).unwrap()
    }

    fn rewriter() -> DifficultyRewriter {
        let corpus = VocabularyCorpus::from_tiers([
            (tier(1), vec!["你好", "学生", "老师", "喜欢"]),
            (tier(2), vec!["唱歌", "跳舞", "运动"]),
            (tier(3), vec!["春节", "中秋节"]),
            (tier(4), vec!["文化", "思想"]),
            (tier(5), vec!["通货膨胀"]),
            (tier(6), vec!["雨后春笋", "铁石心肠"]),
        ]);
        DifficultyRewriter::new(Arc::new(corpus), Arc::new(LevelWeightTable::default()))
    }

    #[test]
    fn empty_text_stays_empty() {
        let rw = rewriter();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for t in Tier::all() {
            assert_eq!(rw.rewrite("", t, &mut rng), "");
        }
    }

    #[test]
    fn single_characters_pass_through() {
        let rw = rewriter();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let text = "我，你。他！ a 1";
        for t in Tier::all() {
            assert_eq!(rw.rewrite(text, t, &mut rng), text);
        }
    }

    #[test]
    fn replacements_come_from_the_corpus() {
        let rw = rewriter();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..200 {
            let token = rw.rewrite_token("陌生词", tier(6), &mut rng);
            let source = rw.corpus().tier_of(token);
            assert!(matches!(source, Some(t) if t >= tier(5)), "{token}");
        }
    }

    #[test]
    fn empty_source_tier_keeps_token() {
        let corpus = VocabularyCorpus::from_tiers([(tier(6), vec!["雨后春笋"])]);
        let rw = DifficultyRewriter::new(Arc::new(corpus), Arc::new(LevelWeightTable::default()));
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        // Tier 1 rewriting only ever draws from tiers 1 and 2, both empty.
        assert_eq!(rw.rewrite("陌生词语", tier(1), &mut rng), "陌生词语");
    }

    #[test]
    fn passthrough_is_identity() {
        let rw = DifficultyRewriter::passthrough();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let text = "很多人都羡慕导游，觉得他们能到处玩。";
        assert_eq!(rw.rewrite(text, tier(4), &mut rng), text);
    }

    #[test]
    fn rewriting_is_probabilistic_not_a_noop() {
        // Every token belongs to tier 1, yet tier 1 rewriting draws from
        // tier 2 a fifth of the time and those draws replace the token.
        let rw = rewriter();
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let trials = 1000;
        let unchanged = (0..trials)
            .filter(|_| rw.rewrite_token("学生", tier(1), &mut rng) == "学生")
            .count();
        let fraction = unchanged as f64 / trials as f64;
        let expected = rw.weights().weight(tier(1), tier(1));
        assert!(
            (fraction - expected).abs() < 0.05,
            "unchanged fraction {fraction}, expected about {expected}"
        );
    }

    #[test]
    fn unchanged_fraction_counts_matching_draws() {
        // "春节" sits in tiers 2 and 3, so tier-3 rewriting keeps it whenever
        // either is sampled and replaces it only on tier-4 draws.
        let corpus = VocabularyCorpus::from_tiers([
            (tier(2), vec!["春节", "唱歌"]),
            (tier(3), vec!["春节"]),
            (tier(4), vec!["文化"]),
        ]);
        let rw = DifficultyRewriter::new(Arc::new(corpus), Arc::new(LevelWeightTable::default()));
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let trials = 1000;
        let unchanged = (0..trials)
            .filter(|_| rw.rewrite_token("春节", tier(3), &mut rng) == "春节")
            .count();
        let fraction = unchanged as f64 / trials as f64;
        assert!((fraction - 0.8).abs() < 0.05, "unchanged fraction {fraction}");
    }

    #[test]
    fn value_coercion() {
        let rw = rewriter();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        assert_eq!(
            rw.rewrite_value(&serde_json::json!(6), tier(1), &mut rng),
            Rewritten::Text("6".into())
        );
        assert_eq!(
            DifficultyRewriter::passthrough()
                .rewrite_value(&serde_json::json!(true), tier(1), &mut rng)
                .into_text(),
            "true"
        );
        match rw.rewrite_value(&serde_json::json!({"text": "x"}), tier(1), &mut rng) {
            Rewritten::Unchanged { value, warning } => {
                assert_eq!(value, serde_json::json!({"text": "x"}));
                assert!(warning.contains("object"));
            }
            other => panic!("expected unchanged, got {other:?}"),
        }
    }

    #[test]
    fn arrays_are_rewritten_per_element() {
        let rw = rewriter();
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        let value = serde_json::json!(["我", 3, ["你"], null]);
        match rw.rewrite_value(&value, tier(2), &mut rng) {
            Rewritten::List(items) => {
                assert_eq!(items.len(), 4);
                assert_eq!(items[0], Rewritten::Text("我".into()));
                assert_eq!(items[1], Rewritten::Text("3".into()));
                assert_eq!(items[2], Rewritten::List(vec![Rewritten::Text("你".into())]));
                assert!(matches!(items[3], Rewritten::Unchanged { .. }));
            }
            other => panic!("expected a list, got {other:?}"),
        }
        let text = DifficultyRewriter::passthrough()
            .rewrite_value(&serde_json::json!(["你好", "再见"]), tier(1), &mut rng)
            .into_text();
        assert_eq!(text, "你好\n再见");
    }

    #[test]
    fn off_corpus_words_are_replaced() {
        // Only the upper tiers have words, and tier 6 rewriting never
        // samples below tier 5, so every draw finds a replacement.
        let corpus = VocabularyCorpus::from_tiers([
            (tier(5), vec!["通货膨胀", "奢侈"]),
            (tier(6), vec!["雨后春笋", "铁石心肠"]),
        ]);
        let rw = DifficultyRewriter::new(Arc::new(corpus), Arc::new(LevelWeightTable::default()));
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..100 {
            let out = rw.rewrite("鳄鱼", tier(6), &mut rng);
            assert_ne!(out, "鳄鱼");
            assert!(rw.corpus().tier_of(&out).is_some(), "{out}");
        }
    }

    proptest! {
        #[test]
        fn output_preserves_single_char_tokens(text in "[，。！ a-z0-9我你他]{0,30}", seed in any::<u64>()) {
            let rw = rewriter();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let out = rw.rewrite(&text, tier(3), &mut rng);
            // No dictionary word can form from these characters except latin runs,
            // which only change when two or more letters/digits are adjacent.
            let has_multi = rw.segmenter().segment(&text).iter().any(|t| t.chars().count() > 1);
            if !has_multi {
                prop_assert_eq!(out, text);
            }
        }
    }
}
