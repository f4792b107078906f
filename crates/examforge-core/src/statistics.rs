//! Aggregate statistics over graded sessions and rewriter output.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::engine::Session;
use crate::grading::{GradingResult, Outcome};
use crate::rewriter::DifficultyRewriter;
use crate::shape::Shape;
use crate::tier::Tier;

/// Counts for one group of graded items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tally {
    /// Distinct questions contributing items.
    pub questions: usize,
    pub items: usize,
    pub correct: usize,
    pub graded: usize,
}

impl Tally {
    /// Correct over graded; `None` when nothing was gradable.
    pub fn accuracy(&self) -> Option<f64> {
        (self.graded > 0).then(|| self.correct as f64 / self.graded as f64)
    }
}

/// Per-shape and per-category breakdown of a session's grading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub per_shape: BTreeMap<Shape, Tally>,
    pub per_category: BTreeMap<String, Tally>,
    pub overall: Tally,
    /// Records rejected at load; not counted as items.
    pub rejected: usize,
}

/// Break down `result` by the shape and category of each item's question.
pub fn compute_session_stats(session: &Session, result: &GradingResult) -> SessionStats {
    let mut stats = SessionStats {
        rejected: session.rejected().count(),
        ..Default::default()
    };

    let mut last_question = None;
    for item in &result.items {
        let category = session
            .question(item.question_index)
            .ok()
            .and_then(|q| q.category.clone())
            .unwrap_or_else(|| "uncategorized".to_string());
        let new_question = last_question != Some(item.question_index);
        last_question = Some(item.question_index);

        for tally in [
            stats.per_shape.entry(item.shape).or_default(),
            stats.per_category.entry(category).or_default(),
        ] {
            count(tally, item.outcome, new_question);
        }
        count(&mut stats.overall, item.outcome, new_question);
    }

    stats
}

fn count(tally: &mut Tally, outcome: Outcome, new_question: bool) {
    if new_question {
        tally.questions += 1;
    }
    tally.items += 1;
    match outcome {
        Outcome::Correct => {
            tally.correct += 1;
            tally.graded += 1;
        }
        Outcome::Incorrect => tally.graded += 1,
        Outcome::Ungraded => {}
    }
}

/// Where rewritten tokens landed over repeated trials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewriteMixture {
    /// Multi-character tokens considered, summed over trials.
    pub tokens: usize,
    /// Tokens left as they were.
    pub unchanged: usize,
    /// Output tokens by the lowest tier whose vocabulary holds them.
    pub by_tier: [usize; Tier::COUNT],
    /// Output tokens in no tier's vocabulary.
    pub unknown: usize,
}

impl RewriteMixture {
    pub fn unchanged_fraction(&self) -> f64 {
        if self.tokens == 0 {
            return 0.0;
        }
        self.unchanged as f64 / self.tokens as f64
    }

    /// Share of output tokens per tier, in tier order.
    pub fn tier_fractions(&self) -> [f64; Tier::COUNT] {
        let mut out = [0.0; Tier::COUNT];
        if self.tokens == 0 {
            return out;
        }
        for (share, count) in out.iter_mut().zip(self.by_tier) {
            *share = count as f64 / self.tokens as f64;
        }
        out
    }
}

/// Rewrite `text` `trials` times and tally the outcome token by token.
pub fn measure_rewrite_mixture<R: Rng + ?Sized>(
    rewriter: &DifficultyRewriter,
    text: &str,
    target: Tier,
    trials: usize,
    rng: &mut R,
) -> RewriteMixture {
    let tokens = rewriter.segmenter().segment(text);
    let mut mixture = RewriteMixture::default();
    for _ in 0..trials {
        for token in &tokens {
            if token.chars().nth(1).is_none() {
                continue;
            }
            let out = rewriter.rewrite_token(token, target, rng);
            mixture.tokens += 1;
            if out == *token {
                mixture.unchanged += 1;
            }
            match rewriter.corpus().tier_of(out) {
                Some(tier) => mixture.by_tier[tier.index()] += 1,
                None => mixture.unknown += 1,
            }
        }
    }
    mixture
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorRegistry;
    use crate::engine::{AssessmentEngine, EngineConfig};
    use crate::vocabulary::VocabularyCorpus;
    use crate::weights::LevelWeightTable;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use serde_json::json;
    use std::sync::Arc;

    fn tier(n: u8) -> Tier {
        Tier::new(n).unwrap()
    }

    #[test]
    fn breakdown_by_shape_and_category() {
        let engine = AssessmentEngine::new(
            Arc::new(DescriptorRegistry::default()),
            Arc::new(DifficultyRewriter::passthrough()),
            EngineConfig {
                seed: Some(1),
                ..Default::default()
            },
        );
        let records = vec![
            json!({"type": "判断", "category": "阅读", "options": ["对", "错"], "answer": "A"}),
            json!({"type": "排序", "category": "阅读", "sentences": ["A. 一", "B. 二"], "answer": ["B", "A"]}),
            json!({"type": "坏的", "note": 1}),
            json!({"type": "判断", "options": ["对", "错"]}),
        ];
        let mut session = engine.load_values(records, tier(1));
        engine.select(&mut session, 0, 0, "A").unwrap();
        let result = engine.submit_all(&mut session);
        let stats = compute_session_stats(&session, &result);

        assert_eq!(stats.rejected, 1);
        let single = &stats.per_shape[&Shape::SingleChoice];
        assert_eq!((single.questions, single.items, single.correct, single.graded), (2, 2, 1, 1));
        assert_eq!(stats.per_shape[&Shape::Ordering].items, 2);
        assert_eq!(stats.per_category["阅读"].questions, 2);
        assert_eq!(stats.per_category["uncategorized"].graded, 0);
        assert_eq!(stats.per_category["uncategorized"].accuracy(), None);
        assert_eq!(stats.overall.items, result.total);
    }

    #[test]
    fn mixture_follows_weight_row() {
        let corpus = Arc::new(VocabularyCorpus::from_tiers([
            (tier(1), vec!["你好", "学生"]),
            (tier(2), vec!["旅游", "准备"]),
        ]));
        let rewriter = DifficultyRewriter::new(corpus, Arc::new(LevelWeightTable::default()));
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let m = measure_rewrite_mixture(&rewriter, "你好，学生。", tier(1), 2000, &mut rng);
        assert_eq!(m.tokens, 4000);
        assert_eq!(m.unknown, 0);
        let fractions = m.tier_fractions();
        assert!((fractions[0] - 0.8).abs() < 0.05, "{fractions:?}");
        assert!((fractions[1] - 0.2).abs() < 0.05, "{fractions:?}");
        // A tier-1 word survives whenever tier 1 is drawn.
        assert!(m.unchanged_fraction() >= 0.75);
    }
}
