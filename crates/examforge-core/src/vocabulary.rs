//! Tier-indexed vocabulary sets.
//!
//! Built once at startup from static word lists and never mutated afterwards.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::tier::Tier;

#[derive(Debug, Clone, Default)]
struct TierWords {
    /// Stable order for uniform sampling.
    words: Vec<String>,
    index: HashSet<String>,
}

impl TierWords {
    fn from_iter<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = TierWords::default();
        for word in words {
            let word = word.as_ref().trim();
            if word.is_empty() || set.index.contains(word) {
                continue;
            }
            set.index.insert(word.to_string());
            set.words.push(word.to_string());
        }
        set
    }
}

/// Six immutable word sets, one per tier.
#[derive(Debug, Clone, Default)]
pub struct VocabularyCorpus {
    tiers: [TierWords; Tier::COUNT],
}

impl VocabularyCorpus {
    /// A corpus with every tier empty.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a corpus from `(tier, words)` pairs. Tiers not mentioned stay empty.
    pub fn from_tiers<I, W, S>(tiers: I) -> Self
    where
        I: IntoIterator<Item = (Tier, W)>,
        W: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut corpus = Self::default();
        for (tier, words) in tiers {
            corpus.tiers[tier.index()] = TierWords::from_iter(words);
        }
        corpus
    }

    /// Load `1.json` .. `6.json` (JSON string arrays) from a directory.
    ///
    /// A missing file leaves that tier empty and logs a warning; a file that
    /// exists but cannot be parsed is an error.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            anyhow::bail!("not a directory: {}", dir.display());
        }

        let mut corpus = Self::default();
        for tier in Tier::all() {
            let path = dir.join(format!("{}.json", tier.get()));
            if !path.exists() {
                tracing::warn!(
                    "no vocabulary for {tier} at {}, using an empty set",
                    path.display()
                );
                continue;
            }
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read word list: {}", path.display()))?;
            let words: Vec<String> = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse word list: {}", path.display()))?;
            corpus.tiers[tier.index()] = TierWords::from_iter(words);
        }
        Ok(corpus)
    }

    /// Words native to `tier`, in load order.
    pub fn words(&self, tier: Tier) -> &[String] {
        &self.tiers[tier.index()].words
    }

    /// Whether `word` is a whole-token member of `tier`'s set.
    pub fn contains(&self, tier: Tier, word: &str) -> bool {
        self.tiers[tier.index()].index.contains(word)
    }

    /// Lowest tier whose set contains `word`.
    pub fn tier_of(&self, word: &str) -> Option<Tier> {
        Tier::all().find(|&tier| self.contains(tier, word))
    }

    /// Whether any tier contains `word`.
    pub fn is_known(&self, word: &str) -> bool {
        self.tier_of(word).is_some()
    }

    /// A uniformly random member of `tier`'s set, or `None` if it is empty.
    pub fn sample<R: Rng + ?Sized>(&self, tier: Tier, rng: &mut R) -> Option<&str> {
        self.tiers[tier.index()]
            .words
            .choose(rng)
            .map(String::as_str)
    }

    /// Number of words in `tier`.
    pub fn len(&self, tier: Tier) -> usize {
        self.tiers[tier.index()].words.len()
    }

    /// Whether every tier is empty.
    pub fn is_empty(&self) -> bool {
        self.tiers.iter().all(|t| t.words.is_empty())
    }

    /// Every word across all tiers.
    pub fn all_words(&self) -> impl Iterator<Item = &str> {
        self.tiers
            .iter()
            .flat_map(|t| t.words.iter().map(String::as_str))
    }
}
