//! Word-level segmentation for mixed CJK/Latin text.
//!
//! Segmentation is jieba's dictionary-plus-HMM cut, so words outside the
//! graded vocabulary still come out whole. Vocabulary words are added to the
//! dictionary on top of jieba's bundled one. Concatenating the tokens always
//! reproduces the input.

use std::fmt;
use std::sync::{Arc, OnceLock};

use jieba_rs::Jieba;

use crate::vocabulary::VocabularyCorpus;

/// Longest vocabulary entry added to the dictionary, in characters.
const MAX_WORD_CHARS: usize = 8;

fn bundled() -> Arc<Jieba> {
    static BUNDLED: OnceLock<Arc<Jieba>> = OnceLock::new();
    BUNDLED.get_or_init(|| Arc::new(Jieba::new())).clone()
}

/// Dictionary-driven segmenter.
#[derive(Clone)]
pub struct Segmenter {
    jieba: Arc<Jieba>,
    added: usize,
}

impl fmt::Debug for Segmenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segmenter")
            .field("added", &self.added)
            .finish_non_exhaustive()
    }
}

impl Default for Segmenter {
    /// jieba's bundled dictionary, shared across segmenters.
    fn default() -> Self {
        Self {
            jieba: bundled(),
            added: 0,
        }
    }
}

impl Segmenter {
    /// Build a segmenter that also knows every word of every tier.
    pub fn from_corpus(corpus: &VocabularyCorpus) -> Self {
        Self::from_words(corpus.all_words())
    }

    /// Build a segmenter from jieba's dictionary plus `words`.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut jieba: Option<Jieba> = None;
        let mut added = 0;
        for word in words {
            let word = word.as_ref().trim();
            let len = word.chars().count();
            if len < 2 || len > MAX_WORD_CHARS {
                continue;
            }
            jieba.get_or_insert_with(Jieba::new).add_word(word, None, None);
            added += 1;
        }
        match jieba {
            Some(jieba) => Self {
                jieba: Arc::new(jieba),
                added,
            },
            None => Self::default(),
        }
    }

    /// Number of vocabulary words added on top of the bundled dictionary.
    pub fn added_words(&self) -> usize {
        self.added
    }

    /// Split `text` into tokens that borrow from it.
    pub fn segment<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.jieba
            .cut(text, true)
            .into_iter()
            .filter(|token| !token.is_empty())
            .collect()
    }
}
