//! Canonical option labels and the display-label mapping.

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// An answer-key identifier, `A`..=`Z`, independent of display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Label(u8);

impl Label {
    /// Label for a zero-based position (`0` → `A`).
    pub fn from_index(index: usize) -> Option<Self> {
        (index < 26).then(|| Label(index as u8))
    }

    /// Zero-based position of this label.
    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    pub fn as_char(self) -> char {
        char::from(b'A' + self.0)
    }

    /// Parse a bare label: trimmed, case-insensitive, an optional trailing
    /// `.`/`、`/`)`. Full-width letters are accepted.
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s
            .trim()
            .trim_end_matches(['.', '．', '、', ')', '）', ':', '：'])
            .trim();
        let mut chars = trimmed.chars();
        let c = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        Self::from_char(c)
    }

    fn from_char(c: char) -> Option<Self> {
        let c = match c {
            'Ａ'..='Ｚ' => char::from_u32(c as u32 - 'Ａ' as u32 + 'A' as u32)?,
            'ａ'..='ｚ' => char::from_u32(c as u32 - 'ａ' as u32 + 'A' as u32)?,
            other => other.to_ascii_uppercase(),
        };
        c.is_ascii_uppercase().then(|| Label(c as u8 - b'A'))
    }

    /// Split a label prefix off option text: `"A. 6岁"` → `(Some(A), "6岁")`.
    ///
    /// Only a single letter followed by a separator counts as a prefix, so
    /// `"Apple"` is left alone.
    pub fn split_prefix(text: &str) -> (Option<Label>, &str) {
        let trimmed = text.trim_start();
        let mut chars = trimmed.char_indices();
        let Some((_, first)) = chars.next() else {
            return (None, text.trim());
        };
        let Some((sep_at, sep)) = chars.next() else {
            return (None, text.trim());
        };
        if !matches!(sep, '.' | '．' | '、' | ')' | '）' | ':' | '：') {
            return (None, text.trim());
        }
        match Self::from_char(first) {
            Some(label) => (Some(label), trimmed[sep_at + sep.len_utf8()..].trim()),
            None => (None, text.trim()),
        }
    }

    /// Labels `A`, `B`, ... for `n` positions (capped at 26).
    pub fn sequence(n: usize) -> impl Iterator<Item = Label> {
        (0..n.min(26)).filter_map(Label::from_index)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl TryFrom<String> for Label {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Label::parse(&value).ok_or_else(|| format!("not a label: {value}"))
    }
}

impl From<Label> for String {
    fn from(label: Label) -> String {
        label.to_string()
    }
}

/// Bidirectional mapping between display labels and canonical labels for
/// one option set of one question instance.
///
/// Position `i` on screen shows `display_labels[i]` and stands for
/// `canonical[i]`. Built once per question and held for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMapping {
    display_labels: Vec<String>,
    canonical: Vec<Label>,
}

impl LabelMapping {
    /// Display order equals canonical order.
    pub fn identity(n: usize, display_labels: &[String]) -> Self {
        Self::from_order(Label::sequence(n).collect(), display_labels)
    }

    /// Display order is a random permutation of the canonical labels.
    pub fn shuffled<R: Rng + ?Sized>(n: usize, display_labels: &[String], rng: &mut R) -> Self {
        let mut order: Vec<Label> = Label::sequence(n).collect();
        order.shuffle(rng);
        Self::from_order(order, display_labels)
    }

    /// Display position `i` shows canonical label `order[i]`.
    pub fn from_order(order: Vec<Label>, display_labels: &[String]) -> Self {
        let display_labels = (0..order.len())
            .map(|i| {
                display_labels
                    .get(i)
                    .cloned()
                    .or_else(|| Label::from_index(i).map(|l| l.to_string()))
                    .unwrap_or_else(|| (i + 1).to_string())
            })
            .collect();
        Self {
            display_labels,
            canonical: order,
        }
    }

    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }

    /// Canonical labels in display order.
    pub fn display_order(&self) -> &[Label] {
        &self.canonical
    }

    /// Display labels in display order.
    pub fn display_labels(&self) -> &[String] {
        &self.display_labels
    }

    /// Whether display order differs from canonical order.
    pub fn is_permuted(&self) -> bool {
        self.canonical.iter().enumerate().any(|(i, l)| l.index() != i)
    }

    /// Canonical label behind a display label typed or picked by the learner.
    pub fn to_canonical(&self, display: &str) -> Option<Label> {
        let wanted = display.trim();
        if let Some(pos) = self
            .display_labels
            .iter()
            .position(|d| d.eq_ignore_ascii_case(wanted))
        {
            return Some(self.canonical[pos]);
        }
        let label = Label::parse(wanted)?;
        self.display_labels
            .iter()
            .position(|d| Label::parse(d) == Some(label))
            .map(|pos| self.canonical[pos])
    }

    /// Display label showing `canonical`.
    pub fn to_display(&self, canonical: Label) -> Option<&str> {
        self.canonical
            .iter()
            .position(|&l| l == canonical)
            .map(|pos| self.display_labels[pos].as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn l(c: char) -> Label {
        Label::parse(&c.to_string()).unwrap()
    }

    #[test]
    fn parse_labels() {
        assert_eq!(Label::parse(" a "), Some(l('A')));
        assert_eq!(Label::parse("B."), Some(l('B')));
        assert_eq!(Label::parse("Ｃ"), Some(l('C')));
        assert_eq!(Label::parse("AB"), None);
        assert_eq!(Label::parse("对"), None);
        assert_eq!(Label::parse(""), None);
    }

    #[test]
    fn split_prefixes() {
        assert_eq!(Label::split_prefix("A. 6岁"), (Some(l('A')), "6岁"));
        assert_eq!(Label::split_prefix("D.学生"), (Some(l('D')), "学生"));
        assert_eq!(Label::split_prefix("C、几"), (Some(l('C')), "几"));
        assert_eq!(Label::split_prefix("Apple"), (None, "Apple"));
        assert_eq!(Label::split_prefix("6岁"), (None, "6岁"));
    }

    #[test]
    fn identity_mapping() {
        let mapping = LabelMapping::identity(3, &[]);
        assert_eq!(mapping.to_canonical("b"), Some(l('B')));
        assert_eq!(mapping.to_display(l('C')), Some("C"));
        assert!(!mapping.is_permuted());
        assert_eq!(mapping.to_canonical("D"), None);
    }

    #[test]
    fn custom_display_labels() {
        let labels = vec!["①".to_string(), "②".to_string()];
        let mapping = LabelMapping::identity(2, &labels);
        assert_eq!(mapping.to_canonical("②"), Some(l('B')));
        assert_eq!(mapping.to_display(l('A')), Some("①"));
    }

    #[test]
    fn shuffled_mapping_roundtrips() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mapping = LabelMapping::shuffled(5, &[], &mut rng);
        for canonical in Label::sequence(5) {
            let display = mapping.to_display(canonical).unwrap().to_string();
            assert_eq!(mapping.to_canonical(&display), Some(canonical));
        }
        let mut seen: Vec<Label> = mapping.display_order().to_vec();
        seen.sort();
        assert_eq!(seen, Label::sequence(5).collect::<Vec<_>>());
    }

    #[test]
    fn explicit_order() {
        let mapping = LabelMapping::from_order(vec![l('C'), l('A'), l('B')], &[]);
        assert!(mapping.is_permuted());
        assert_eq!(mapping.to_canonical("A"), Some(l('C')));
        assert_eq!(mapping.to_display(l('A')), Some("B"));
    }

    #[test]
    fn serde_as_letter() {
        assert_eq!(serde_json::to_string(&l('E')).unwrap(), "\"E\"");
        let parsed: Label = serde_json::from_str("\"d\"").unwrap();
        assert_eq!(parsed, l('D'));
    }
}
