//! Declarative per-type descriptors and the immutable registry that holds them.
//!
//! The registry is a nested `tier -> category -> type -> descriptor` map plus
//! a flat `type -> shape` table. It is built once and only read afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::shape::Shape;
use crate::tier::Tier;

/// Inclusive count bounds, written as `[min, max]` or a single number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CountRangeRepr", into = "(usize, usize)")]
pub struct CountRange {
    pub min: usize,
    pub max: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CountRangeRepr {
    Exact(usize),
    Pair(usize, usize),
}

impl From<CountRangeRepr> for CountRange {
    fn from(repr: CountRangeRepr) -> Self {
        match repr {
            CountRangeRepr::Exact(n) => CountRange::exact(n),
            CountRangeRepr::Pair(a, b) => CountRange::new(a, b),
        }
    }
}

impl From<CountRange> for (usize, usize) {
    fn from(range: CountRange) -> Self {
        (range.min, range.max)
    }
}

impl CountRange {
    /// Bounds are reordered if given backwards.
    pub fn new(a: usize, b: usize) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn exact(n: usize) -> Self {
        Self { min: n, max: n }
    }

    pub fn contains(&self, n: usize) -> bool {
        (self.min..=self.max).contains(&n)
    }
}

impl std::fmt::Display for CountRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}..={}", self.min, self.max)
        }
    }
}

/// Formatting and cardinality rules for one `(tier, category, type)` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeDescriptor {
    /// The stimulus is spoken.
    #[serde(alias = "require_audio")]
    pub requires_audio: bool,
    /// The item or its options carry pictures.
    #[serde(alias = "require_image")]
    pub requires_image: bool,
    pub min_words: usize,
    pub max_options: usize,
    /// Tier whose weight row drives rewriting of this type's text.
    #[serde(alias = "vocab_level")]
    pub vocab_tier: Tier,
    /// Display labels, e.g. `["A", "B", "C"]`. Empty means letters.
    pub option_labels: Vec<String>,
    /// Fixed options used when a record has none, e.g. `["对", "错"]`.
    pub default_options: Vec<String>,
    pub question_format: Option<String>,
    pub explanation_format: Option<String>,
    pub options_format: Option<String>,
    pub gap_count: Option<CountRange>,
    pub question_count_range: Option<CountRange>,
    pub sentence_count_range: Option<CountRange>,
    /// Free-text description of the expected stimulus, passed to generators.
    pub audio_content: Option<String>,
    /// Whether dialogue sub-questions are voiced.
    pub question_audio: bool,
    /// Overrides the engine-wide display shuffling policy for this type.
    pub shuffle_display: Option<bool>,
    /// Annotate passages, prompts and options with tone-marked pinyin.
    pub show_pinyin: bool,
}

impl Default for TypeDescriptor {
    fn default() -> Self {
        Self {
            requires_audio: false,
            requires_image: false,
            min_words: 0,
            max_options: 4,
            vocab_tier: Tier::new(4).unwrap_or(Tier::MAX),
            option_labels: Vec::new(),
            default_options: Vec::new(),
            question_format: None,
            explanation_format: None,
            options_format: None,
            gap_count: None,
            question_count_range: None,
            sentence_count_range: None,
            audio_content: None,
            question_audio: true,
            shuffle_display: None,
            show_pinyin: false,
        }
    }
}

pub const DEFAULT_OPTIONS_FORMAT: &str = "{label}. {option_text}";
pub const DEFAULT_EXPLANATION_FORMAT: &str = "{explanation}";

impl TypeDescriptor {
    /// A question template that carries placeholders is applied per prompt;
    /// one without placeholders is a standalone instruction.
    pub fn instruction(&self) -> Option<&str> {
        self.question_format
            .as_deref()
            .filter(|f| !f.contains('{') && !f.trim().is_empty())
    }

    pub fn format_question(&self, index: usize, question_text: &str) -> String {
        match self.question_format.as_deref() {
            Some(format) if format.contains('{') => render_template(
                format,
                &[
                    ("index", &index.to_string()),
                    ("question_text", question_text),
                ],
            ),
            _ => question_text.to_string(),
        }
    }

    pub fn format_option(&self, label: &str, option_text: &str) -> String {
        let format = self
            .options_format
            .as_deref()
            .filter(|f| f.contains("{option_text}"))
            .unwrap_or(DEFAULT_OPTIONS_FORMAT);
        render_template(format, &[("label", label), ("option_text", option_text)])
    }

    pub fn format_explanation(&self, values: &[(&str, &str)]) -> String {
        let format = self
            .explanation_format
            .as_deref()
            .unwrap_or(DEFAULT_EXPLANATION_FORMAT);
        render_template(format, values)
    }
}

/// Replace `{key}` placeholders with their values. Unknown placeholders and
/// unbalanced braces are left as they are.
pub fn render_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let key = &after[..close];
                match values.iter().find(|(k, _)| *k == key) {
                    Some((_, value)) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

type CategoryMap = BTreeMap<String, BTreeMap<String, TypeDescriptor>>;

/// Immutable `tier -> category -> type -> descriptor` lookup.
#[derive(Debug, Clone, Default)]
pub struct DescriptorRegistry {
    tiers: BTreeMap<Tier, CategoryMap>,
    shapes: BTreeMap<String, Shape>,
}

/// One registry entry, as produced by [`DescriptorRegistry::entries`].
#[derive(Debug, Clone, Copy)]
pub struct RegistryEntry<'a> {
    pub tier: Tier,
    pub category: &'a str,
    pub type_name: &'a str,
    pub descriptor: &'a TypeDescriptor,
    pub shape: Option<Shape>,
}

impl DescriptorRegistry {
    pub fn new(tiers: BTreeMap<Tier, CategoryMap>, shapes: BTreeMap<String, Shape>) -> Self {
        Self { tiers, shapes }
    }

    /// Builder-style insertion, used while assembling a registry.
    pub fn with_descriptor(
        mut self,
        tier: Tier,
        category: &str,
        type_name: &str,
        descriptor: TypeDescriptor,
    ) -> Self {
        self.tiers
            .entry(tier)
            .or_default()
            .entry(category.to_string())
            .or_default()
            .insert(type_name.to_string(), descriptor);
        self
    }

    pub fn with_shape(mut self, type_name: &str, shape: Shape) -> Self {
        self.shapes.insert(type_name.to_string(), shape);
        self
    }

    pub fn lookup(&self, tier: Tier, category: &str, type_name: &str) -> Option<&TypeDescriptor> {
        self.tiers.get(&tier)?.get(category)?.get(type_name)
    }

    /// Find a type in any category of `tier`. A tier with no table at all
    /// falls back to the lowest configured tier.
    pub fn find(&self, tier: Tier, type_name: &str) -> Option<(&str, &TypeDescriptor)> {
        let categories = match self.tiers.get(&tier) {
            Some(categories) => categories,
            None => {
                let (fallback, categories) = self.tiers.iter().next()?;
                tracing::debug!(%tier, %fallback, "no descriptors for tier, using fallback tier");
                categories
            }
        };
        categories.iter().find_map(|(category, types)| {
            types
                .get(type_name)
                .map(|descriptor| (category.as_str(), descriptor))
        })
    }

    /// Configured shape for a type name.
    pub fn shape_of(&self, type_name: &str) -> Option<Shape> {
        self.shapes.get(type_name).copied()
    }

    pub fn shapes(&self) -> &BTreeMap<String, Shape> {
        &self.shapes
    }

    pub fn tiers(&self) -> impl Iterator<Item = Tier> + '_ {
        self.tiers.keys().copied()
    }

    pub fn categories(&self, tier: Tier) -> impl Iterator<Item = &str> {
        self.tiers
            .get(&tier)
            .into_iter()
            .flat_map(|c| c.keys().map(String::as_str))
    }

    pub fn type_names(&self, tier: Tier, category: &str) -> impl Iterator<Item = &str> {
        self.tiers
            .get(&tier)
            .and_then(|c| c.get(category))
            .into_iter()
            .flat_map(|t| t.keys().map(String::as_str))
    }

    /// Every descriptor, ordered by tier, category, then type name.
    pub fn entries(&self) -> impl Iterator<Item = RegistryEntry<'_>> {
        self.tiers.iter().flat_map(move |(tier, categories)| {
            categories.iter().flat_map(move |(category, types)| {
                types.iter().map(move |(type_name, descriptor)| RegistryEntry {
                    tier: *tier,
                    category,
                    type_name,
                    descriptor,
                    shape: self.shape_of(type_name),
                })
            })
        })
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.values().all(|c| c.values().all(|t| t.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(n: u8) -> Tier {
        Tier::new(n).unwrap()
    }

    fn registry() -> DescriptorRegistry {
        DescriptorRegistry::default()
            .with_descriptor(
                tier(1),
                "听力",
                "听录音选择题",
                TypeDescriptor {
                    requires_audio: true,
                    max_options: 3,
                    vocab_tier: tier(1),
                    ..Default::default()
                },
            )
            .with_descriptor(tier(1), "阅读", "阅读判断题", TypeDescriptor::default())
            .with_descriptor(tier(3), "阅读", "句子排序题", TypeDescriptor::default())
            .with_shape("听录音选择题", Shape::SingleChoice)
            .with_shape("句子排序题", Shape::Ordering)
    }

    #[test]
    fn lookup_and_find() {
        let reg = registry();
        let d = reg.lookup(tier(1), "听力", "听录音选择题").unwrap();
        assert!(d.requires_audio);
        assert_eq!(d.max_options, 3);
        assert!(reg.lookup(tier(1), "阅读", "听录音选择题").is_none());

        let (category, _) = reg.find(tier(1), "阅读判断题").unwrap();
        assert_eq!(category, "阅读");
        assert!(reg.find(tier(3), "阅读判断题").is_none());
    }

    #[test]
    fn missing_tier_falls_back_to_lowest() {
        let reg = registry();
        let (category, _) = reg.find(tier(2), "听录音选择题").unwrap();
        assert_eq!(category, "听力");
    }

    #[test]
    fn defaults_for_missing_fields() {
        let d = TypeDescriptor::default();
        assert_eq!(d.vocab_tier, tier(4));
        assert_eq!(d.max_options, 4);
        assert!(d.question_audio);
        assert!(!d.show_pinyin);
    }

    #[test]
    fn shapes_and_entries() {
        let reg = registry();
        assert_eq!(reg.shape_of("句子排序题"), Some(Shape::Ordering));
        assert_eq!(reg.shape_of("阅读判断题"), None);
        assert_eq!(reg.len(), 3);
        let names: Vec<_> = reg.entries().map(|e| e.type_name).collect();
        assert_eq!(names, vec!["听录音选择题", "阅读判断题", "句子排序题"]);
        assert_eq!(reg.categories(tier(1)).count(), 2);
        assert_eq!(reg.type_names(tier(3), "阅读").count(), 1);
    }

    #[test]
    fn template_rendering() {
        assert_eq!(
            render_template("{index}. {question_text}", &[("index", "2"), ("question_text", "你好")]),
            "2. 你好"
        );
        assert_eq!(
            render_template("解析：{explanation} {unknown}", &[("explanation", "x")]),
            "解析：x {unknown}"
        );
        assert_eq!(render_template("open {brace", &[]), "open {brace");
    }

    #[test]
    fn instruction_vs_prompt_template() {
        let d = TypeDescriptor {
            question_format: Some("请选择与音频描述一致的图片".into()),
            ..Default::default()
        };
        assert_eq!(d.instruction(), Some("请选择与音频描述一致的图片"));
        assert_eq!(d.format_question(1, "问题"), "问题");

        let d = TypeDescriptor {
            question_format: Some("{index}. {question_text}".into()),
            ..Default::default()
        };
        assert_eq!(d.instruction(), None);
        assert_eq!(d.format_question(3, "问题"), "3. 问题");
        assert_eq!(d.format_option("B", "后面"), "B. 后面");
    }

    #[test]
    fn count_range_forms() {
        #[derive(Deserialize)]
        struct Holder {
            a: CountRange,
            b: CountRange,
        }
        let h: Holder = toml::from_str("a = [5, 2]\nb = 4").unwrap();
        assert_eq!(h.a, CountRange::new(2, 5));
        assert!(h.a.contains(3));
        assert_eq!(h.b, CountRange::exact(4));
        assert_eq!(h.a.to_string(), "2..=5");
    }
}
