//! Descriptor table and question set loaders.
//!
//! Descriptors come from a TOML file shaped as
//! `tiers.<tier>.<category>.<type>` tables plus a `[shapes]` table; question
//! sets are JSON. Both are validated for common authoring mistakes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::descriptor::{DescriptorRegistry, TypeDescriptor};
use crate::error::ConfigError;
use crate::shape::Shape;
use crate::tier::Tier;
use crate::traits::records_from;
use crate::vocabulary::VocabularyCorpus;

/// Intermediate TOML structure for descriptor files.
#[derive(Debug, Deserialize)]
struct TomlDescriptorFile {
    #[serde(default)]
    tiers: BTreeMap<String, BTreeMap<String, BTreeMap<String, TypeDescriptor>>>,
    #[serde(default)]
    shapes: BTreeMap<String, String>,
}

/// Parse a descriptor table from a TOML file.
pub fn parse_descriptors(path: &Path) -> Result<DescriptorRegistry> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read descriptor file: {}", path.display()))?;

    parse_descriptors_str(&content, path)
}

/// Parse a descriptor table from a TOML string (useful for testing).
pub fn parse_descriptors_str(content: &str, source_path: &Path) -> Result<DescriptorRegistry> {
    let parsed: TomlDescriptorFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let tiers = parsed
        .tiers
        .into_iter()
        .map(|(key, categories)| {
            let tier: Tier = key
                .parse()
                .with_context(|| format!("in {}", source_path.display()))?;
            Ok((tier, categories))
        })
        .collect::<Result<BTreeMap<_, _>>>()?;

    let shapes = parsed
        .shapes
        .into_iter()
        .map(|(type_name, shape)| {
            let parsed: Shape = shape.parse().map_err(|_| ConfigError::UnknownShape {
                type_name: type_name.clone(),
                shape: shape.clone(),
            })?;
            Ok((type_name, parsed))
        })
        .collect::<Result<BTreeMap<_, _>, ConfigError>>()
        .with_context(|| format!("in {}", source_path.display()))?;

    let registry = DescriptorRegistry::new(tiers, shapes);
    tracing::debug!(
        entries = registry.len(),
        "loaded descriptors from {}",
        source_path.display()
    );
    Ok(registry)
}

/// Parse a question set: a JSON array of records, or `{"questions": [...]}`.
///
/// Records are returned as raw values; each is checked individually when it
/// is loaded into a session.
pub fn parse_question_set_str(content: &str, source_path: &Path) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(content)
        .with_context(|| format!("failed to parse JSON: {}", source_path.display()))?;
    records_from(value).with_context(|| format!("no question records in {}", source_path.display()))
}

/// Load a question set from a JSON file.
pub fn load_question_file(path: &Path) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question file: {}", path.display()))?;

    parse_question_set_str(&content, path)
}

/// Recursively load every `.json` question set under a directory. Files that
/// fail to parse are skipped with a warning.
pub fn load_question_directory(dir: &Path) -> Result<Vec<(PathBuf, Vec<Value>)>> {
    let mut sets = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    paths.sort();

    for path in paths {
        if path.is_dir() {
            sets.extend(load_question_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "json") {
            match load_question_file(&path) {
                Ok(records) => sets.push((path, records)),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(sets)
}

/// A warning from descriptor or vocabulary validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    pub tier: Option<Tier>,
    pub type_name: Option<String>,
    pub message: String,
}

impl ValidationWarning {
    fn general(message: impl Into<String>) -> Self {
        Self {
            tier: None,
            type_name: None,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.tier, &self.type_name) {
            (Some(tier), Some(name)) => write!(f, "{tier} {name}: {}", self.message),
            (Some(tier), None) => write!(f, "{tier}: {}", self.message),
            (None, Some(name)) => write!(f, "{name}: {}", self.message),
            (None, None) => f.write_str(&self.message),
        }
    }
}

/// Validate a descriptor registry for common issues.
pub fn validate_registry(registry: &DescriptorRegistry) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    for tier in Tier::all() {
        if registry.categories(tier).next().is_none() {
            warnings.push(ValidationWarning {
                tier: Some(tier),
                type_name: None,
                message: "no descriptors configured; lookups fall back to the lowest tier".into(),
            });
        }
    }

    let mut unshaped = std::collections::BTreeSet::new();
    for entry in registry.entries() {
        let d = entry.descriptor;
        let warn = |message: String| ValidationWarning {
            tier: Some(entry.tier),
            type_name: Some(entry.type_name.to_string()),
            message,
        };

        if entry.shape.is_none() && unshaped.insert(entry.type_name) {
            warnings.push(ValidationWarning {
                tier: None,
                type_name: Some(entry.type_name.to_string()),
                message: "no shape in [shapes]; it will be inferred per record".into(),
            });
        }

        for (name, range) in [
            ("question_count_range", d.question_count_range),
            ("sentence_count_range", d.sentence_count_range),
            ("gap_count", d.gap_count),
        ] {
            if let Some(range) = range {
                if range.max == 0 {
                    warnings.push(warn(format!("{name} allows no items")));
                }
            }
        }

        if d.max_options == 0 {
            warnings.push(warn("max_options is 0".into()));
        }
        if !d.default_options.is_empty() && d.default_options.len() > d.max_options {
            warnings.push(warn(format!(
                "{} default options exceed max_options {}",
                d.default_options.len(),
                d.max_options
            )));
        }
        if !d.option_labels.is_empty() && d.option_labels.len() < d.max_options {
            warnings.push(warn(format!(
                "only {} option labels for up to {} options",
                d.option_labels.len(),
                d.max_options
            )));
        }
        if d.vocab_tier > entry.tier {
            warnings.push(warn(format!(
                "vocabulary tier {} is above the exam tier",
                d.vocab_tier
            )));
        }
        if let Some(format) = &d.explanation_format {
            if !format.contains('{') {
                warnings.push(warn("explanation_format has no placeholders".into()));
            }
        }
    }

    for (type_name, _) in registry.shapes() {
        if !registry.entries().any(|e| e.type_name == type_name.as_str()) {
            warnings.push(ValidationWarning {
                tier: None,
                type_name: Some(type_name.clone()),
                message: "shape configured for a type no tier uses".into(),
            });
        }
    }

    warnings
}

/// Report tiers whose vocabulary is empty; rewriting draws nothing from them.
pub fn validate_vocabulary(corpus: &VocabularyCorpus) -> Vec<ValidationWarning> {
    Tier::all()
        .filter(|tier| corpus.len(*tier) == 0)
        .map(|tier| ValidationWarning {
            tier: Some(tier),
            type_name: None,
            message: "vocabulary is empty".into(),
        })
        .collect()
}

/// Check weight rows without building a table, collecting the first problem.
pub fn validate_weight_rows(rows: &[Vec<f64>]) -> Vec<ValidationWarning> {
    match crate::weights::LevelWeightTable::from_rows(rows) {
        Ok(_) => Vec::new(),
        Err(e) => vec![ValidationWarning::general(e.to_string())],
    }
}
