//! `examforge.toml` configuration and collaborator factories.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use examforge_core::answer::AttemptPolicy;
use examforge_core::descriptor::DescriptorRegistry;
use examforge_core::parser::parse_descriptors;
use examforge_core::rewriter::DifficultyRewriter;
use examforge_core::traits::{ImageSynthesizer, QuestionGenerator, SpeechSynthesizer};
use examforge_core::vocabulary::VocabularyCorpus;
use examforge_core::weights::LevelWeightTable;
use examforge_core::{AssessmentEngine, EngineConfig};

use crate::offline::{DirectoryImages, FixtureGenerator, PlaceholderImages, SilentSpeech};

/// Speech backend selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SpeechConfig {
    /// No speech; listening material is shown as text.
    #[default]
    None,
    Silent {
        #[serde(default = "default_audio_uri")]
        base_uri: String,
    },
}

fn default_audio_uri() -> String {
    "silent://".to_string()
}

/// Image backend selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ImageConfig {
    #[default]
    None,
    Placeholder,
    Directory { dir: PathBuf },
}

/// Question generator selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GeneratorConfig {
    Fixture { path: PathBuf },
}

/// Top-level examforge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamforgeConfig {
    /// Descriptor table (TOML).
    #[serde(default = "default_descriptors")]
    pub descriptors: PathBuf,
    /// Directory holding `1.json` .. `6.json` word lists.
    #[serde(default = "default_vocabulary_dir")]
    pub vocabulary_dir: PathBuf,
    /// Six rows of six source-tier weights; the built-in table when absent.
    #[serde(default)]
    pub weights: Option<Vec<Vec<f64>>>,
    /// Fixed session seed, for reproducible sessions.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Let learners change answers after submitting.
    #[serde(default)]
    pub allow_retry: bool,
    #[serde(default = "default_true")]
    pub shuffle_display: bool,
    /// Max retries on generator errors.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub images: ImageConfig,
    #[serde(default)]
    pub generator: Option<GeneratorConfig>,
}

fn default_descriptors() -> PathBuf {
    PathBuf::from("exam-sets/descriptors.toml")
}
fn default_vocabulary_dir() -> PathBuf {
    PathBuf::from("exam-sets/vocabulary")
}
fn default_true() -> bool {
    true
}
fn default_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    1000
}

impl Default for ExamforgeConfig {
    fn default() -> Self {
        Self {
            descriptors: default_descriptors(),
            vocabulary_dir: default_vocabulary_dir(),
            weights: None,
            seed: None,
            allow_retry: false,
            shuffle_display: true,
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
            speech: SpeechConfig::default(),
            images: ImageConfig::default(),
            generator: None,
        }
    }
}

impl ExamforgeConfig {
    /// Runtime options for the engine.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            seed: self.seed,
            attempt_policy: if self.allow_retry {
                AttemptPolicy::AllowRetry
            } else {
                AttemptPolicy::LockedAfterSubmit
            },
            shuffle_display: self.shuffle_display,
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    /// The configured weight table, validated.
    pub fn weight_table(&self) -> Result<LevelWeightTable> {
        match &self.weights {
            Some(rows) => LevelWeightTable::from_rows(rows).context("invalid `weights` in config"),
            None => Ok(LevelWeightTable::default()),
        }
    }

    /// Load the descriptor registry. A missing file is a configuration gap:
    /// the registry is empty and every type uses defaults.
    pub fn load_registry(&self) -> Result<DescriptorRegistry> {
        if !self.descriptors.exists() {
            tracing::warn!(
                "descriptor file {} not found, using defaults for every type",
                self.descriptors.display()
            );
            return Ok(DescriptorRegistry::default());
        }
        parse_descriptors(&self.descriptors)
    }

    /// Load the vocabulary corpus. A missing directory yields an empty corpus,
    /// which makes rewriting a no-op.
    pub fn load_corpus(&self) -> Result<VocabularyCorpus> {
        if !self.vocabulary_dir.is_dir() {
            tracing::warn!(
                "vocabulary directory {} not found, text will not be rewritten",
                self.vocabulary_dir.display()
            );
            return Ok(VocabularyCorpus::empty());
        }
        VocabularyCorpus::load_dir(&self.vocabulary_dir)
    }

    /// A rewriter over the configured vocabulary and weights.
    pub fn rewriter(&self) -> Result<DifficultyRewriter> {
        Ok(DifficultyRewriter::new(
            Arc::new(self.load_corpus()?),
            Arc::new(self.weight_table()?),
        ))
    }

    fn resolve_env(&mut self) {
        self.descriptors = resolve_path(&self.descriptors);
        self.vocabulary_dir = resolve_path(&self.vocabulary_dir);
        match &mut self.speech {
            SpeechConfig::Silent { base_uri } => *base_uri = resolve_env_vars(base_uri),
            SpeechConfig::None => {}
        }
        if let ImageConfig::Directory { dir } = &mut self.images {
            *dir = resolve_path(dir);
        }
        if let Some(GeneratorConfig::Fixture { path }) = &mut self.generator {
            *path = resolve_path(path);
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
/// Unset variables resolve to the empty string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut from = 0;
    while let Some(start) = result[from..].find("${").map(|i| i + from) {
        let Some(len) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + len];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + len + 1..]);
        from = start + value.len();
    }
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `examforge.toml` in the current directory
/// 2. `~/.config/examforge/config.toml`
///
/// `EXAMFORGE_DESCRIPTORS` and `EXAMFORGE_VOCABULARY_DIR` override the
/// data paths.
pub fn load_config() -> Result<ExamforgeConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamforgeConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("examforge.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = toml::from_str::<ExamforgeConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!("loaded config from {}", path.display());
            config
        }
        None => ExamforgeConfig::default(),
    };

    if let Ok(path) = std::env::var("EXAMFORGE_DESCRIPTORS") {
        config.descriptors = PathBuf::from(path);
    }
    if let Ok(dir) = std::env::var("EXAMFORGE_VOCABULARY_DIR") {
        config.vocabulary_dir = PathBuf::from(dir);
    }
    config.resolve_env();

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examforge"))
}

/// Create the configured speech synthesizer, if any.
pub fn create_speech(config: &SpeechConfig) -> Option<Arc<dyn SpeechSynthesizer>> {
    match config {
        SpeechConfig::None => None,
        SpeechConfig::Silent { base_uri } => Some(Arc::new(SilentSpeech::new(base_uri.clone()))),
    }
}

/// Create the configured image synthesizer, if any.
pub fn create_images(config: &ImageConfig) -> Option<Arc<dyn ImageSynthesizer>> {
    match config {
        ImageConfig::None => None,
        ImageConfig::Placeholder => Some(Arc::new(PlaceholderImages)),
        ImageConfig::Directory { dir } => Some(Arc::new(DirectoryImages::new(dir.clone()))),
    }
}

/// Create a question generator from its configuration.
pub fn create_generator(config: &GeneratorConfig) -> Box<dyn QuestionGenerator> {
    match config {
        GeneratorConfig::Fixture { path } => Box::new(FixtureGenerator::new(path.clone())),
    }
}

/// Assemble an engine from configuration: registry, rewriter, collaborators.
pub fn build_engine(config: &ExamforgeConfig) -> Result<AssessmentEngine> {
    let registry = config.load_registry()?;
    let rewriter = config.rewriter()?;
    let mut engine = AssessmentEngine::new(
        Arc::new(registry),
        Arc::new(rewriter),
        config.engine_config(),
    );
    if let Some(speech) = create_speech(&config.speech) {
        engine = engine.with_speech(speech);
    }
    if let Some(images) = create_images(&config.images) {
        engine = engine.with_images(images);
    }
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_EXAMFORGE_TEST_VAR", "data");
        assert_eq!(resolve_env_vars("${_EXAMFORGE_TEST_VAR}"), "data");
        assert_eq!(
            resolve_env_vars("${_EXAMFORGE_TEST_VAR}/vocab/${_EXAMFORGE_TEST_VAR}"),
            "data/vocab/data"
        );
        assert_eq!(resolve_env_vars("${_EXAMFORGE_UNSET_VAR}x"), "x");
        assert_eq!(resolve_env_vars("open ${brace"), "open ${brace");
        std::env::remove_var("_EXAMFORGE_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = ExamforgeConfig::default();
        assert_eq!(config.max_retries, 3);
        assert!(config.shuffle_display);
        assert_eq!(config.speech, SpeechConfig::None);
        let engine = config.engine_config();
        assert_eq!(engine.attempt_policy, AttemptPolicy::LockedAfterSubmit);
        assert_eq!(engine.retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
descriptors = "data/descriptors.toml"
seed = 42
allow_retry = true
weights = [
    [1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 0.0, 0.0, 1.0],
]

[speech]
type = "silent"

[images]
type = "directory"
dir = "images"

[generator]
type = "fixture"
path = "exam-sets/sample.json"
"#;
        let config: ExamforgeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.engine_config().attempt_policy, AttemptPolicy::AllowRetry);
        assert!(config.weight_table().is_ok());
        assert!(matches!(config.speech, SpeechConfig::Silent { ref base_uri } if base_uri == "silent://"));
        assert!(create_images(&config.images).is_some());
        assert!(config.generator.is_some());
    }

    #[test]
    fn bad_weights_are_rejected() {
        let config = ExamforgeConfig {
            weights: Some(vec![vec![0.5; 6]; 6]),
            ..Default::default()
        };
        let err = config.weight_table().unwrap_err();
        assert!(format!("{err:#}").contains("tier 1"));
    }

    #[test]
    fn explicit_path_must_exist() {
        assert!(load_config_from(Some(Path::new("/nonexistent/examforge.toml"))).is_err());
    }

    #[test]
    fn missing_data_degrades_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExamforgeConfig {
            descriptors: dir.path().join("none.toml"),
            vocabulary_dir: dir.path().join("none"),
            ..Default::default()
        };
        assert!(config.load_registry().unwrap().is_empty());
        assert!(config.load_corpus().unwrap().is_empty());
        assert!(build_engine(&config).is_ok());
    }
}
