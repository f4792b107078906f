//! Collaborators that work without any external service.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use async_trait::async_trait;

use examforge_core::error::CollaboratorError;
use examforge_core::traits::{
    AudioHandle, GenerationRequest, ImageSynthesizer, QuestionGenerator, SpeechRequest,
    SpeechSynthesizer,
};

/// Reading pace at the neutral rate, in characters per second.
const CHARS_PER_SECOND: u64 = 4;

/// Produces silent audio handles with a plausible duration, so renders carry
/// timing information without a speech service.
pub struct SilentSpeech {
    base_uri: String,
}

impl SilentSpeech {
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
        }
    }

    /// Estimated playback length: slower tiers stretch the same text.
    pub fn estimate_duration_ms(request: &SpeechRequest) -> u64 {
        let chars = request.text.chars().filter(|c| !c.is_whitespace()).count() as u64;
        let neutral = chars * 1000 / CHARS_PER_SECOND;
        let speed = (100 + i64::from(request.rate_percent)).max(10) as u64;
        neutral * 100 / speed
    }
}

impl Default for SilentSpeech {
    fn default() -> Self {
        Self::new("silent://")
    }
}

#[async_trait]
impl SpeechSynthesizer for SilentSpeech {
    fn name(&self) -> &str {
        "silent"
    }

    async fn synthesize(&self, request: &SpeechRequest) -> Result<AudioHandle, CollaboratorError> {
        if request.text.trim().is_empty() {
            return Err(CollaboratorError::SynthesisFailed("nothing to speak".into()));
        }
        let mut hasher = DefaultHasher::new();
        request.text.hash(&mut hasher);
        request.tier.hash(&mut hasher);
        Ok(AudioHandle {
            uri: format!(
                "{}{}/{:016x}.mp3",
                self.base_uri,
                request.voice,
                hasher.finish()
            ),
            duration_ms: Some(Self::estimate_duration_ms(request)),
        })
    }
}

/// Never produces an image; every request falls back to a placeholder.
#[derive(Debug, Default)]
pub struct PlaceholderImages;

#[async_trait]
impl ImageSynthesizer for PlaceholderImages {
    fn name(&self) -> &str {
        "placeholder"
    }

    async fn synthesize(&self, _description: &str) -> Result<Option<Vec<u8>>, CollaboratorError> {
        Ok(None)
    }
}

/// Serves pre-made images from a directory, looked up by description.
///
/// A description maps to `<dir>/<description>.png`; path separators in the
/// description are replaced so lookups stay inside the directory.
pub struct DirectoryImages {
    dir: PathBuf,
}

impl DirectoryImages {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, description: &str) -> PathBuf {
        let name: String = description
            .trim()
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | '.') { '_' } else { c })
            .collect();
        self.dir.join(format!("{name}.png"))
    }
}

#[async_trait]
impl ImageSynthesizer for DirectoryImages {
    fn name(&self) -> &str {
        "directory"
    }

    async fn synthesize(&self, description: &str) -> Result<Option<Vec<u8>>, CollaboratorError> {
        let path = self.path_for(description);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no image at {}", path.display());
                Ok(None)
            }
            Err(e) => Err(CollaboratorError::SynthesisFailed(format!(
                "{}: {e}",
                path.display()
            ))),
        }
    }
}

/// Returns a question set stored on disk, whatever is requested.
pub struct FixtureGenerator {
    path: PathBuf,
}

impl FixtureGenerator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl QuestionGenerator for FixtureGenerator {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, CollaboratorError> {
        tracing::debug!(
            tier = %request.tier,
            category = %request.category,
            "serving fixture {}",
            self.path.display()
        );
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| CollaboratorError::Unavailable(format!("{}: {e}", self.path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use examforge_core::traits::Voice;
    use examforge_core::Tier;

    fn request(text: &str, level: u8) -> SpeechRequest {
        let tier = Tier::new(level).unwrap();
        SpeechRequest {
            text: text.into(),
            tier,
            voice: Voice::Female,
            rate_percent: tier.speech_rate_percent(),
        }
    }

    #[tokio::test]
    async fn silent_speech_is_stable_and_slower_at_low_tiers() {
        let speech = SilentSpeech::default();
        let a = speech.synthesize(&request("你好，我是学生。", 1)).await.unwrap();
        let b = speech.synthesize(&request("你好，我是学生。", 1)).await.unwrap();
        let fast = speech.synthesize(&request("你好，我是学生。", 6)).await.unwrap();
        assert_eq!(a, b);
        assert!(a.uri.starts_with("silent://female/"));
        assert_eq!(fast.duration_ms, Some(2000));
        assert_eq!(a.duration_ms, Some(4000));
        assert!(speech.synthesize(&request("  ", 1)).await.is_err());
    }

    #[tokio::test]
    async fn directory_images() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("一只猫.png"), [1u8, 2, 3]).unwrap();
        let images = DirectoryImages::new(dir.path());
        assert_eq!(images.synthesize("一只猫").await.unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(images.synthesize("一只狗").await.unwrap(), None);
        assert!(images.path_for("../etc/passwd").starts_with(dir.path()));
        assert_eq!(PlaceholderImages.synthesize("x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn fixture_generator_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("set.json");
        std::fs::write(&path, r#"[{"type": "a"}]"#).unwrap();
        let request = GenerationRequest {
            tier: Tier::MIN,
            category: "听力".into(),
            type_names: vec![],
            count: 1,
        };
        let raw = FixtureGenerator::new(&path).generate(&request).await.unwrap();
        assert!(raw.contains("\"a\""));
        let missing = FixtureGenerator::new(dir.path().join("none.json"));
        assert!(missing.generate(&request).await.unwrap_err().is_permanent());
    }
}
