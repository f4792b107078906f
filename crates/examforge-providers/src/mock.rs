//! Mock collaborators for testing the engine without real services.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use examforge_core::error::CollaboratorError;
use examforge_core::traits::{
    AudioHandle, GenerationRequest, ImageSynthesizer, QuestionGenerator, SpeechRequest,
    SpeechSynthesizer,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A question generator that replays scripted responses.
///
/// Each call pops the next scripted result; once the script is exhausted the
/// fallback response is returned.
pub struct MockGenerator {
    script: Mutex<VecDeque<Result<String, CollaboratorError>>>,
    fallback: String,
    call_count: AtomicU32,
    last_request: Mutex<Option<GenerationRequest>>,
}

impl MockGenerator {
    /// A generator that always returns `response`.
    pub fn with_fixed_response(response: &str) -> Self {
        Self::scripted(Vec::new(), response)
    }

    /// A generator that plays `script` in order, then returns `fallback`.
    pub fn scripted(script: Vec<Result<String, CollaboratorError>>, fallback: &str) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: fallback.to_string(),
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        lock(&self.last_request).clone()
    }
}

#[async_trait]
impl QuestionGenerator for MockGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, CollaboratorError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *lock(&self.last_request) = Some(request.clone());
        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// A speech synthesizer that records requests and optionally fails on
/// texts containing a marker.
#[derive(Default)]
pub struct MockSpeech {
    fail_on: Option<String>,
    requests: Mutex<Vec<SpeechRequest>>,
}

impl MockSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every request whose text contains `marker`.
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_on: Some(marker.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<SpeechRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSpeech {
    fn name(&self) -> &str {
        "mock"
    }

    async fn synthesize(&self, request: &SpeechRequest) -> Result<AudioHandle, CollaboratorError> {
        let index = {
            let mut requests = lock(&self.requests);
            requests.push(request.clone());
            requests.len()
        };
        if let Some(marker) = &self.fail_on {
            if request.text.contains(marker.as_str()) {
                return Err(CollaboratorError::SynthesisFailed(format!(
                    "mock failure on {marker:?}"
                )));
            }
        }
        Ok(AudioHandle {
            uri: format!("mock://audio/{index}"),
            duration_ms: Some(1000),
        })
    }
}

/// An image synthesizer that returns fixed bytes, or nothing.
#[derive(Default)]
pub struct MockImage {
    bytes: Option<Vec<u8>>,
    call_count: AtomicU32,
}

impl MockImage {
    pub fn returning(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Some(bytes),
            call_count: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ImageSynthesizer for MockImage {
    fn name(&self) -> &str {
        "mock"
    }

    async fn synthesize(&self, _description: &str) -> Result<Option<Vec<u8>>, CollaboratorError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        Ok(self.bytes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use examforge_core::traits::Voice;
    use examforge_core::Tier;

    fn request() -> GenerationRequest {
        GenerationRequest {
            tier: Tier::MIN,
            category: "阅读".into(),
            type_names: vec!["判断".into()],
            count: 3,
        }
    }

    #[tokio::test]
    async fn scripted_then_fallback() {
        let generator = MockGenerator::scripted(
            vec![Err(CollaboratorError::Timeout(5)), Ok("[]".into())],
            "{}",
        );
        assert!(generator.generate(&request()).await.is_err());
        assert_eq!(generator.generate(&request()).await.unwrap(), "[]");
        assert_eq!(generator.generate(&request()).await.unwrap(), "{}");
        assert_eq!(generator.call_count(), 3);
        assert_eq!(generator.last_request().unwrap().count, 3);
    }

    #[tokio::test]
    async fn speech_records_and_fails_on_marker() {
        let speech = MockSpeech::failing_on("坏");
        let mut req = SpeechRequest {
            text: "你好".into(),
            tier: Tier::MIN,
            voice: Voice::Male,
            rate_percent: -50,
        };
        assert_eq!(speech.synthesize(&req).await.unwrap().uri, "mock://audio/1");
        req.text = "坏了".into();
        assert!(speech.synthesize(&req).await.is_err());
        assert_eq!(speech.requests().len(), 2);
    }
}
