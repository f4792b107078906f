//! The assessment engine.
//!
//! Loads question sets into sessions, renders questions through their shape
//! adapters with rewritten text and resolved media, tracks answers, and
//! grades on submission. Generation goes through a retried collaborator call.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::answer::{AnswerRejection, AnswerState, AttemptPolicy, QuestionPhase};
use crate::descriptor::{DescriptorRegistry, TypeDescriptor};
use crate::error::{CollaboratorError, EngineError, RecordError};
use crate::grading::GradingResult;
use crate::label::Label;
use crate::record::QuestionRecord;
use crate::render::RenderPlan;
use crate::rewriter::DifficultyRewriter;
use crate::shape::{
    collect_answer, normalize, DisplayLayout, QuestionBody, RenderContext, Selected, Shape,
};
use crate::tier::Tier;
use crate::traits::{
    extract_json_payload, GenerationRequest, ImageSynthesizer, QuestionGenerator,
    SpeechSynthesizer,
};

const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Configuration for the assessment engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Session seed. `None` draws a fresh one per session.
    pub seed: Option<u64>,
    /// What a selection after submission does.
    pub attempt_policy: AttemptPolicy,
    /// Shuffle display order for shapes that allow it.
    pub shuffle_display: bool,
    /// Retries on transient generation errors.
    pub max_retries: u32,
    /// Initial delay between retries; doubles per attempt.
    pub retry_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: None,
            attempt_policy: AttemptPolicy::LockedAfterSubmit,
            shuffle_display: true,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// A record that normalized into its shape, with its session state.
#[derive(Debug, Clone)]
pub struct LoadedQuestion {
    pub record: QuestionRecord,
    pub category: Option<String>,
    pub shape: Shape,
    pub descriptor: TypeDescriptor,
    /// Tier the rewriter targets for this question.
    pub vocab_tier: Tier,
    pub body: QuestionBody,
    pub layout: DisplayLayout,
    pub answers: AnswerState,
    pub warnings: Vec<String>,
}

/// A record that could not be loaded, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRecord {
    pub index: usize,
    pub type_name: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub enum SessionEntry {
    Ready(Box<LoadedQuestion>),
    Rejected(RejectedRecord),
}

/// One learner's pass through one question set. Owns all answer state.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    tier: Tier,
    seed: u64,
    created_at: DateTime<Utc>,
    entries: Vec<SessionEntry>,
}

impl Session {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Number of records, loaded or rejected.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    pub fn question(&self, index: usize) -> Result<&LoadedQuestion, EngineError> {
        match self.entries.get(index) {
            Some(SessionEntry::Ready(q)) => Ok(q),
            Some(SessionEntry::Rejected(r)) => Err(EngineError::Rejected {
                index,
                reason: r.reason.clone(),
            }),
            None => Err(EngineError::NoSuchQuestion(index)),
        }
    }

    fn question_mut(&mut self, index: usize) -> Result<&mut LoadedQuestion, EngineError> {
        match self.entries.get_mut(index) {
            Some(SessionEntry::Ready(q)) => Ok(q),
            Some(SessionEntry::Rejected(r)) => Err(EngineError::Rejected {
                index,
                reason: r.reason.clone(),
            }),
            None => Err(EngineError::NoSuchQuestion(index)),
        }
    }

    /// Loaded questions with their indices.
    pub fn ready(&self) -> impl Iterator<Item = (usize, &LoadedQuestion)> {
        self.entries.iter().enumerate().filter_map(|(i, e)| match e {
            SessionEntry::Ready(q) => Some((i, q.as_ref())),
            SessionEntry::Rejected(_) => None,
        })
    }

    pub fn rejected(&self) -> impl Iterator<Item = &RejectedRecord> {
        self.entries.iter().filter_map(|e| match e {
            SessionEntry::Rejected(r) => Some(r),
            SessionEntry::Ready(_) => None,
        })
    }
}

/// Independent random streams per question, so rendering one question
/// never shifts the randomness of another.
#[derive(Debug, Clone, Copy)]
enum Stream {
    Layout = 0,
    Render = 1,
    Explanation = 2,
}

fn question_rng(seed: u64, index: usize, stream: Stream) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(((index as u64) << 2) | stream as u64);
    rng
}

/// The central assessment engine.
pub struct AssessmentEngine {
    registry: Arc<DescriptorRegistry>,
    rewriter: Arc<DifficultyRewriter>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    images: Option<Arc<dyn ImageSynthesizer>>,
    config: EngineConfig,
}

impl AssessmentEngine {
    pub fn new(
        registry: Arc<DescriptorRegistry>,
        rewriter: Arc<DifficultyRewriter>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            rewriter,
            speech: None,
            images: None,
            config,
        }
    }

    pub fn with_speech(mut self, speech: Arc<dyn SpeechSynthesizer>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn with_images(mut self, images: Arc<dyn ImageSynthesizer>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn registry(&self) -> &DescriptorRegistry {
        &self.registry
    }

    pub fn rewriter(&self) -> &DifficultyRewriter {
        &self.rewriter
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Load typed records into a new session.
    pub fn load_question_set(&self, records: Vec<QuestionRecord>, tier: Tier) -> Session {
        self.load(records.into_iter().map(Ok).collect(), tier, None)
    }

    /// Load raw JSON values; values that are not records are rejected
    /// individually.
    pub fn load_values(&self, values: Vec<Value>, tier: Tier) -> Session {
        self.load(values.into_iter().map(into_record).collect(), tier, None)
    }

    fn load(
        &self,
        inputs: Vec<Result<QuestionRecord, (Option<String>, RecordError)>>,
        tier: Tier,
        expected_types: Option<&[String]>,
    ) -> Session {
        let seed = self.config.seed.unwrap_or_else(rand::random);
        let mut session = Session {
            id: Uuid::new_v4(),
            tier,
            seed,
            created_at: Utc::now(),
            entries: Vec::with_capacity(inputs.len()),
        };

        for (index, input) in inputs.into_iter().enumerate() {
            let entry = match input {
                Ok(record) => match self.load_one(index, record, tier, seed, expected_types) {
                    Ok(question) => SessionEntry::Ready(Box::new(question)),
                    Err(rejected) => SessionEntry::Rejected(rejected),
                },
                Err((type_name, error)) => SessionEntry::Rejected(RejectedRecord {
                    index,
                    type_name,
                    reason: error.to_string(),
                }),
            };
            if let SessionEntry::Rejected(r) = &entry {
                tracing::warn!(
                    session = %session.id,
                    index,
                    type_name = r.type_name.as_deref().unwrap_or("?"),
                    "skipping malformed record: {}",
                    r.reason
                );
            }
            session.entries.push(entry);
        }

        tracing::info!(
            session = %session.id,
            %tier,
            loaded = session.ready().count(),
            rejected = session.rejected().count(),
            "question set loaded"
        );
        session
    }

    fn load_one(
        &self,
        index: usize,
        record: QuestionRecord,
        tier: Tier,
        seed: u64,
        expected_types: Option<&[String]>,
    ) -> Result<LoadedQuestion, RejectedRecord> {
        let reject = |reason: String| RejectedRecord {
            index,
            type_name: Some(record.type_name.clone()),
            reason,
        };

        if let Some(expected) = expected_types.filter(|t| !t.is_empty()) {
            if !expected.iter().any(|t| *t == record.type_name) {
                return Err(reject(format!(
                    "type `{}` was not requested",
                    record.type_name
                )));
            }
        }

        let mut warnings = Vec::new();
        // A category on the record narrows the lookup; a wrong one falls back
        // to searching the whole tier.
        let found = record
            .category()
            .and_then(|category| {
                self.registry
                    .lookup(tier, category, &record.type_name)
                    .map(|d| (category.to_string(), d.clone()))
            })
            .or_else(|| {
                self.registry
                    .find(tier, &record.type_name)
                    .map(|(category, d)| (category.to_string(), d.clone()))
            });
        let (category, descriptor) = match found {
            Some((category, descriptor)) => (Some(category), descriptor),
            None => {
                tracing::warn!(
                    %tier,
                    type_name = %record.type_name,
                    "no descriptor configured, using defaults"
                );
                warnings.push("no descriptor configured for this type; using defaults".into());
                (record.category().map(str::to_string), TypeDescriptor::default())
            }
        };

        let shape = match self.registry.shape_of(&record.type_name) {
            Some(shape) => shape,
            None => match record.infer_shape() {
                Some(shape) => {
                    tracing::debug!(type_name = %record.type_name, %shape, "inferred shape");
                    shape
                }
                None => {
                    return Err(reject(
                        RecordError::UnknownShape {
                            type_name: record.type_name.clone(),
                        }
                        .to_string(),
                    ))
                }
            },
        };

        let normalized = normalize(&record, shape, &descriptor).map_err(|e| reject(e.to_string()))?;
        warnings.extend(normalized.warnings);

        let vocab_tier = record.vocab_override().unwrap_or(descriptor.vocab_tier);
        let shuffle = descriptor
            .shuffle_display
            .unwrap_or(self.config.shuffle_display);
        let mut rng = question_rng(seed, index, Stream::Layout);
        let layout = DisplayLayout::build(normalized.body.adapter(), &descriptor, shuffle, &mut rng);
        let answers = AnswerState::new(normalized.body.adapter().slot_count());

        Ok(LoadedQuestion {
            record,
            category,
            shape,
            descriptor,
            vocab_tier,
            body: normalized.body,
            layout,
            answers,
            warnings,
        })
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    /// Render one question. Rewriting is seeded per session and question, so
    /// re-rendering shows the same text.
    pub async fn render(&self, session: &Session, index: usize) -> Result<RenderPlan, EngineError> {
        let question = session.question(index)?;
        let adapter = question.body.adapter();
        let mut rng = question_rng(session.seed, index, Stream::Render);
        let mut plan = RenderPlan::new(question.shape);
        plan.question_index = index;
        plan.type_name = question.record.type_name.clone();
        plan.warnings = question.warnings.clone();

        let mut ctx = RenderContext {
            rewriter: &self.rewriter,
            descriptor: &question.descriptor,
            vocab_tier: question.vocab_tier,
            session_tier: session.tier,
            layout: &question.layout,
            rng: &mut rng,
        };
        adapter.render(&mut ctx, &mut plan);

        for input in &mut plan.slots {
            input.selected = question.answers.selection(input.slot).and_then(|label| {
                question
                    .layout
                    .mapping(input.choice_set)
                    .and_then(|m| m.to_display(label))
                    .map(str::to_string)
            });
        }

        self.resolve_media(&mut plan).await;
        Ok(plan)
    }

    async fn resolve_media(&self, plan: &mut RenderPlan) {
        match &self.speech {
            Some(speech) => {
                let requests: Vec<_> = plan.audio_clips().map(|c| c.request.clone()).collect();
                let results = join_all(requests.iter().map(|r| speech.synthesize(r))).await;
                for (clip, result) in plan.audio_clips_mut().zip(results) {
                    match result {
                        Ok(handle) => clip.handle = Some(handle),
                        Err(e) => {
                            tracing::warn!(
                                synthesizer = speech.name(),
                                "speech synthesis failed, showing text instead: {e}"
                            );
                            clip.degraded = true;
                        }
                    }
                }
            }
            None => {
                for clip in plan.audio_clips_mut() {
                    clip.degraded = true;
                }
            }
        }

        match &self.images {
            Some(images) => {
                let descriptions: Vec<String> =
                    plan.images().map(|i| i.description.clone()).collect();
                let results = join_all(descriptions.iter().map(|d| images.synthesize(d))).await;
                for (image, result) in plan.images_mut().zip(results) {
                    match result {
                        Ok(Some(bytes)) => image.bytes = Some(bytes),
                        Ok(None) => image.placeholder = true,
                        Err(e) => {
                            tracing::warn!(
                                synthesizer = images.name(),
                                "image generation failed, using placeholder: {e}"
                            );
                            image.placeholder = true;
                        }
                    }
                }
            }
            None => {
                for image in plan.images_mut() {
                    image.placeholder = true;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Answering and grading
    // -----------------------------------------------------------------------

    /// Record learner input for a slot: a display label or option text.
    /// Empty input clears the slot. Input that matches nothing leaves the
    /// state unchanged and returns [`Selected::Unresolved`].
    pub fn select(
        &self,
        session: &mut Session,
        index: usize,
        slot: usize,
        input: &str,
    ) -> Result<Selected, EngineError> {
        let policy = self.config.attempt_policy;
        let question = session.question_mut(index)?;
        let adapter = question.body.adapter();
        if slot >= adapter.slot_count() {
            return Err(EngineError::NoSuchSlot { index, slot });
        }
        let selected = collect_answer(adapter, &question.layout, slot, input);
        let label = match selected {
            Selected::Label(label) => Some(label),
            Selected::Cleared => None,
            Selected::Unresolved => {
                tracing::debug!(index, slot, input, "input matches no option");
                return Ok(selected);
            }
        };
        question
            .answers
            .select(slot, label, policy)
            .map_err(|e| rejection(e, index, slot))?;
        Ok(selected)
    }

    /// Record a canonical label directly, bypassing display labels. A label
    /// past the end of the slot's choice set is refused and the state is
    /// left unchanged.
    pub fn select_canonical(
        &self,
        session: &mut Session,
        index: usize,
        slot: usize,
        label: Option<Label>,
    ) -> Result<(), EngineError> {
        let policy = self.config.attempt_policy;
        let question = session.question_mut(index)?;
        let adapter = question.body.adapter();
        if slot >= adapter.slot_count() {
            return Err(EngineError::NoSuchSlot { index, slot });
        }
        if let Some(label) = label {
            let options = adapter
                .choice_sets()
                .get(adapter.choice_set_of(slot))
                .map_or(0, |set| set.len());
            if label.index() >= options {
                return Err(EngineError::LabelOutOfRange {
                    index,
                    slot,
                    label,
                    options,
                });
            }
        }
        question
            .answers
            .select(slot, label, policy)
            .map_err(|e| rejection(e, index, slot))
    }

    /// Grade a question and lock in the result. Submitting again returns
    /// the recorded result unchanged.
    pub fn submit(&self, session: &mut Session, index: usize) -> Result<GradingResult, EngineError> {
        let seed = session.seed;
        let session_id = session.id;
        let question = session.question_mut(index)?;
        if let Some(result) = question.answers.submitted_result() {
            return Ok(result.clone());
        }
        let result = self.grade_question(question, index, seed);
        question.answers.record_submission(result.clone());
        tracing::info!(
            session = %session_id,
            index,
            correct = result.correct_count,
            graded = result.graded,
            total = result.total,
            "question submitted"
        );
        Ok(result)
    }

    /// Submit every loaded question and return the aggregate.
    pub fn submit_all(&self, session: &mut Session) -> GradingResult {
        let indices: Vec<usize> = session.ready().map(|(i, _)| i).collect();
        let mut total = GradingResult::default();
        for index in indices {
            if let Ok(result) = self.submit(session, index) {
                total.merge(result);
            }
        }
        total
    }

    /// Aggregate over the session: recorded results for submitted questions,
    /// current selections for the rest. Rejected records are not items.
    pub fn score(&self, session: &Session) -> GradingResult {
        let mut total = GradingResult::default();
        for (index, question) in session.ready() {
            let result = match question.answers.phase() {
                QuestionPhase::Submitted => question
                    .answers
                    .submitted_result()
                    .cloned()
                    .unwrap_or_default(),
                _ => self.grade_question(question, index, session.seed),
            };
            total.merge(result);
        }
        total
    }

    fn grade_question(&self, question: &LoadedQuestion, index: usize, seed: u64) -> GradingResult {
        let adapter = question.body.adapter();
        let mut rng = question_rng(seed, index, Stream::Explanation);
        let mut items = adapter.grade(index, question.answers.selections());
        for item in &mut items {
            item.explanation = self.explain(question, item.slot, &mut rng);
        }
        GradingResult::from_items(items)
    }

    fn explain(&self, question: &LoadedQuestion, slot: usize, rng: &mut ChaCha8Rng) -> Option<String> {
        let adapter = question.body.adapter();
        let source = adapter.explanation(slot);
        let text = source.text.or(source.key)?;
        let explanation = self.rewriter.rewrite(text, question.vocab_tier, rng);
        let key = source
            .key
            .map(|k| self.rewriter.rewrite(k, question.vocab_tier, rng))
            .unwrap_or_default();
        let mapping = question.layout.mapping(adapter.choice_set_of(slot));
        let answer = adapter
            .answer_key(slot)
            .map(|k| {
                mapping
                    .and_then(|m| m.to_display(k))
                    .map_or_else(|| k.to_string(), str::to_string)
            })
            .unwrap_or_default();
        let order = match &question.body {
            QuestionBody::Ordering(q) => q.correct_order(mapping).unwrap_or_default(),
            _ => answer.clone(),
        };
        let id = adapter.slot_id(slot);
        Some(question.descriptor.format_explanation(&[
            ("explanation", explanation.as_str()),
            ("answer", answer.as_str()),
            ("correct_order", order.as_str()),
            ("question_id", id.as_str()),
            ("explanation_key", key.as_str()),
        ]))
    }

    // -----------------------------------------------------------------------
    // Generation
    // -----------------------------------------------------------------------

    /// Ask a generator for a question set and load what comes back.
    ///
    /// Transient errors are retried with exponential backoff (capped at 60s),
    /// honoring rate-limit hints. Records of types that were not requested,
    /// or that fail normalization, are rejected one by one.
    pub async fn generate_question_set(
        &self,
        generator: &dyn QuestionGenerator,
        request: &GenerationRequest,
    ) -> Result<Session, CollaboratorError> {
        let raw = self.generate_with_retries(generator, request).await?;
        let values = extract_json_payload(&raw).inspect_err(|e| {
            tracing::error!(generator = generator.name(), "unusable generation: {e}");
        })?;
        let inputs = values.into_iter().map(into_record).collect();
        let session = self.load(inputs, request.tier, Some(request.type_names.as_slice()));
        for rejected in session.rejected() {
            tracing::error!(
                generator = generator.name(),
                index = rejected.index,
                "generated record rejected: {}",
                rejected.reason
            );
        }
        Ok(session)
    }

    async fn generate_with_retries(
        &self,
        generator: &dyn QuestionGenerator,
        request: &GenerationRequest,
    ) -> Result<String, CollaboratorError> {
        let mut last_error = None;
        let mut retry_delay = self.config.retry_delay;
        for retry in 0..=self.config.max_retries {
            if retry > 0 {
                tokio::time::sleep(retry_delay).await;
                retry_delay = (retry_delay * 2).min(MAX_RETRY_DELAY);
            }
            match generator.generate(request).await {
                Ok(raw) => return Ok(raw),
                Err(e) if e.is_permanent() => {
                    tracing::error!(generator = generator.name(), "generation failed: {e}");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        generator = generator.name(),
                        attempt = retry + 1,
                        "generation failed, retrying: {e}"
                    );
                    if let Some(ms) = e.retry_after_ms() {
                        retry_delay = Duration::from_millis(ms).min(MAX_RETRY_DELAY);
                    }
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| CollaboratorError::Unavailable("no attempts made".into())))
    }
}

fn into_record(value: Value) -> Result<QuestionRecord, (Option<String>, RecordError)> {
    let type_name = value
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string);
    QuestionRecord::from_value(value).map_err(|e| (type_name, e))
}

fn rejection(e: AnswerRejection, index: usize, slot: usize) -> EngineError {
    match e {
        AnswerRejection::NoSuchSlot => EngineError::NoSuchSlot { index, slot },
        AnswerRejection::Locked => EngineError::Locked(index),
    }
}
