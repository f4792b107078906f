//! Render plans: what a front end should show for one question.
//!
//! Adapters produce plans with media requests still pending; the engine
//! resolves them against the speech and image collaborators.

use serde::{Deserialize, Serialize};

use crate::shape::Shape;
use crate::traits::{AudioHandle, SpeechRequest};

/// A spoken clip. When synthesis fails the clip is marked `degraded` and the
/// front end should show `request.text` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioClip {
    pub request: SpeechRequest,
    #[serde(default)]
    pub handle: Option<AudioHandle>,
    #[serde(default)]
    pub degraded: bool,
}

impl AudioClip {
    pub fn pending(request: SpeechRequest) -> Self {
        Self {
            request,
            handle: None,
            degraded: false,
        }
    }
}

/// A picture, either generated bytes or a placeholder showing the description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub description: String,
    #[serde(skip)]
    pub bytes: Option<Vec<u8>>,
    #[serde(default)]
    pub placeholder: bool,
}

impl ImageAsset {
    pub fn pending(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            bytes: None,
            placeholder: false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.bytes.is_some() || self.placeholder
    }
}

/// One visual element of a rendered question, in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderBlock {
    Instruction { text: String },
    Passage {
        text: String,
        /// Tone-marked pinyin of `text`, for types that show it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pinyin: Option<String>,
    },
    Audio { clip: AudioClip },
    Image { image: ImageAsset },
    /// Prompt text, attached to an input slot when it belongs to one.
    Prompt {
        #[serde(default)]
        slot: Option<usize>,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pinyin: Option<String>,
    },
}

/// An option as displayed, under its display label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayChoice {
    pub label: String,
    pub text: String,
    /// `text` under its label, per the type's options template.
    pub formatted: String,
    #[serde(default)]
    pub image: Option<ImageAsset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinyin: Option<String>,
}

/// Where the learner picks an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSlot {
    pub slot: usize,
    /// Index into [`RenderPlan::choice_sets`].
    pub choice_set: usize,
    /// Display label of the current selection.
    #[serde(default)]
    pub selected: Option<String>,
}

/// Everything needed to draw one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPlan {
    pub question_index: usize,
    pub type_name: String,
    pub shape: Shape,
    pub blocks: Vec<RenderBlock>,
    pub choice_sets: Vec<Vec<DisplayChoice>>,
    pub slots: Vec<InputSlot>,
    /// Load-time warnings carried along for display.
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl RenderPlan {
    pub fn new(shape: Shape) -> Self {
        Self {
            question_index: 0,
            type_name: String::new(),
            shape,
            blocks: Vec::new(),
            choice_sets: Vec::new(),
            slots: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn push(&mut self, block: RenderBlock) {
        self.blocks.push(block);
    }

    /// All learner-visible text, in display order. Used for inspection and
    /// plain-text output.
    pub fn visible_text(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for block in &self.blocks {
            match block {
                RenderBlock::Instruction { text }
                | RenderBlock::Passage { text, .. }
                | RenderBlock::Prompt { text, .. } => out.push(text.as_str()),
                RenderBlock::Audio { clip } if clip.degraded => out.push(clip.request.text.as_str()),
                RenderBlock::Image { image } if image.placeholder => {
                    out.push(image.description.as_str())
                }
                _ => {}
            }
        }
        for set in &self.choice_sets {
            out.extend(set.iter().map(|c| c.text.as_str()));
        }
        out
    }

    pub fn audio_clips(&self) -> impl Iterator<Item = &AudioClip> {
        self.blocks.iter().filter_map(|b| match b {
            RenderBlock::Audio { clip } => Some(clip),
            _ => None,
        })
    }

    /// Every image in the plan, blocks first, then option images.
    pub fn images(&self) -> impl Iterator<Item = &ImageAsset> {
        let block_images = self.blocks.iter().filter_map(|b| match b {
            RenderBlock::Image { image } => Some(image),
            _ => None,
        });
        let choice_images = self
            .choice_sets
            .iter()
            .flat_map(|set| set.iter().filter_map(|c| c.image.as_ref()));
        block_images.chain(choice_images)
    }

    pub(crate) fn audio_clips_mut(&mut self) -> impl Iterator<Item = &mut AudioClip> {
        self.blocks.iter_mut().filter_map(|b| match b {
            RenderBlock::Audio { clip } => Some(clip),
            _ => None,
        })
    }

    pub(crate) fn images_mut(&mut self) -> impl Iterator<Item = &mut ImageAsset> {
        let block_images = self.blocks.iter_mut().filter_map(|b| match b {
            RenderBlock::Image { image } => Some(image),
            _ => None,
        });
        let choice_images = self
            .choice_sets
            .iter_mut()
            .flat_map(|set| set.iter_mut().filter_map(|c| c.image.as_mut()));
        block_images.chain(choice_images)
    }
}
