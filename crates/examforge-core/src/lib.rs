//! examforge-core: difficulty-adaptive rewriting, question shapes, and grading.
//!
//! This crate defines the tier-indexed vocabulary data, the lexical rewriter,
//! the declarative descriptor registry, the closed set of question shapes,
//! and the assessment engine that ties them together.

pub mod answer;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod grading;
pub mod label;
pub mod parser;
pub mod phonetic;
pub mod record;
pub mod render;
pub mod report;
pub mod rewriter;
pub mod segment;
pub mod shape;
pub mod statistics;
pub mod tier;
pub mod traits;
pub mod vocabulary;
pub mod weights;

pub use engine::{AssessmentEngine, EngineConfig, Session};
pub use tier::Tier;
