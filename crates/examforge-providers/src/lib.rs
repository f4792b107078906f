//! examforge-providers: offline collaborators and configuration.
//!
//! Implements the speech, image and question-generation traits without any
//! network service, and loads `examforge.toml` into a ready engine.

pub mod config;
pub mod mock;
pub mod offline;

pub use config::{
    build_engine, create_generator, create_images, create_speech, load_config, load_config_from,
    ExamforgeConfig, GeneratorConfig, ImageConfig, SpeechConfig,
};
