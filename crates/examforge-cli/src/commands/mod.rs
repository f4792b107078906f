pub mod generate;
pub mod grade;
pub mod init;
pub mod render;
pub mod rewrite;
pub mod types;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::Result;
use examforge_providers::{load_config_from, ExamforgeConfig};

/// Load config, honoring an explicit `--config` path.
pub fn config(path: Option<PathBuf>) -> Result<ExamforgeConfig> {
    load_config_from(path.as_deref())
}

/// Question files from a path that may be a file or a directory.
pub fn question_files(path: &Path) -> Result<Vec<(PathBuf, Vec<serde_json::Value>)>> {
    if path.is_dir() {
        examforge_core::parser::load_question_directory(path)
    } else {
        let records = examforge_core::parser::load_question_file(path)?;
        Ok(vec![(path.to_path_buf(), records)])
    }
}
