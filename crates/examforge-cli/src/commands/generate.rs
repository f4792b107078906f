//! The `examforge generate` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use examforge_core::traits::GenerationRequest;
use examforge_core::Tier;
use examforge_providers::create_generator;

pub async fn execute(
    tier: Tier,
    category: String,
    types: Option<String>,
    count: usize,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = super::config(config_path)?;
    let generator_config = config
        .generator
        .as_ref()
        .context("no generator configured; add a [generator] table to examforge.toml")?;
    let generator = create_generator(generator_config);
    let engine = examforge_providers::build_engine(&config)?;

    let type_names: Vec<String> = types
        .map(|t| {
            t.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let request = GenerationRequest {
        tier,
        category,
        type_names,
        count,
    };

    println!(
        "Generating {count} {} question(s) with {}...",
        request.category,
        generator.name()
    );
    let session = engine
        .generate_question_set(generator.as_ref(), &request)
        .await
        .context("generation failed")?;

    let accepted: Vec<_> = session.ready().map(|(_, q)| q.record.clone()).collect();
    for r in session.rejected() {
        let type_name = r.type_name.as_deref().unwrap_or("<untyped>");
        println!("  [{}] REJECTED {type_name}: {}", r.index, r.reason);
    }
    println!(
        "{} accepted, {} rejected.",
        accepted.len(),
        session.rejected().count()
    );

    if let Some(path) = output {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::json!({ "questions": accepted });
        std::fs::write(&path, serde_json::to_string_pretty(&body)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Question set written to: {}", path.display());
    }

    Ok(())
}
