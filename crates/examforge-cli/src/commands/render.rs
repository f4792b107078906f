//! The `examforge render` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use examforge_core::engine::SessionEntry;
use examforge_core::render::{RenderBlock, RenderPlan};
use examforge_core::traits::Voice;
use examforge_core::Tier;

pub async fn execute(
    questions: PathBuf,
    tier: Tier,
    index: Option<usize>,
    seed: Option<u64>,
    json: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let mut config = super::config(config_path)?;
    config.seed = seed.or(config.seed);
    let engine = examforge_providers::build_engine(&config)?;

    let records = examforge_core::parser::load_question_file(&questions)?;
    let session = engine.load_values(records, tier);

    let indices: Vec<usize> = match index {
        Some(i) if i < session.len() => vec![i],
        Some(i) => anyhow::bail!("question {i} out of range ({} records)", session.len()),
        None => (0..session.len()).collect(),
    };

    let mut plans = Vec::new();
    for i in indices {
        if let SessionEntry::Rejected(r) = &session.entries()[i] {
            if !json {
                println!("[{i}] REJECTED: {}\n", r.reason);
            }
            continue;
        }
        let plan = engine
            .render(&session, i)
            .await
            .with_context(|| format!("failed to render question {i}"))?;
        if json {
            plans.push(plan);
        } else {
            print_plan(&plan);
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&plans)?);
    }

    Ok(())
}

fn print_plan(plan: &RenderPlan) {
    println!("[{}] {} ({})", plan.question_index, plan.type_name, plan.shape);
    for block in &plan.blocks {
        match block {
            RenderBlock::Instruction { text } => println!("  {text}"),
            RenderBlock::Passage { text, pinyin } | RenderBlock::Prompt { text, pinyin, .. } => {
                println!("  {text}");
                if let Some(pinyin) = pinyin {
                    println!("  ({pinyin})");
                }
            }
            RenderBlock::Audio { clip } => {
                let voice = match clip.request.voice {
                    Voice::Female => "female",
                    Voice::Male => "male",
                };
                match &clip.handle {
                    Some(handle) if !clip.degraded => println!(
                        "  (audio {voice} {:+}%) {} <{}>",
                        clip.request.rate_percent, clip.request.text, handle.uri
                    ),
                    _ => println!("  (audio unavailable) {}", clip.request.text),
                }
            }
            RenderBlock::Image { image } => println!("  [image: {}]", image.description),
        }
    }
    for (set, choices) in plan.choice_sets.iter().enumerate() {
        if plan.choice_sets.len() > 1 {
            println!("  Options {}:", set + 1);
        }
        for choice in choices {
            match &choice.pinyin {
                Some(pinyin) => println!("    {} ({pinyin})", choice.formatted),
                None => println!("    {}", choice.formatted),
            }
        }
    }
    for w in &plan.warnings {
        println!("  WARNING: {w}");
    }
    println!();
}
