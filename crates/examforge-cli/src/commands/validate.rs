//! The `examforge validate` command.

use std::path::PathBuf;

use anyhow::Result;
use examforge_core::engine::SessionEntry;
use examforge_core::parser::{validate_registry, validate_vocabulary, validate_weight_rows};
use examforge_core::Tier;

pub fn execute(questions: PathBuf, tier: Tier, config_path: Option<PathBuf>) -> Result<()> {
    let config = super::config(config_path)?;
    let engine = examforge_providers::build_engine(&config)?;
    let files = super::question_files(&questions)?;

    let mut accepted = 0;
    let mut rejected = 0;
    let mut total_warnings = 0;

    for (path, records) in files {
        println!("Question set: {} ({} records)", path.display(), records.len());
        let session = engine.load_values(records, tier);

        for (index, entry) in session.entries().iter().enumerate() {
            match entry {
                SessionEntry::Ready(q) => {
                    accepted += 1;
                    println!(
                        "  [{index}] OK {} ({})",
                        q.record.type_name,
                        q.shape.as_str()
                    );
                    for w in &q.warnings {
                        println!("      WARNING: {w}");
                    }
                    total_warnings += q.warnings.len();
                }
                SessionEntry::Rejected(r) => {
                    rejected += 1;
                    let type_name = r.type_name.as_deref().unwrap_or("<untyped>");
                    println!("  [{index}] REJECTED {type_name}: {}", r.reason);
                }
            }
        }
    }

    let mut config_warnings = validate_registry(engine.registry());
    config_warnings.extend(validate_vocabulary(engine.rewriter().corpus()));
    if let Some(rows) = &config.weights {
        config_warnings.extend(validate_weight_rows(rows));
    }
    if !config_warnings.is_empty() {
        println!("\nConfiguration:");
        for w in &config_warnings {
            println!("  WARNING: {w}");
        }
    }
    total_warnings += config_warnings.len();

    println!("\n{accepted} accepted, {rejected} rejected.");
    if total_warnings == 0 {
        println!("No warnings.");
    } else {
        println!("{total_warnings} warning(s) found.");
    }

    Ok(())
}
