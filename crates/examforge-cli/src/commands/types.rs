//! The `examforge types` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};
use examforge_core::Tier;

pub fn execute(tier: Option<Tier>, config_path: Option<PathBuf>) -> Result<()> {
    let config = super::config(config_path)?;
    let registry = config.load_registry()?;

    let mut table = Table::new();
    table.set_header(vec!["Tier", "Category", "Type", "Shape", "Media", "Vocab"]);

    let mut count = 0;
    for entry in registry.entries() {
        if tier.is_some_and(|t| t != entry.tier) {
            continue;
        }
        let media = match (entry.descriptor.requires_audio, entry.descriptor.requires_image) {
            (true, true) => "audio+image",
            (true, false) => "audio",
            (false, true) => "image",
            (false, false) => "",
        };
        table.add_row(vec![
            Cell::new(entry.tier),
            Cell::new(entry.category),
            Cell::new(entry.type_name),
            Cell::new(entry.shape.map(|s| s.to_string()).unwrap_or_else(|| "?".into())),
            Cell::new(media),
            Cell::new(entry.descriptor.vocab_tier),
        ]);
        count += 1;
    }

    if count == 0 {
        println!("No question types configured.");
        return Ok(());
    }

    println!("{table}");
    println!("{count} type(s).");
    Ok(())
}
