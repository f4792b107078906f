//! The `examforge rewrite` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};
use examforge_core::statistics::measure_rewrite_mixture;
use examforge_core::Tier;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub fn execute(
    text: String,
    tier: Tier,
    seed: Option<u64>,
    trials: Option<usize>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = super::config(config_path)?;
    let rewriter = config.rewriter()?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed.unwrap_or_else(rand::random));

    let Some(trials) = trials else {
        println!("{}", rewriter.rewrite(&text, tier, &mut rng));
        return Ok(());
    };

    let mixture = measure_rewrite_mixture(&rewriter, &text, tier, trials, &mut rng);
    println!(
        "{} tokens over {trials} trial(s), {:.1}% unchanged",
        mixture.tokens,
        mixture.unchanged_fraction() * 100.0
    );

    let mut table = Table::new();
    table.set_header(vec!["Tier", "Tokens", "Share"]);
    for (source, share) in Tier::all().zip(mixture.tier_fractions()) {
        table.add_row(vec![
            Cell::new(source),
            Cell::new(mixture.by_tier[source.index()]),
            Cell::new(format!("{:.1}%", share * 100.0)),
        ]);
    }
    table.add_row(vec![
        Cell::new("unknown"),
        Cell::new(mixture.unknown),
        Cell::new("-"),
    ]);
    println!("{table}");

    Ok(())
}
