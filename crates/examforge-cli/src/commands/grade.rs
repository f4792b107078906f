//! The `examforge grade` command.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use examforge_core::error::EngineError;
use examforge_core::label::Label;
use examforge_core::report::SessionReport;
use examforge_core::{AssessmentEngine, Session, Tier};

/// Answers keyed by question index; each slot holds a canonical label, or
/// null / "" to leave it blank.
type AnswerSheet = BTreeMap<String, Vec<Option<String>>>;

pub fn execute(
    questions: PathBuf,
    answers: PathBuf,
    tier: Tier,
    output: PathBuf,
    markdown: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = super::config(config_path)?;
    let engine = examforge_providers::build_engine(&config)?;

    let records = examforge_core::parser::load_question_file(&questions)?;
    let mut session = engine.load_values(records, tier);
    let sheet = load_answers(&answers)?;
    apply_answers(&engine, &mut session, &sheet)?;

    let aggregate = engine.submit_all(&mut session);
    let report = SessionReport::build(&session, aggregate);

    print_summary(&report);

    std::fs::create_dir_all(&output)?;
    let path = output.join(report.file_name());
    report.save_json(&path)?;
    println!("Report saved to: {}", path.display());

    if markdown {
        let path = path.with_extension("md");
        std::fs::write(&path, report.to_markdown())
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Markdown summary: {}", path.display());
    }

    Ok(())
}

fn load_answers(path: &Path) -> Result<AnswerSheet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read answers: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse answers: {}", path.display()))
}

fn apply_answers(engine: &AssessmentEngine, session: &mut Session, sheet: &AnswerSheet) -> Result<()> {
    for (key, slots) in sheet {
        let index: usize = key
            .trim()
            .parse()
            .with_context(|| format!("answer key `{key}` is not a question index"))?;
        if session.question(index).is_err() {
            tracing::warn!(index, "answers given for a question that did not load, ignoring");
            continue;
        }
        for (slot, answer) in slots.iter().enumerate() {
            let raw = answer.as_deref().map(str::trim).unwrap_or("");
            let label = if raw.is_empty() {
                None
            } else {
                match Label::parse(raw) {
                    Some(label) => Some(label),
                    None => {
                        tracing::warn!(index, slot, answer = raw, "not a label, leaving blank");
                        None
                    }
                }
            };
            match engine.select_canonical(session, index, slot, label) {
                Ok(()) => {}
                Err(e @ EngineError::LabelOutOfRange { .. }) => {
                    tracing::warn!(index, slot, answer = raw, "{e}, leaving blank");
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("question {index}, slot {slot}"));
                }
            }
        }
    }
    Ok(())
}

fn print_summary(report: &SessionReport) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["#", "Type", "Shape", "Correct", "Graded", "Items"]);
    for q in &report.questions {
        table.add_row(vec![
            Cell::new(q.index),
            Cell::new(&q.type_name),
            Cell::new(q.shape),
            Cell::new(q.result.correct_count),
            Cell::new(q.result.graded),
            Cell::new(q.result.total),
        ]);
    }
    println!("{table}");

    for r in &report.rejected {
        println!("  [{}] REJECTED: {}", r.index, r.reason);
    }

    let aggregate = &report.aggregate;
    let accuracy = aggregate
        .accuracy()
        .map(|a| format!("{:.1}%", a * 100.0))
        .unwrap_or_else(|| "n/a".to_string());
    println!(
        "\n{}: {} correct of {} graded ({} items), accuracy {accuracy}",
        report.tier, aggregate.correct_count, aggregate.graded, aggregate.total
    );
}
