//! Session reports with JSON persistence.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{RejectedRecord, Session};
use crate::grading::{GradingResult, Outcome};
use crate::shape::Shape;
use crate::statistics::{compute_session_stats, SessionStats};
use crate::tier::Tier;

/// A graded session, ready to persist or print.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    pub tier: Tier,
    /// Seed that fixes display order and rewriting for the session.
    pub seed: u64,
    pub questions: Vec<QuestionReport>,
    pub rejected: Vec<RejectedRecord>,
    pub aggregate: GradingResult,
    pub stats: SessionStats,
}

/// One loaded question's outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionReport {
    pub index: usize,
    pub type_name: String,
    pub category: Option<String>,
    pub shape: Shape,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub result: GradingResult,
}

impl SessionReport {
    /// Build a report from a session and its aggregate grading.
    pub fn build(session: &Session, aggregate: GradingResult) -> Self {
        let questions = session
            .ready()
            .map(|(index, q)| QuestionReport {
                index,
                type_name: q.record.type_name.clone(),
                category: q.category.clone(),
                shape: q.shape,
                warnings: q.warnings.clone(),
                result: GradingResult::from_items(
                    aggregate
                        .items
                        .iter()
                        .filter(|item| item.question_index == index)
                        .cloned()
                        .collect(),
                ),
            })
            .collect();

        Self {
            session_id: session.id(),
            created_at: session.created_at(),
            tier: session.tier(),
            seed: session.seed(),
            questions,
            rejected: session.rejected().cloned().collect(),
            stats: compute_session_stats(session, &aggregate),
            aggregate,
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: SessionReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Default file name: `report-<session id>.json`.
    pub fn file_name(&self) -> String {
        format!("report-{}.json", self.session_id)
    }

    /// Format the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**{}** session `{}`: {} correct of {} graded ({} items)\n\n",
            self.tier,
            self.session_id,
            self.aggregate.correct_count,
            self.aggregate.graded,
            self.aggregate.total
        ));

        md.push_str("| # | Type | Shape | Score | Notes |\n");
        md.push_str("|---|------|-------|-------|-------|\n");
        for q in &self.questions {
            let missed: Vec<String> = q
                .result
                .items
                .iter()
                .filter(|i| i.outcome == Outcome::Incorrect)
                .map(|i| (i.slot + 1).to_string())
                .collect();
            let notes = match (missed.is_empty(), q.result.ungraded()) {
                (true, 0) => String::new(),
                (true, n) => format!("{n} ungraded"),
                (false, 0) => format!("missed {}", missed.join(", ")),
                (false, n) => format!("missed {}; {n} ungraded", missed.join(", ")),
            };
            md.push_str(&format!(
                "| {} | {} | {} | {}/{} | {} |\n",
                q.index + 1,
                q.type_name,
                q.shape,
                q.result.correct_count,
                q.result.graded,
                notes
            ));
        }

        if !self.rejected.is_empty() {
            md.push_str("\n### Rejected records\n\n");
            for r in &self.rejected {
                md.push_str(&format!(
                    "- #{} `{}`: {}\n",
                    r.index + 1,
                    r.type_name.as_deref().unwrap_or("?"),
                    r.reason
                ));
            }
        }

        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorRegistry;
    use crate::engine::{AssessmentEngine, EngineConfig};
    use crate::rewriter::DifficultyRewriter;
    use serde_json::json;
    use std::sync::Arc;

    fn graded_report() -> SessionReport {
        let engine = AssessmentEngine::new(
            Arc::new(DescriptorRegistry::default()),
            Arc::new(DifficultyRewriter::passthrough()),
            EngineConfig {
                seed: Some(5),
                ..Default::default()
            },
        );
        let records = vec![
            json!({"type": "判断", "options": ["对", "错"], "answer": "B"}),
            json!({"type": "坏的"}),
            json!({"type": "判断", "options": ["对", "错"], "answer": "A"}),
        ];
        let mut session = engine.load_values(records, Tier::MIN);
        engine.select(&mut session, 0, 0, "B").unwrap();
        engine.select(&mut session, 2, 0, "B").unwrap();
        let aggregate = engine.submit_all(&mut session);
        SessionReport::build(&session, aggregate)
    }

    #[test]
    fn build_splits_items_per_question() {
        let report = graded_report();
        assert_eq!(report.questions.len(), 2);
        assert_eq!(report.questions[0].result.correct_count, 1);
        assert_eq!(report.questions[1].index, 2);
        assert_eq!(report.questions[1].result.correct_count, 0);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.aggregate.total, 2);
    }

    #[test]
    fn json_roundtrip() {
        let report = graded_report();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(report.file_name());

        report.save_json(&path).unwrap();
        let loaded = SessionReport::load_json(&path).unwrap();

        assert_eq!(loaded.session_id, report.session_id);
        assert_eq!(loaded.aggregate, report.aggregate);
        assert_eq!(loaded.stats, report.stats);
    }

    #[test]
    fn markdown_output() {
        let md = graded_report().to_markdown();
        assert!(md.contains("1 correct of 2 graded"));
        assert!(md.contains("missed 1"));
        assert!(md.contains("Rejected records"));
    }
}
