//! Run statistics and Markdown report rendering.

use super::state::ResearchState;
use crate::evidence::ProviderKind;
use serde::Serialize;
use std::fmt::Write;

/// Summary numbers for a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub subqueries: usize,
    pub iterations: usize,
    pub depth: usize,
    pub followups: usize,
    pub total_sources: usize,
    /// Non-zero counts per kind, in fixed kind order.
    pub per_kind: Vec<(ProviderKind, usize)>,
}

impl RunStats {
    pub fn from_state(state: &ResearchState) -> Self {
        let per_kind: Vec<(ProviderKind, usize)> = ProviderKind::ALL
            .iter()
            .map(|kind| (*kind, state.count_kind(*kind)))
            .filter(|(_, count)| *count > 0)
            .collect();
        Self {
            subqueries: state.subqueries.len(),
            iterations: state.iteration,
            depth: state.depth,
            followups: state.count_kind(ProviderKind::AcademicFollowup),
            total_sources: state.search_results.len(),
            per_kind,
        }
    }
}

/// Render the Markdown report for a finished run.
///
/// `generated_at` is printed as given so that rendering stays deterministic.
pub fn render_report(state: &ResearchState, generated_at: &str) -> String {
    let stats = RunStats::from_state(state);
    let mut out = String::new();

    let _ = writeln!(out, "# Research Report: {}\n", state.query());
    let _ = writeln!(out, "Generated: {}\n", generated_at);

    out.push_str("## Subqueries\n\n");
    for (i, subquery) in state.subqueries.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, subquery);
    }

    out.push_str("\n## Sources\n\n");
    let _ = writeln!(out, "Total: {}", stats.total_sources);
    for (kind, count) in &stats.per_kind {
        let _ = writeln!(out, "- {}: {}", kind, count);
    }

    let _ = write!(out, "\n## Outline\n\n{}\n", state.outline.trim_end());
    if !state.verification_report.trim().is_empty() {
        let _ = write!(
            out,
            "\n## Verification\n\n{}\n",
            state.verification_report.trim_end()
        );
    }
    let _ = write!(out, "\n## Article\n\n{}\n", state.article.trim_end());
    out
}
