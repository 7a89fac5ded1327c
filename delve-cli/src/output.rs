//! Run summary printing and report persistence.

use chrono::{DateTime, TimeZone};
use delve_core::research::{ResearchState, RunStats, render_report};
use std::fmt::Display;
use std::path::{Path, PathBuf};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Statistics block printed after a run.
pub fn summary(state: &ResearchState) -> String {
    let stats = RunStats::from_state(state);
    let mut lines = vec![format!("Sub-queries ({}):", stats.subqueries)];
    lines.extend(
        state
            .subqueries
            .iter()
            .enumerate()
            .map(|(i, sq)| format!("  {}. {}", i + 1, sq)),
    );
    lines.push(format!("Search rounds: {}", stats.iterations));
    lines.push(format!(
        "Deep dive: depth {}, {} related papers",
        stats.depth, stats.followups
    ));
    lines.push(format!("Sources: {}", stats.total_sources));
    lines.extend(
        stats
            .per_kind
            .iter()
            .map(|(kind, count)| format!("  - {}: {}", kind, count)),
    );
    lines.join("\n")
}

/// File name for a report generated at `at`.
pub fn report_filename<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    format!("research_report_{}.md", at.format("%Y%m%d_%H%M%S"))
}

/// Write the Markdown report into `dir` and return its absolute path.
pub fn save_report<Tz: TimeZone>(
    dir: &Path,
    state: &ResearchState,
    at: &DateTime<Tz>,
) -> std::io::Result<PathBuf>
where
    Tz::Offset: Display,
{
    std::fs::create_dir_all(dir)?;
    let path = dir.join(report_filename(at));
    let generated_at = at.format(TIMESTAMP_FORMAT).to_string();
    std::fs::write(&path, render_report(state, &generated_at))?;
    std::fs::canonicalize(&path)
}
