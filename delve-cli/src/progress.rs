//! Console progress reporting for a research run.

use delve_core::research::{ResearchCallback, Stage};

/// Prints one line per stage and a short result line after each step.
pub struct ConsoleProgress {
    quiet: bool,
}

impl ConsoleProgress {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    fn emit(&self, lines: Vec<String>) {
        if self.quiet {
            return;
        }
        for line in lines {
            println!("{}", line);
        }
    }
}

/// Heading printed when a stage starts. `iteration` and `depth` are the
/// counts completed so far.
pub fn stage_line(stage: Stage, iteration: usize, depth: usize) -> Option<String> {
    let line = match stage {
        Stage::Planning => format!("\n[plan] Generating sub-queries (round {})...", iteration + 1),
        Stage::Searching => "\n[search] Searching academic, web and Kaggle sources...".to_string(),
        Stage::Evaluating => "\n[evaluate] Checking coverage...".to_string(),
        Stage::DeepDiving => format!("\n[deep dive] Following related papers (depth {})...", depth + 1),
        Stage::Verifying => "\n[verify] Cross-checking sources...".to_string(),
        Stage::Outlining => "\n[outline] Drafting the outline...".to_string(),
        Stage::Composing => "\n[compose] Writing the article...".to_string(),
        Stage::Done => return None,
    };
    Some(line)
}

pub fn subquery_lines(added: &[String]) -> Vec<String> {
    let mut lines = vec![format!("  ✓ {} sub-queries", added.len())];
    lines.extend(
        added
            .iter()
            .enumerate()
            .map(|(i, sq)| format!("    {}. {}", i + 1, sq)),
    );
    lines
}

pub fn coverage_lines(needs_more_search: bool, gaps: &[String]) -> Vec<String> {
    if !needs_more_search {
        return vec!["  ✓ Coverage is sufficient".to_string()];
    }
    if gaps.is_empty() {
        return vec!["  • Coverage is insufficient".to_string()];
    }
    let mut lines = vec!["  • Missing aspects:".to_string()];
    lines.extend(gaps.iter().map(|gap| format!("    - {}", gap)));
    lines
}

impl ResearchCallback for ConsoleProgress {
    fn on_stage(&self, stage: Stage, iteration: usize, depth: usize) {
        self.emit(stage_line(stage, iteration, depth).into_iter().collect());
    }

    fn on_subqueries(&self, added: &[String]) {
        self.emit(subquery_lines(added));
    }

    fn on_search_complete(&self, added: usize, total: usize) {
        self.emit(vec![format!("  ✓ {} new sources ({} total)", added, total)]);
    }

    fn on_coverage(&self, needs_more_search: bool, gaps: &[String]) {
        self.emit(coverage_lines(needs_more_search, gaps));
    }

    fn on_deep_dive(&self, depth: usize, followups: usize) {
        self.emit(vec![format!(
            "  ✓ {} related papers at depth {}",
            followups, depth
        )]);
    }
}
