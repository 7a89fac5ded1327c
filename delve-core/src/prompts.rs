//! Role instructions and task prompts for every oracle call.
//!
//! The loop only depends on the *shape* of each reply (one item per line, or
//! the sufficiency sentinel); wording lives here so it can change without
//! touching stage logic.

use crate::evidence::EvidenceRecord;
use crate::research::SUFFICIENCY_SENTINEL;
use std::fmt::Write;

pub const PLANNER_ROLE: &str = "You are a research assistant who breaks a research question \
into concrete, searchable sub-queries.";

pub const REWRITER_ROLE: &str = "You are a search specialist who rewrites queries that \
returned too few results.";

pub const COVERAGE_ROLE: &str = "You are a research reviewer who judges whether collected \
sources answer a question.";

pub const DEEP_DIVE_ROLE: &str = "You are a research lead who picks the sources most worth \
following up.";

pub const VERIFICATION_ROLE: &str = "You are a fact-checking analyst who compares sources \
for consistency, credibility and freshness.";

pub const OUTLINE_ROLE: &str = "You are a research editor who structures findings into an \
outline.";

pub const WRITER_ROLE: &str = "You are a research writer who produces well-cited articles.";

/// Characters of summary shown per record in the outline prompt.
pub const OUTLINE_EXCERPT_CHARS: usize = 200;

/// Characters of summary shown per record in the verification prompt.
pub const VERIFICATION_EXCERPT_CHARS: usize = 300;

/// Ask for 3-5 sub-queries. The first round plans from `query`; later rounds
/// plan from the open gaps alone.
pub fn planner_prompt(query: &str, gaps: &[String]) -> String {
    let mut prompt = String::new();
    if gaps.is_empty() {
        let _ = writeln!(prompt, "Research question: {query}");
    } else {
        prompt.push_str("The sources collected so far leave these aspects uncovered:\n");
        for gap in gaps {
            let _ = writeln!(prompt, "- {gap}");
        }
        prompt.push_str("\nFocus the new sub-queries on these gaps.\n");
    }
    prompt.push_str(
        "\nGenerate 3 to 5 concrete search queries that together cover the question.\n\
         Output one query per line with no numbering or commentary.",
    );
    prompt
}

/// Ask for broader rewrites of queries that came back nearly empty.
pub fn rewrite_prompt(low_yield: &[String]) -> String {
    let mut prompt = String::from(
        "These search queries returned too few results:\n",
    );
    for query in low_yield {
        let _ = writeln!(prompt, "- {query}");
    }
    let _ = write!(
        prompt,
        "\nRewrite them to find more material: use broader terms, paraphrase, and add English \
         keywords where helpful.\nOutput at most {} rewritten queries, one per line.",
        low_yield.len()
    );
    prompt
}

/// Ask whether `records` answer `query`; expects the sentinel or a gap list.
pub fn coverage_prompt(query: &str, records: &[EvidenceRecord]) -> String {
    let mut prompt = format!("Research question: {query}\n\nCollected sources:\n");
    for record in records {
        let _ = writeln!(prompt, "- [{}] {}", record.kind, record.title);
    }
    let _ = write!(
        prompt,
        "\nIf these sources are enough to answer the question, reply with exactly \
         {SUFFICIENT}.\nOtherwise list up to 3 missing aspects, one per line, each starting with \"- \".",
        SUFFICIENT = SUFFICIENCY_SENTINEL
    );
    prompt
}

/// Ask which candidate titles are most worth deepening.
pub fn deep_dive_prompt(query: &str, titles: &[&str], picks: usize) -> String {
    let mut prompt = format!("Research question: {query}\n\nCandidate papers:\n");
    for (i, title) in titles.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}", i + 1, title);
    }
    let _ = write!(
        prompt,
        "\nChoose at most {picks} papers whose related work would most deepen understanding \
         of the question.\nOutput each chosen title exactly as written, one per line."
    );
    prompt
}

/// Ask for contradictions, credibility notes and freshness issues.
pub fn verification_prompt(query: &str, records: &[EvidenceRecord]) -> String {
    let mut prompt = format!("Research question: {query}\n\nSources:\n");
    for (i, record) in records.iter().enumerate() {
        let _ = write!(
            prompt,
            "[{}] ({}) {}\n{}\n",
            i + 1,
            record.kind,
            record.title,
            record.excerpt(VERIFICATION_EXCERPT_CHARS)
        );
        if let Some(published) = &record.published_at {
            let _ = writeln!(prompt, "Published: {published}");
        }
        prompt.push('\n');
    }
    prompt.push_str(
        "Review the sources and report:\n\
         1. Claims that contradict each other across sources, citing source numbers.\n\
         2. Credibility: weigh peer-reviewed academic sources above general web content.\n\
         3. Freshness: note outdated information or recency discrepancies.\n\
         If nothing stands out, say that no major contradictions were found.",
    );
    prompt
}

/// Ask for a sectioned outline in `language`.
pub fn outline_prompt(query: &str, records: &[EvidenceRecord], language: &str) -> String {
    let mut prompt = format!("Research question: {query}\n\nSources:\n");
    for record in records {
        let _ = writeln!(
            prompt,
            "- {}: {}",
            record.title,
            record.excerpt(OUTLINE_EXCERPT_CHARS)
        );
    }
    let _ = write!(
        prompt,
        "\nWrite a sectioned outline for a research article answering the question. \
         Use Markdown headings. Write in {language}."
    );
    prompt
}

/// Ask for the final cited article in `language`.
pub fn article_prompt(
    query: &str,
    outline: &str,
    records: &[EvidenceRecord],
    verification_report: &str,
    language: &str,
) -> String {
    let mut prompt = format!("Research question: {query}\n\nOutline:\n{outline}\n\nSources:\n");
    for record in records {
        let _ = write!(
            prompt,
            "[{}] {}\n{}\nURL: {}\n\n",
            record.kind, record.title, record.summary, record.url
        );
    }
    if !verification_report.is_empty() {
        let _ = write!(
            prompt,
            "Verification notes (take these into account):\n{verification_report}\n\n"
        );
    }
    let _ = write!(
        prompt,
        "Write the article following the outline. Cite the source URL after every claim. \
         Where sources contradict each other, present both positions. Write in {language}."
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{ProviderKind, SearchHit};

    fn record(kind: ProviderKind, title: &str, summary: &str) -> EvidenceRecord {
        EvidenceRecord::from_hit(
            "q",
            kind,
            SearchHit::new(title, format!("https://example.org/{title}"), summary),
        )
    }

    #[test]
    fn test_planner_prompt_uses_gaps_when_present() {
        let first = planner_prompt("llm quantization", &[]);
        assert!(first.contains("llm quantization"));
        assert!(!first.contains("uncovered"));

        let gaps = vec!["hardware support".to_string()];
        let later = planner_prompt("llm quantization", &gaps);
        assert!(later.contains("- hardware support"));
        assert!(later.contains("3 to 5"));
        assert!(!later.contains("llm quantization"));
    }

    #[test]
    fn test_rewrite_prompt_bounds_output() {
        let prompt = rewrite_prompt(&["a".into(), "b".into()]);
        assert!(prompt.contains("at most 2 rewritten"));
    }

    #[test]
    fn test_coverage_prompt_mentions_sentinel() {
        let records = vec![record(ProviderKind::Academic, "Paper", "s")];
        let prompt = coverage_prompt("q", &records);
        assert!(prompt.contains("- [academic] Paper"));
        assert!(prompt.contains(SUFFICIENCY_SENTINEL));
    }

    #[test]
    fn test_verification_prompt_truncates() {
        let long = "x".repeat(1_000);
        let records = vec![record(ProviderKind::Web, "Blog", &long)];
        let prompt = verification_prompt("q", &records);
        assert!(prompt.contains("[1] (web) Blog"));
        assert!(!prompt.contains(&"x".repeat(VERIFICATION_EXCERPT_CHARS + 1)));
    }

    #[test]
    fn test_article_prompt_verification_note() {
        let records = vec![record(ProviderKind::Academic, "Paper", "abstract")];
        let without = article_prompt("q", "# Outline", &records, "", "English");
        assert!(!without.contains("Verification notes"));
        assert!(without.contains("URL: https://example.org/Paper"));

        let with = article_prompt("q", "# Outline", &records, "Source 1 is dated.", "Japanese");
        assert!(with.contains("Verification notes"));
        assert!(with.contains("Write in Japanese"));
    }

    #[test]
    fn test_roles_are_distinct() {
        let roles = [
            PLANNER_ROLE,
            REWRITER_ROLE,
            COVERAGE_ROLE,
            DEEP_DIVE_ROLE,
            VERIFICATION_ROLE,
            OUTLINE_ROLE,
            WRITER_ROLE,
        ];
        let unique: std::collections::HashSet<_> = roles.iter().collect();
        assert_eq!(unique.len(), roles.len());
    }
}
