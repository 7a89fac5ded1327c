//! Per-run research state and the stages that thread it.

use crate::evidence::{EvidenceRecord, ProviderKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Stage of a research run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Deriving sub-queries.
    Planning,
    /// Fanning sub-queries out to providers.
    Searching,
    /// Judging coverage of the evidence so far.
    Evaluating,
    /// Following academic leads to related work.
    DeepDiving,
    /// Cross-checking the evidence.
    Verifying,
    /// Drafting the outline.
    Outlining,
    /// Writing the article.
    Composing,
    /// Terminal.
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Planning => "planning",
            Stage::Searching => "searching",
            Stage::Evaluating => "evaluating",
            Stage::DeepDiving => "deep diving",
            Stage::Verifying => "verifying",
            Stage::Outlining => "outlining",
            Stage::Composing => "composing",
            Stage::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a single research run accumulates.
///
/// Created fresh for every run and owned by the engine until the article is
/// written. Collections only grow: sub-queries and results are appended,
/// explored URLs are only ever inserted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchState {
    query: String,
    pub subqueries: Vec<String>,
    pub search_results: Vec<EvidenceRecord>,
    pub outline: String,
    pub article: String,
    pub verification_report: String,
    /// Completed planning/search rounds.
    pub iteration: usize,
    pub needs_more_search: bool,
    pub gaps: Vec<String>,
    /// Completed deep-dive rounds.
    pub depth: usize,
    /// Deep-dive anchors and follow-ups already seen. Ordered so that
    /// serialized state is reproducible.
    pub explored_urls: BTreeSet<String>,
}

impl ResearchState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// The question being researched.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The last `n` sub-queries, oldest first.
    pub fn recent_subqueries(&self, n: usize) -> &[String] {
        let start = self.subqueries.len().saturating_sub(n);
        &self.subqueries[start..]
    }

    pub fn has_result_url(&self, url: &str) -> bool {
        self.search_results.iter().any(|r| r.url == url)
    }

    pub fn is_explored(&self, url: &str) -> bool {
        self.explored_urls.contains(url)
    }

    /// Record a URL as explored. Returns false if it already was.
    pub fn mark_explored(&mut self, url: impl Into<String>) -> bool {
        self.explored_urls.insert(url.into())
    }

    pub fn count_kind(&self, kind: ProviderKind) -> usize {
        self.search_results.iter().filter(|r| r.kind == kind).count()
    }
}

/// Callback trait for progress reporting during a run.
pub trait ResearchCallback: Send + Sync {
    /// Called when the engine enters a stage.
    fn on_stage(&self, stage: Stage, iteration: usize, depth: usize);
    /// Called with the sub-queries produced by a planning round.
    fn on_subqueries(&self, added: &[String]);
    /// Called after a search round with the number of records it appended.
    fn on_search_complete(&self, added: usize, total: usize);
    /// Called with the coverage verdict.
    fn on_coverage(&self, needs_more_search: bool, gaps: &[String]);
    /// Called after a deep-dive round.
    fn on_deep_dive(&self, depth: usize, followups: usize);
}

/// No-op callback for tests and library use.
pub struct NoOpCallback;

impl ResearchCallback for NoOpCallback {
    fn on_stage(&self, _stage: Stage, _iteration: usize, _depth: usize) {}
    fn on_subqueries(&self, _added: &[String]) {}
    fn on_search_complete(&self, _added: usize, _total: usize) {}
    fn on_coverage(&self, _needs_more_search: bool, _gaps: &[String]) {}
    fn on_deep_dive(&self, _depth: usize, _followups: usize) {}
}

/// Callback that records what it sees, for asserting on a run's path.
#[derive(Default)]
pub struct RecordingCallback {
    stages: Mutex<Vec<Stage>>,
    subqueries: Mutex<Vec<Vec<String>>>,
    coverage: Mutex<Vec<(bool, Vec<String>)>>,
    deep_dives: Mutex<Vec<(usize, usize)>>,
}

impl RecordingCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages entered, in order.
    pub fn stages(&self) -> Vec<Stage> {
        lock(&self.stages).clone()
    }

    /// Sub-queries added by each planning round.
    pub fn subqueries(&self) -> Vec<Vec<String>> {
        lock(&self.subqueries).clone()
    }

    /// Coverage verdicts as `(needs_more_search, gaps)`.
    pub fn coverage(&self) -> Vec<(bool, Vec<String>)> {
        lock(&self.coverage).clone()
    }

    /// Deep-dive rounds as `(depth, followups)`.
    pub fn deep_dives(&self) -> Vec<(usize, usize)> {
        lock(&self.deep_dives).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ResearchCallback for RecordingCallback {
    fn on_stage(&self, stage: Stage, _iteration: usize, _depth: usize) {
        lock(&self.stages).push(stage);
    }

    fn on_subqueries(&self, added: &[String]) {
        lock(&self.subqueries).push(added.to_vec());
    }

    fn on_search_complete(&self, _added: usize, _total: usize) {}

    fn on_coverage(&self, needs_more_search: bool, gaps: &[String]) {
        lock(&self.coverage).push((needs_more_search, gaps.to_vec()));
    }

    fn on_deep_dive(&self, depth: usize, followups: usize) {
        lock(&self.deep_dives).push((depth, followups));
    }
}
