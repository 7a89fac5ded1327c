//! Iterative research loop.
//!
//! A run moves through a fixed set of stages:
//! 1. **Planning** - derive sub-queries from the question or from open gaps
//! 2. **Searching** - fan sub-queries out across every search provider
//! 3. **Evaluating** - judge coverage; loop back to planning while gaps remain
//! 4. **Deep diving** - follow the strongest academic leads to related work
//! 5. **Verifying**, **Outlining**, **Composing** - cross-check and write
//!
//! [`WorkflowEngine`] owns the counters and the transition table; each stage
//! lives in its own module and only touches the `ResearchState` fields it
//! produces.

pub mod aggregator;
pub mod coverage;
pub mod deep_dive;
pub mod engine;
pub mod planner;
pub mod report;
pub mod state;
pub mod synthesis;
pub mod verification;

pub use aggregator::{RoundSummary, SourceAggregator};
pub use coverage::CoverageEvaluator;
pub use deep_dive::DeepDiveExplorer;
pub use engine::{Caps, WorkflowEngine, next_stage};
pub use planner::QueryPlanner;
pub use report::{RunStats, render_report};
pub use state::{NoOpCallback, RecordingCallback, ResearchCallback, ResearchState, Stage};
pub use synthesis::{ArticleComposer, OutlineSynthesizer};
pub use verification::VerificationAnalyst;

/// Upper bound on planning/search rounds per run.
pub const MAX_ITERATIONS: usize = 3;

/// Upper bound on deep-dive rounds per run.
pub const MAX_DEPTH: usize = 2;

/// Literal the coverage evaluator emits when no further search is needed.
pub const SUFFICIENCY_SENTINEL: &str = "SUFFICIENT";

/// Maximum gaps kept from an insufficient coverage verdict.
pub const MAX_GAPS: usize = 3;

/// Maximum sub-queries kept from one planning reply.
pub const MAX_SUBQUERIES_PER_ROUND: usize = 5;
