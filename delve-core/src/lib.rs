//! # Delve Core
//!
//! Core library for the Delve research assistant.
//! Provides the iterative research loop (planning, evidence gathering,
//! coverage evaluation, deep dive, verification and synthesis), the oracle
//! and search provider interfaces, configuration, and report rendering.

pub mod config;
pub mod error;
pub mod evidence;
pub mod lines;
pub mod oracle;
pub mod prompts;
pub mod providers;
pub mod research;
pub mod sources;

// Re-export commonly used types at the crate root.
pub use config::{DelveConfig, OracleConfig, ResearchConfig, SearchConfig};
pub use error::{DelveError, OracleError, ProviderError, Result, WorkflowError};
pub use evidence::{EvidenceRecord, ProviderKind, SearchHit};
pub use oracle::{MockOracle, Oracle};
pub use providers::create_oracle;
pub use research::{
    NoOpCallback, ResearchCallback, ResearchState, RunStats, Stage, WorkflowEngine, render_report,
};
pub use sources::{MockSearchProvider, ProviderSet, SearchProvider};
