//! Evidence records gathered from search providers.
//!
//! Every result, whatever provider produced it, is reshaped into one closed
//! `EvidenceRecord` with a fixed field set. Provider identity is a closed
//! `ProviderKind` tag; unknown tags are rejected when parsed.

use crate::error::WorkflowError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which kind of source produced an evidence record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// Academic paper search (arXiv).
    Academic,
    /// General web search.
    Web,
    /// Data-science platform competitions.
    PlatformCompetition,
    /// Data-science platform datasets.
    PlatformDataset,
    /// Data-science platform notebooks.
    PlatformNotebook,
    /// Data-science platform discussion threads.
    PlatformDiscussion,
    /// Related academic work found while deep diving.
    AcademicFollowup,
}

impl ProviderKind {
    /// All kinds in their fixed reporting order.
    pub const ALL: [ProviderKind; 7] = [
        ProviderKind::Academic,
        ProviderKind::Web,
        ProviderKind::PlatformCompetition,
        ProviderKind::PlatformDataset,
        ProviderKind::PlatformNotebook,
        ProviderKind::PlatformDiscussion,
        ProviderKind::AcademicFollowup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Academic => "academic",
            ProviderKind::Web => "web",
            ProviderKind::PlatformCompetition => "platform-competition",
            ProviderKind::PlatformDataset => "platform-dataset",
            ProviderKind::PlatformNotebook => "platform-notebook",
            ProviderKind::PlatformDiscussion => "platform-discussion",
            ProviderKind::AcademicFollowup => "academic-followup",
        }
    }

    /// Kinds counted when deciding whether a sub-query was low yield.
    pub fn counts_toward_yield(&self) -> bool {
        matches!(
            self,
            ProviderKind::Academic
                | ProviderKind::Web
                | ProviderKind::PlatformCompetition
                | ProviderKind::PlatformDataset
        )
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| WorkflowError::UnknownProviderKind { tag: s.to_string() })
    }
}

/// A single raw hit as returned by a search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    /// Abstract, snippet or synthesized description.
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

impl SearchHit {
    pub fn new(title: impl Into<String>, url: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            summary: summary.into(),
            published_at: None,
        }
    }

    pub fn with_published_at(mut self, published_at: impl Into<String>) -> Self {
        self.published_at = Some(published_at.into());
        self
    }
}

/// A search hit tagged with where it came from. Identity is `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    /// The sub-query (or provenance string) that produced this record.
    pub origin_query: String,
    pub kind: ProviderKind,
    pub title: String,
    pub url: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

impl EvidenceRecord {
    pub fn from_hit(origin_query: impl Into<String>, kind: ProviderKind, hit: SearchHit) -> Self {
        Self {
            origin_query: origin_query.into(),
            kind,
            title: hit.title,
            url: hit.url,
            summary: hit.summary,
            published_at: hit.published_at,
        }
    }

    /// Build a record from a loosely typed provider tag, rejecting unknown tags.
    pub fn from_tagged(
        origin_query: impl Into<String>,
        tag: &str,
        hit: SearchHit,
    ) -> Result<Self, WorkflowError> {
        let kind = tag.parse()?;
        Ok(Self::from_hit(origin_query, kind, hit))
    }

    /// First `max_chars` characters of the summary, on a char boundary.
    pub fn excerpt(&self, max_chars: usize) -> &str {
        truncate_chars(&self.summary, max_chars)
    }
}

/// Truncate to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags_roundtrip() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = "kaggle".parse::<ProviderKind>().unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownProviderKind { ref tag } if tag == "kaggle"));

        let hit = SearchHit::new("t", "https://x", "s");
        assert!(EvidenceRecord::from_tagged("q", "blog", hit).is_err());
    }

    #[test]
    fn test_serde_uses_kebab_tags() {
        let json = serde_json::to_string(&ProviderKind::PlatformCompetition).unwrap();
        assert_eq!(json, "\"platform-competition\"");
        let kind: ProviderKind = serde_json::from_str("\"academic-followup\"").unwrap();
        assert_eq!(kind, ProviderKind::AcademicFollowup);
        assert!(serde_json::from_str::<ProviderKind>("\"forum\"").is_err());
    }

    #[test]
    fn test_yield_kinds() {
        let counted: Vec<_> = ProviderKind::ALL
            .iter()
            .filter(|k| k.counts_toward_yield())
            .collect();
        assert_eq!(counted.len(), 4);
        assert!(!ProviderKind::PlatformNotebook.counts_toward_yield());
        assert!(!ProviderKind::PlatformDiscussion.counts_toward_yield());
    }

    #[test]
    fn test_from_hit_keeps_fields() {
        let hit = SearchHit::new("Attention Is All You Need", "http://arxiv.org/abs/1706.03762v7", "abstract")
            .with_published_at("2017-06-12T17:57:34Z");
        let record = EvidenceRecord::from_hit("transformers", ProviderKind::Academic, hit);
        assert_eq!(record.origin_query, "transformers");
        assert_eq!(record.published_at.as_deref(), Some("2017-06-12T17:57:34Z"));
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("量子化モデル", 2), "量子");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 3), "");
    }
}
