//! Web search over the DuckDuckGo HTML endpoint.
//!
//! No API key is needed. The results page is scraped for result anchors and
//! snippets; DuckDuckGo wraps outbound links in a redirect (`/l/?uddg=...`)
//! which is unwrapped to the real target.

use crate::text::{decode_entities, html_to_text};
use async_trait::async_trait;
use delve_core::config::SearchConfig;
use delve_core::error::ProviderError;
use delve_core::evidence::SearchHit;
use delve_core::sources::SearchProvider;
use regex::Regex;
use std::sync::LazyLock;

const DUCKDUCKGO_HTML: &str = "https://html.duckduckgo.com/html/";

static RESULT_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a\s([^>]*class="[^"]*\bresult__a\b[^"]*"[^>]*)>(.*?)</a>"#)
        .expect("static regex")
});
static RESULT_SNIPPET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<(a|div|td)\s[^>]*class="[^"]*\bresult__snippet\b[^"]*"[^>]*>(.*?)</(?:a|div|td)>"#)
        .expect("static regex")
});
static HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="([^"]*)""#).expect("static regex"));

/// General web search, optionally restricted to one site.
pub struct WebSearch {
    client: reqwest::Client,
    name: String,
    endpoint: String,
    site: Option<String>,
    timeout_secs: u64,
}

impl WebSearch {
    pub fn new(config: &SearchConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: crate::http_client("web", config)?,
            name: "web".to_string(),
            endpoint: DUCKDUCKGO_HTML.to_string(),
            site: None,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Web search limited to `site` (a `site:` operator is prepended to
    /// every query). Used for the discussion facet.
    pub fn restricted_to(site: &str, config: &SearchConfig) -> Result<Self, ProviderError> {
        let mut search = Self::new(config)?;
        search.name = format!("web:{}", site);
        search.site = Some(site.to_string());
        Ok(search)
    }

    /// Point the client at a different results endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn effective_query(&self, query: &str) -> String {
        match &self.site {
            Some(site) => format!("site:{} {}", site, query),
            None => query.to_string(),
        }
    }
}

#[async_trait]
impl SearchProvider for WebSearch {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ProviderError> {
        let query = self.effective_query(query);
        let url = format!("{}?q={}", self.endpoint, urlencoding::encode(&query));
        tracing::debug!(provider = %self.name, %query, "Web search");

        let body = crate::get_text(&self.name, self.timeout_secs, self.client.get(&url)).await?;
        let mut hits = parse_results(&body);
        hits.truncate(max_results);
        Ok(hits)
    }
}

/// Parse a DuckDuckGo HTML results page.
///
/// Each result anchor is paired with the first snippet that follows it and
/// precedes the next anchor. Ads and results without a resolvable link are
/// skipped.
pub fn parse_results(html: &str) -> Vec<SearchHit> {
    let anchors: Vec<(usize, &str, &str)> = RESULT_ANCHOR
        .captures_iter(html)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let attrs = caps.get(1)?.as_str();
            let href = HREF.captures(attrs)?.get(1)?.as_str();
            Some((whole.start(), href, caps.get(2)?.as_str()))
        })
        .collect();
    let snippets: Vec<(usize, String)> = RESULT_SNIPPET
        .captures_iter(html)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some((whole.start(), html_to_text(caps.get(2)?.as_str())))
        })
        .collect();

    let mut hits = Vec::new();
    for (i, (start, href, title_html)) in anchors.iter().enumerate() {
        let Some(url) = resolve_link(href) else {
            continue;
        };
        let title = html_to_text(title_html);
        if title.is_empty() {
            continue;
        }
        let next_start = anchors.get(i + 1).map(|a| a.0).unwrap_or(usize::MAX);
        let summary = snippets
            .iter()
            .find(|(pos, _)| *pos > *start && *pos < next_start)
            .map(|(_, text)| text.clone())
            .unwrap_or_default();
        hits.push(SearchHit::new(title, url, summary));
    }
    hits
}

/// Turn a result `href` into the real target URL.
///
/// Returns `None` for ad-click links and anything that is not http(s).
pub fn resolve_link(href: &str) -> Option<String> {
    let href = decode_entities(href);
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href
    };
    let parsed = url::Url::parse(&absolute).ok()?;

    let is_duckduckgo = parsed
        .host_str()
        .is_some_and(|host| host == "duckduckgo.com" || host.ends_with(".duckduckgo.com"));
    if is_duckduckgo {
        if parsed.path() == "/l/" {
            let (_, target) = parsed.query_pairs().find(|(key, _)| key == "uddg")?;
            return resolve_link(&target);
        }
        return None;
    }

    match parsed.scheme() {
        "http" | "https" => Some(absolute),
        _ => None,
    }
}
