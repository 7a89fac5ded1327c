//! arXiv search adapter: HTTP client, Atom feed parser and rate limiting.

use crate::text::{decode_entities, normalize_whitespace};
use async_trait::async_trait;
use delve_core::config::SearchConfig;
use delve_core::error::ProviderError;
use delve_core::evidence::SearchHit;
use delve_core::sources::SearchProvider;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const ARXIV_API_BASE: &str = "https://export.arxiv.org/api/query";
const PROVIDER: &str = "arxiv";

/// arXiv asks clients to leave three seconds between requests.
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(3);

/// One entry of an arXiv Atom feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ArxivEntry {
    pub arxiv_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub summary: String,
    pub published: String,
    pub abs_url: String,
}

impl From<ArxivEntry> for SearchHit {
    fn from(entry: ArxivEntry) -> Self {
        let hit = SearchHit::new(entry.title, entry.abs_url, entry.summary);
        if entry.published.is_empty() {
            hit
        } else {
            hit.with_published_at(entry.published)
        }
    }
}

/// Academic search over the arXiv API, relevance-sorted.
pub struct ArxivSearch {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl ArxivSearch {
    pub fn new(config: &SearchConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: crate::http_client(PROVIDER, config)?,
            base_url: ARXIV_API_BASE.to_string(),
            timeout_secs: config.timeout_secs,
            min_interval: MIN_REQUEST_INTERVAL,
            last_request: Mutex::new(None),
        })
    }

    /// Override the spacing enforced between requests.
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Point the client at a different API endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Wait until `min_interval` has passed since the previous request.
    ///
    /// The lock is held across the sleep so concurrent callers queue up
    /// instead of all firing once the interval elapses.
    async fn rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(instant) = *last {
            let elapsed = instant.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[async_trait]
impl SearchProvider for ArxivSearch {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ProviderError> {
        self.rate_limit().await;
        let url = build_search_url(&self.base_url, query, max_results);
        tracing::debug!(provider = PROVIDER, %url, "arXiv search");

        let body = crate::get_text(PROVIDER, self.timeout_secs, self.client.get(&url)).await?;
        let entries = parse_atom_feed(&body)?;
        Ok(entries.into_iter().map(SearchHit::from).collect())
    }
}

/// Build the arXiv API search URL.
pub fn build_search_url(base_url: &str, query: &str, max_results: usize) -> String {
    format!(
        "{}?search_query={}&start=0&max_results={}&sortBy=relevance&sortOrder=descending",
        base_url,
        urlencoding::encode(&format!("all:{}", query)),
        max_results,
    )
}

/// Parse an arXiv Atom feed into entries.
///
/// A body that is not a feed at all (an HTML error page, say) is a parse
/// error; a feed with no entries is an empty result.
pub fn parse_atom_feed(xml: &str) -> Result<Vec<ArxivEntry>, ProviderError> {
    if !xml.contains("<feed") {
        return Err(ProviderError::Parse {
            provider: PROVIDER.to_string(),
            message: "response is not an Atom feed".to_string(),
        });
    }
    Ok(extract_blocks(xml, "entry")
        .into_iter()
        .filter_map(parse_entry)
        .collect())
}

/// Extract the inner text of every `<tag>...</tag>` block.
fn extract_blocks<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let mut blocks = Vec::new();
    let mut search_from = 0;

    while let Some(pos) = xml[search_from..].find(&open) {
        let start = search_from + pos + open.len();
        let Some(len) = xml[start..].find(&close) else {
            break;
        };
        blocks.push(&xml[start..start + len]);
        search_from = start + len + close.len();
    }

    blocks
}

fn parse_entry(entry: &str) -> Option<ArxivEntry> {
    let id_url = extract_tag_text(entry, "id")?;
    let title = normalize_whitespace(&decode_entities(&extract_tag_text(entry, "title")?));
    if title.is_empty() {
        return None;
    }

    let authors = extract_blocks(entry, "author")
        .into_iter()
        .filter_map(|author| extract_tag_text(author, "name"))
        .map(|name| decode_entities(&name))
        .collect();

    let summary = normalize_whitespace(&decode_entities(
        &extract_tag_text(entry, "summary").unwrap_or_default(),
    ));
    let published = extract_tag_text(entry, "published").unwrap_or_default();

    Some(ArxivEntry {
        arxiv_id: extract_arxiv_id_from_url(&id_url),
        title,
        authors,
        summary,
        published,
        abs_url: id_url,
    })
}

/// Extract the text content of the first occurrence of `<tag>text</tag>`.
fn extract_tag_text(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);

    let mut search_from = 0;
    loop {
        let start_pos = search_from + xml[search_from..].find(&open)?;
        let after_name = start_pos + open.len();
        // Skip longer tag names sharing the prefix, e.g. <id> vs <idx>.
        match xml[after_name..].chars().next() {
            Some('>') | Some(' ') | Some('\n') | Some('\t') => {}
            _ => {
                search_from = after_name;
                continue;
            }
        }
        let content_start = xml[start_pos..].find('>')? + start_pos + 1;
        let content_end = xml[content_start..].find(&close)? + content_start;
        return Some(xml[content_start..content_end].trim().to_string());
    }
}

/// Extract the arXiv ID from a URL like "http://arxiv.org/abs/1706.03762v7".
pub fn extract_arxiv_id_from_url(url: &str) -> String {
    if let Some(pos) = url.rfind("/abs/") {
        url[pos + 5..].to_string()
    } else if let Some(pos) = url.rfind("/pdf/") {
        url[pos + 5..].trim_end_matches(".pdf").to_string()
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE_ENTRY: &str = r#"<entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <updated>2023-08-02T01:09:28Z</updated>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All
      You Need</title>
    <summary>  The dominant sequence transduction models are based on complex recurrent or
convolutional neural networks that include an encoder &amp; a decoder.  </summary>
    <author><name>Ashish Vaswani</name></author>
    <author><name>Noam Shazeer</name></author>
    <author><name>Niki Parmar</name></author>
    <arxiv:comment xmlns:arxiv="http://arxiv.org/schemas/atom">15 pages, 5 figures</arxiv:comment>
    <link href="http://arxiv.org/abs/1706.03762v7" rel="alternate" type="text/html"/>
    <link href="http://arxiv.org/pdf/1706.03762v7" title="pdf" type="application/pdf"/>
    <category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
</entry>"#;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom"
      xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/"
      xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title>ArXiv Query</title>
  <id>http://arxiv.org/api/abc</id>
  <opensearch:totalResults>100</opensearch:totalResults>
  <entry>
    <id>http://arxiv.org/abs/2210.17323v2</id>
    <published>2022-10-31T17:00:00Z</published>
    <title>GPTQ: Accurate Post-Training Quantization for Generative Pre-trained Transformers</title>
    <summary>Generative Pre-trained Transformer models are notable for their performance.</summary>
    <author><name>Elias Frantar</name></author>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2306.00978v5</id>
    <published>2023-06-01T17:59:10Z</published>
    <title>AWQ: Activation-aware Weight Quantization for LLM Compression</title>
    <summary>Large language models have transformed numerous AI applications.</summary>
    <author><name>Ji Lin</name></author>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2208.07339v2</id>
    <published>2022-08-15T00:00:00Z</published>
    <title>LLM.int8(): 8-bit Matrix Multiplication for Transformers at Scale</title>
    <summary>Large language models have been widely adopted.</summary>
    <author><name>Tim Dettmers</name></author>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_single_entry() {
        let feed = format!("<feed>{}</feed>", SAMPLE_ENTRY);
        let entries = parse_atom_feed(&feed).unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.arxiv_id, "1706.03762v7");
        assert_eq!(entry.title, "Attention Is All You Need");
        assert_eq!(entry.authors.len(), 3);
        assert_eq!(entry.authors[0], "Ashish Vaswani");
        assert_eq!(entry.published, "2017-06-12T17:57:34Z");
        assert_eq!(entry.abs_url, "http://arxiv.org/abs/1706.03762v7");
        assert!(entry.summary.starts_with("The dominant sequence"));
        assert!(entry.summary.contains("encoder & a decoder"));
    }

    #[test]
    fn test_parse_feed_skips_feed_level_id() {
        let entries = parse_atom_feed(SAMPLE_FEED).unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e.arxiv_id.as_str()).collect();
        assert_eq!(ids, vec!["2210.17323v2", "2306.00978v5", "2208.07339v2"]);
    }

    #[test]
    fn test_parse_empty_feed() {
        let feed = r#"<feed><opensearch:totalResults>0</opensearch:totalResults></feed>"#;
        assert!(parse_atom_feed(feed).unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_non_feed() {
        let err = parse_atom_feed("<html><body>Rate exceeded.</body></html>").unwrap_err();
        assert!(matches!(err, ProviderError::Parse { .. }));
    }

    #[test]
    fn test_entry_without_title_is_skipped() {
        let feed = "<feed><entry><id>http://arxiv.org/abs/1</id></entry></feed>";
        assert!(parse_atom_feed(feed).unwrap().is_empty());
    }

    #[test]
    fn test_entry_to_hit() {
        let entries = parse_atom_feed(SAMPLE_FEED).unwrap();
        let hit = SearchHit::from(entries[1].clone());
        assert_eq!(
            hit.title,
            "AWQ: Activation-aware Weight Quantization for LLM Compression"
        );
        assert_eq!(hit.url, "http://arxiv.org/abs/2306.00978v5");
        assert_eq!(hit.published_at.as_deref(), Some("2023-06-01T17:59:10Z"));
    }

    #[test]
    fn test_extract_arxiv_id_from_url() {
        assert_eq!(
            extract_arxiv_id_from_url("http://arxiv.org/abs/1706.03762v7"),
            "1706.03762v7"
        );
        assert_eq!(
            extract_arxiv_id_from_url("http://arxiv.org/pdf/2301.12345.pdf"),
            "2301.12345"
        );
        assert_eq!(extract_arxiv_id_from_url("2301.12345"), "2301.12345");
    }

    #[test]
    fn test_build_search_url() {
        let url = build_search_url(ARXIV_API_BASE, "transformer quantization", 3);
        assert!(url.starts_with(ARXIV_API_BASE));
        assert!(url.contains("search_query=all%3Atransformer%20quantization"));
        assert!(url.contains("max_results=3"));
        assert!(url.contains("sortBy=relevance"));
    }

    #[tokio::test]
    async fn test_rate_limit_spaces_requests() {
        let search = ArxivSearch::new(&SearchConfig::default())
            .unwrap()
            .with_min_interval(Duration::from_millis(50));
        let start = Instant::now();
        search.rate_limit().await;
        search.rate_limit().await;
        search.rate_limit().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_degrades_to_empty() {
        let search = ArxivSearch::new(&SearchConfig::default())
            .unwrap()
            .with_min_interval(Duration::ZERO)
            .with_base_url("http://127.0.0.1:1/api/query");
        assert!(search.fetch("x", 3).await.is_err());
        assert!(search.search("x", 3).await.is_empty());
    }

    // Integration test, requires network access
    #[tokio::test]
    #[ignore]
    async fn test_real_search() {
        let search = ArxivSearch::new(&SearchConfig::default()).unwrap();
        let hits = search.search("attention is all you need", 3).await;
        assert!(!hits.is_empty());
        assert!(hits.len() <= 3);
    }
}
