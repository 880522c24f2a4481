//! Value types shared across components (C9). Every type here is constructed
//! only through a validating constructor; there are no partially-initialized
//! instances visible outside this module.

use crate::error::ModelError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_TITLE_LEN: usize = 500;
pub const MIN_CONTENT_LEN: usize = 50;
pub const MAX_KEYWORDS: usize = 10;

/// One `<item>`/`<entry>` parsed out of a publisher's feed (C2 output).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub raw_summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub source_name: String,
    pub source_host: String,
}

impl FeedEntry {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        raw_summary: Option<String>,
        published_at: Option<DateTime<Utc>>,
        author: Option<String>,
        source_name: impl Into<String>,
        source_host: impl Into<String>,
    ) -> Result<Self, ModelError> {
        let title = title.into().trim().to_string();
        if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
            return Err(ModelError::InvalidTitle { max: MAX_TITLE_LEN });
        }
        let link = link.into();
        if !is_absolute_http_url(&link) {
            return Err(ModelError::InvalidUrl(link));
        }
        Ok(Self {
            title,
            link,
            raw_summary,
            published_at,
            author,
            source_name: source_name.into(),
            source_host: source_host.into(),
        })
    }

    /// `title ∪ rawSummary`, lowercased, for P2-style keyword matching.
    pub fn searchable_text(&self) -> String {
        let mut s = self.title.to_lowercase();
        if let Some(raw) = &self.raw_summary {
            s.push(' ');
            s.push_str(&raw.to_lowercase());
        }
        s
    }

    /// Canonical URL used by the aggregator's dedup stage: lowercase
    /// scheme+host, path and query preserved as given.
    pub fn canonical_url(&self) -> String {
        canonicalize_url(&self.link)
    }
}

/// A feed entry (or caller-supplied URL) promoted with a cleaned full body
/// (C1+C3 output).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub url: String,
    pub body: String,
    pub published_at: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub source: String,
}

impl Article {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        body: impl Into<String>,
        published_at: Option<DateTime<Utc>>,
        author: Option<String>,
        source: impl Into<String>,
    ) -> Result<Self, ModelError> {
        let title = title.into().trim().to_string();
        if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
            return Err(ModelError::InvalidTitle { max: MAX_TITLE_LEN });
        }
        let url = url.into();
        if !is_absolute_http_url(&url) {
            return Err(ModelError::InvalidUrl(url));
        }
        let body = body.into();
        if body.chars().count() < MIN_CONTENT_LEN {
            return Err(ModelError::BodyTooShort {
                got: body.chars().count(),
                min: MIN_CONTENT_LEN,
            });
        }
        Ok(Self {
            title,
            url,
            body,
            published_at,
            author,
            source: source.into(),
        })
    }
}

/// An LLM-produced digest of one article (C6 output). Serialized to callers
/// as `{title, url, summary, source, original_length, summary_length}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArticleSummary {
    pub title: String,
    pub url: String,
    pub summary: String,
    pub source: String,
    #[serde(rename = "original_length")]
    pub original_len: usize,
    #[serde(rename = "summary_length")]
    pub summary_len: usize,
    /// Optional 0.0-1.0 quality heuristic; not serialized by the external
    /// wire contract but retained for observability/logging.
    #[serde(skip)]
    pub quality_score: Option<f64>,
}

impl ArticleSummary {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        summary: impl Into<String>,
        source: impl Into<String>,
        original_len: usize,
        quality_score: Option<f64>,
    ) -> Result<Self, ModelError> {
        let summary = summary.into();
        if summary.trim().is_empty() {
            return Err(ModelError::EmptySummary);
        }
        let summary_len = summary.chars().count();
        if summary_len > original_len {
            return Err(ModelError::SummaryExceedsOriginal {
                summary_len,
                original_len,
            });
        }
        Ok(Self {
            title: title.into(),
            url: url.into(),
            summary,
            source: source.into(),
            original_len,
            summary_len,
            quality_score,
        })
    }
}

/// Ordered, deduplicated, ≤10-element list of search terms derived from a
/// user query (C5 output).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordSet {
    keywords: Vec<String>,
}

impl KeywordSet {
    /// Builds a keyword set, deduplicating case-insensitively and
    /// preserving the first occurrence's casing and significance order.
    /// Truncates silently to `MAX_KEYWORDS` — callers are expected to have
    /// already ranked by significance before calling this.
    pub fn new(candidates: impl IntoIterator<Item = String>) -> Result<Self, ModelError> {
        let mut seen = std::collections::HashSet::new();
        let mut keywords = Vec::new();
        for candidate in candidates {
            let trimmed = candidate.trim().to_string();
            if trimmed.is_empty() {
                continue;
            }
            let key = trimmed.to_lowercase();
            if seen.insert(key) {
                keywords.push(trimmed);
            }
            if keywords.len() == MAX_KEYWORDS {
                break;
            }
        }
        Ok(Self { keywords })
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.keywords
    }

    pub fn into_vec(self) -> Vec<String> {
        self.keywords
    }

    /// Case-insensitive substring match against arbitrary haystack text.
    pub fn matches(&self, haystack_lowercase: &str) -> bool {
        self.keywords
            .iter()
            .any(|kw| haystack_lowercase.contains(&kw.to_lowercase()))
    }
}

/// Process-wide, code-embedded catalogue of RSS sources (C7).
#[derive(Debug, Clone)]
pub struct FeedCatalogue {
    pub publishers: Vec<PublisherFeeds>,
}

#[derive(Debug, Clone)]
pub struct PublisherFeeds {
    pub label: String,
    pub feed_urls: Vec<String>,
}

/// Transient per-call request state owned exclusively by the Aggregator
/// (C8) for the lifetime of one `ProcessQuery` call. `SummarizeArticles`
/// has no query to distill keywords from and builds its own `FeedEntry`
/// list directly from caller-supplied URLs, so it has no use for this type.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub request_id: uuid::Uuid,
    pub query: String,
    pub max_articles: usize,
    pub language: Language,
    pub deadline: std::time::Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "ko")]
    Korean,
    #[serde(rename = "en")]
    English,
}

impl Language {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ko" => Some(Language::Korean),
            "en" => Some(Language::English),
            _ => None,
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::Korean
    }
}

/// Reason a candidate was removed from the pipeline before reaching
/// `Summarized`, recorded for observability and for the fatal-path tally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    FeedFetchFailed,
    FeedParseFailed,
    NoMatchingKeyword,
    DuplicateUrl,
    CapExceeded,
    BodyFetchFailed,
    ExtractionFailed { reason: String },
    SummarizationFailed,
    DeadlineExceeded,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::FeedFetchFailed => write!(f, "feed_fetch_failed"),
            DropReason::FeedParseFailed => write!(f, "feed_parse_failed"),
            DropReason::NoMatchingKeyword => write!(f, "no_matching_keyword"),
            DropReason::DuplicateUrl => write!(f, "duplicate_url"),
            DropReason::CapExceeded => write!(f, "cap_exceeded"),
            DropReason::BodyFetchFailed => write!(f, "body_fetch_failed"),
            DropReason::ExtractionFailed { reason } => write!(f, "extraction_failed: {reason}"),
            DropReason::SummarizationFailed => write!(f, "summarization_failed"),
            DropReason::DeadlineExceeded => write!(f, "deadline_exceeded"),
        }
    }
}

fn is_absolute_http_url(s: &str) -> bool {
    url::Url::parse(s)
        .map(|u| u.scheme() == "http" || u.scheme() == "https")
        .unwrap_or(false)
}

fn canonicalize_url(s: &str) -> String {
    match url::Url::parse(s) {
        Ok(u) => {
            let scheme = u.scheme().to_lowercase();
            let host = u.host_str().unwrap_or("").to_lowercase();
            let port = u.port().map(|p| format!(":{p}")).unwrap_or_default();
            let path = u.path();
            let query = u.query().map(|q| format!("?{q}")).unwrap_or_default();
            format!("{scheme}://{host}{port}{path}{query}")
        }
        Err(_) => s.to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_entry_rejects_empty_title() {
        let res = FeedEntry::new("   ", "https://example.com/a", None, None, None, "Ex", "example.com");
        assert!(matches!(res, Err(ModelError::InvalidTitle { .. })));
    }

    #[test]
    fn feed_entry_rejects_non_http_link() {
        let res = FeedEntry::new("Title", "ftp://example.com/a", None, None, None, "Ex", "example.com");
        assert!(matches!(res, Err(ModelError::InvalidUrl(_))));
    }

    #[test]
    fn feed_entry_searchable_text_lowercases() {
        let e = FeedEntry::new(
            "Semiconductor Boom",
            "https://example.com/a",
            Some("TSMC expands".to_string()),
            None,
            None,
            "Ex",
            "example.com",
        )
        .unwrap();
        assert!(e.searchable_text().contains("semiconductor boom"));
        assert!(e.searchable_text().contains("tsmc expands"));
    }

    #[test]
    fn canonical_url_lowercases_scheme_and_host_only() {
        let e = FeedEntry::new(
            "T",
            "HTTPS://Example.COM/Path?Query=1",
            None,
            None,
            None,
            "Ex",
            "example.com",
        )
        .unwrap();
        assert_eq!(e.canonical_url(), "https://example.com/Path?Query=1");
    }

    #[test]
    fn article_rejects_short_body() {
        let res = Article::new("T", "https://example.com/a", "short", None, None, "example.com");
        assert!(matches!(res, Err(ModelError::BodyTooShort { .. })));
    }

    #[test]
    fn article_summary_rejects_summary_longer_than_original() {
        let res = ArticleSummary::new("T", "https://example.com/a", "a".repeat(50), "src", 10, None);
        assert!(matches!(
            res,
            Err(ModelError::SummaryExceedsOriginal { .. })
        ));
    }

    #[test]
    fn keyword_set_dedups_case_insensitively_and_caps_at_ten() {
        let input = vec![
            "Samsung".to_string(),
            "samsung".to_string(),
            "TSMC".to_string(),
        ]
        .into_iter()
        .chain((0..20).map(|i| format!("kw{i}")));
        let set = KeywordSet::new(input).unwrap();
        assert_eq!(set.as_slice().len(), MAX_KEYWORDS);
        assert_eq!(set.as_slice()[0], "Samsung");
        assert_eq!(set.as_slice()[1], "TSMC");
    }

    #[test]
    fn keyword_set_matches_is_case_insensitive() {
        let set = KeywordSet::new(vec!["Semiconductor".to_string()]).unwrap();
        assert!(set.matches("latest semiconductor news today"));
        assert!(!set.matches("unrelated topic"));
    }
}
