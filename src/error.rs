use thiserror::Error;

/// Errors surfaced by the HTTP fetcher (C1).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("dns resolution failed: {0}")]
    Dns(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("tls handshake failed: {0}")]
    Tls(String),
    #[error("unexpected status {code}")]
    HttpStatus { code: u16 },
    #[error("too many redirects")]
    TooManyRedirects,
    #[error("response body exceeded {limit} bytes")]
    BodyTooLarge { limit: usize },
    #[error("non-HTML content type: {0}")]
    UnsupportedContentType(String),
    #[error("request error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_connect() {
            FetchError::Connect(e.to_string())
        } else if e.is_redirect() {
            FetchError::TooManyRedirects
        } else if let Some(status) = e.status() {
            FetchError::HttpStatus {
                code: status.as_u16(),
            }
        } else {
            FetchError::Other(e.to_string())
        }
    }
}

/// Errors surfaced by the feed parser (C2).
#[derive(Debug, Error)]
pub enum FeedParseError {
    #[error("malformed feed XML: {0}")]
    MalformedXml(String),
    #[error("unsupported feed type")]
    UnsupportedFeedType,
    #[error("feed parsed but contained no entries")]
    NoEntries,
}

/// Errors surfaced by the body extractor (C3).
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("cleaned content shorter than minimum ({got} < {min})")]
    ExtractionFailed { got: usize, min: usize },
}

/// Errors surfaced by the LLM client (C4).
#[derive(Debug, Error, Clone)]
pub enum LlmError {
    #[error("rate limited{0}", .0.map(|s| format!(", retry after {s}s")).unwrap_or_default())]
    RateLimited(Option<u64>),
    #[error("request timed out")]
    Timeout,
    #[error("api error {status}: {message}")]
    ApiError { status: u16, message: String },
    #[error("empty response from model")]
    EmptyResponse,
    #[error("request cancelled")]
    Cancelled,
}

impl LlmError {
    /// Whether this error class is worth retrying per the C4 retry policy.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited(_) | LlmError::Timeout => true,
            LlmError::ApiError { status, .. } => *status >= 500,
            LlmError::ApiError { .. } | LlmError::EmptyResponse | LlmError::Cancelled => false,
        }
    }
}

/// Errors surfaced by the aggregator (C8) to its caller.
#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("keyword extraction yielded nothing and the fallback path was also empty")]
    NoKeywords,
    #[error("no results: {summary}")]
    NoResults { summary: String },
    #[error("empty query")]
    EmptyQuery,
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
}

/// Errors surfaced while loading process configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("{0} does not look like a valid API key (expected `sk-` prefix, length >= 20)")]
    InvalidApiKey(&'static str),
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Errors surfaced by the C9 validating constructors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("title must be non-empty and at most {max} chars after trim")]
    InvalidTitle { max: usize },
    #[error("link is not an absolute http(s) URL: {0}")]
    InvalidUrl(String),
    #[error("body shorter than minimum content length ({got} < {min})")]
    BodyTooShort { got: usize, min: usize },
    #[error("summary must be non-empty")]
    EmptySummary,
    #[error("summary length ({summary_len}) exceeds original length ({original_len})")]
    SummaryExceedsOriginal {
        summary_len: usize,
        original_len: usize,
    },
    #[error("keyword set exceeds cap of {cap}")]
    TooManyKeywords { cap: usize },
}
