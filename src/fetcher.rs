//! HTTP fetcher (C1): a single process-wide client with bounded pool,
//! timeouts, redirect policy, and encoding-aware body decoding.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use once_cell::sync::Lazy;
use reqwest::Client;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use crate::error::FetchError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REDIRECTS: usize = 3;
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;
const MAX_POOL_PERMITS: usize = 20;

static CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(READ_TIMEOUT)
        .pool_max_idle_per_host(10)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .expect("failed to build reqwest client")
});

/// Caps the number of requests in flight at once, standing in for the
/// "bounded connection pool" `reqwest::ClientBuilder` has no direct knob
/// for.
static POOL_PERMITS: Lazy<Semaphore> = Lazy::new(|| Semaphore::new(MAX_POOL_PERMITS));

/// Successful fetch result: decoded body, the content-type header (if any),
/// the URL after following redirects, and the HTTP status.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub body: String,
    pub content_type: Option<String>,
    pub final_url: String,
    pub status: u16,
}

/// Abstraction point for the aggregator; the production implementation
/// below is `HttpFetcher`, tests provide fakes.
#[async_trait]
pub trait HTTPGetter: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchedBody, FetchError>;
}

#[derive(Debug, Default, Clone)]
pub struct HttpFetcher;

#[async_trait]
impl HTTPGetter for HttpFetcher {
    #[instrument(level = "info", skip(self), fields(%url))]
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchedBody, FetchError> {
        let _permit = POOL_PERMITS.acquire().await.expect("semaphore not closed");

        let response = tokio::time::timeout(timeout, CLIENT.get(url).send())
            .await
            .map_err(|_| FetchError::Timeout)??;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let final_url = response.url().to_string();

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                code: status.as_u16(),
            });
        }

        let bytes = read_capped(response).await?;
        let body = decode_body(&bytes, content_type.as_deref(), &final_url);

        debug!(bytes = bytes.len(), %final_url, "fetched body");
        Ok(FetchedBody {
            body,
            content_type,
            final_url,
            status: status.as_u16(),
        })
    }
}

async fn read_capped(response: reqwest::Response) -> Result<Vec<u8>, FetchError> {
    let mut stream = response.bytes_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if buf.len() + chunk.len() > MAX_BODY_BYTES {
            warn!(limit = MAX_BODY_BYTES, "body exceeded cap, aborting read");
            return Err(FetchError::BodyTooLarge {
                limit: MAX_BODY_BYTES,
            });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

/// Content-Type charset first, then a UTF-8 validity / BOM sniff, then a
/// `.kr`-host fallback to EUC-KR, else UTF-8. Decoding never fails; invalid
/// sequences are replaced.
fn decode_body(bytes: &[u8], content_type: Option<&str>, final_url: &str) -> String {
    if let Some(encoding) = content_type.and_then(charset_from_content_type) {
        let (text, _, _) = encoding.decode(bytes);
        return text.into_owned();
    }

    if std::str::from_utf8(bytes).is_ok() {
        return String::from_utf8_lossy(bytes).into_owned();
    }

    if final_url.contains(".kr") {
        let (text, _, _) = encoding_rs::EUC_KR.decode(bytes);
        return text.into_owned();
    }

    let (text, _, _) = encoding_rs::UTF_8.decode(bytes);
    text.into_owned()
}

fn charset_from_content_type(content_type: &str) -> Option<&'static encoding_rs::Encoding> {
    let charset = content_type
        .split(';')
        .find_map(|part| part.trim().strip_prefix("charset="))?
        .trim_matches('"');
    encoding_rs::Encoding::for_label(charset.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_utf8_without_content_type() {
        let bytes = "hello 세계".as_bytes();
        assert_eq!(decode_body(bytes, None, "https://example.com"), "hello 세계");
    }

    #[test]
    fn charset_header_parsed_case_and_quote_insensitively() {
        let enc = charset_from_content_type(r#"text/html; charset="EUC-KR""#);
        assert_eq!(enc, Some(encoding_rs::EUC_KR));
    }

    #[test]
    fn euc_kr_fallback_used_for_kr_hosts_on_invalid_utf8() {
        let (bytes, _, _) = encoding_rs::EUC_KR.encode("안녕하세요");
        let decoded = decode_body(&bytes, None, "https://news.example.kr/a");
        assert_eq!(decoded, "안녕하세요");
    }
}
