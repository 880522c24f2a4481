//! Feed parser (C2): RSS 2.0 / Atom bytes → normalized `FeedEntry` list.

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use crate::error::FeedParseError;
use crate::models::FeedEntry;

pub const DEFAULT_MAX_ENTRIES_PER_FEED: usize = 20;
pub const HARD_MAX_ENTRIES_PER_FEED: usize = 100;

/// CPU-bound; not a suspension point. Parsing runs synchronously on
/// whichever worker executes the enclosing task.
pub trait FeedParser: Send + Sync {
    fn parse(
        &self,
        bytes: &[u8],
        source_name: &str,
        source_host: &str,
        max_entries: usize,
    ) -> Result<Vec<FeedEntry>, FeedParseError>;
}

#[derive(Debug, Default, Clone)]
pub struct FeedRsParser;

impl FeedParser for FeedRsParser {
    #[instrument(level = "info", skip(self, bytes), fields(%source_name, bytes = bytes.len()))]
    fn parse(
        &self,
        bytes: &[u8],
        source_name: &str,
        source_host: &str,
        max_entries: usize,
    ) -> Result<Vec<FeedEntry>, FeedParseError> {
        let max_entries = max_entries.min(HARD_MAX_ENTRIES_PER_FEED);

        let feed = feed_rs::parser::parse(bytes).map_err(|e| match e {
            feed_rs::parser::ParseFeedError::ParseError(inner) => {
                FeedParseError::MalformedXml(inner.to_string())
            }
            feed_rs::parser::ParseFeedError::XmlReader(e) => {
                FeedParseError::MalformedXml(e.to_string())
            }
            other => FeedParseError::MalformedXml(other.to_string()),
        })?;

        if feed.entries.is_empty() {
            return Err(FeedParseError::NoEntries);
        }

        let mut entries = Vec::new();
        for raw in feed.entries.into_iter().take(max_entries) {
            let Some(link) = raw.links.first().map(|l| l.href.clone()) else {
                debug!("dropping entry with no link");
                continue;
            };
            let Some(title) = raw.title.map(|t| t.content) else {
                debug!(%link, "dropping entry with no title");
                continue;
            };

            let published_at: Option<DateTime<Utc>> = raw.published.or(raw.updated);

            let content = entry_content(raw.content.as_ref(), raw.summary.as_ref());

            let author = raw.authors.first().map(|a| a.name.clone());

            match FeedEntry::new(
                title,
                link,
                content,
                published_at,
                author,
                source_name,
                source_host,
            ) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(error = %e, "dropping invalid feed entry"),
            }
        }

        if entries.is_empty() {
            return Err(FeedParseError::NoEntries);
        }

        Ok(entries)
    }
}

/// Priority order: `content` > `summary` > `description` (feed-rs folds
/// RSS `description` and Atom `summary_detail` both into `summary`).
fn entry_content(
    content: Option<&feed_rs::model::Content>,
    summary: Option<&feed_rs::model::Text>,
) -> Option<String> {
    content
        .and_then(|c| c.body.clone())
        .or_else(|| summary.map(|s| s.content.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_SAMPLE: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
<title>Example Feed</title>
<item>
  <title>Semiconductor boom continues</title>
  <link>https://example.com/a</link>
  <description>TSMC expands capacity</description>
  <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
</item>
<item>
  <title>Untitled link-only entry</title>
  <link>not-an-absolute-url</link>
</item>
</channel></rss>"#;

    #[test]
    fn parses_entries_and_drops_invalid_links() {
        let parser = FeedRsParser;
        let entries = parser
            .parse(
                RSS_SAMPLE.as_bytes(),
                "Example",
                "example.com",
                DEFAULT_MAX_ENTRIES_PER_FEED,
            )
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Semiconductor boom continues");
        assert_eq!(entries[0].source_name, "Example");
    }

    #[test]
    fn empty_feed_is_no_entries() {
        let parser = FeedRsParser;
        let empty = r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Empty</title></channel></rss>"#;
        let res = parser.parse(empty.as_bytes(), "Example", "example.com", 20);
        assert!(matches!(res, Err(FeedParseError::NoEntries)));
    }

    #[test]
    fn malformed_xml_is_rejected() {
        let parser = FeedRsParser;
        let res = parser.parse(b"not xml at all", "Example", "example.com", 20);
        assert!(res.is_err());
    }

    #[test]
    fn respects_max_entries_cap() {
        let mut xml = String::from(
            r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Many</title>"#,
        );
        for i in 0..50 {
            xml.push_str(&format!(
                "<item><title>Entry {i}</title><link>https://example.com/{i}</link></item>"
            ));
        }
        xml.push_str("</channel></rss>");

        let parser = FeedRsParser;
        let entries = parser
            .parse(xml.as_bytes(), "Example", "example.com", 10)
            .unwrap();
        assert_eq!(entries.len(), 10);
    }
}
