//! Body extractor (C3): HTML or RSS-content snippet → cleaned plain text.
//! CPU-bound; not a suspension point.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, instrument};

use crate::error::ExtractError;

/// Tags stripped outright before any selector cascade runs.
const NOISE_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "form", "iframe", "noscript", "button",
    "input", "select", "textarea",
];

/// Publisher-specific selectors for the Korean majors, tried before the
/// generic cascade. Lifted from the selector list
/// `content_extractor.py::extract_content_korean` tries per-publisher.
const KOREAN_SELECTORS: &[&str] = &[
    // Hani (한겨레)
    ".text",
    ".article-text",
    ".content-text",
    // Chosun (조선일보)
    ".par",
    ".article_body",
    ".news_article_body",
    // JoongAng (중앙일보)
    ".article_body",
    ".news_text",
    // Yonhap (연합뉴스)
    ".story-news-article",
    ".article-txt",
    // SBS
    ".article-text-area",
    ".text_area",
    ".article_txt",
    // KBS
    ".detail-body",
    // MBC
    ".news_txt",
    ".article_area",
    // JTBC
    ".article_content",
    ".news_content",
    ".content_text",
];

/// Ad/share/related/nav/breadcrumb containers. `scraper`'s parse tree is
/// read-only (no `.decompose()`), so these are enforced as an ancestor/
/// descendant exclusion instead of being removed from the tree outright.
const UNWANTED_SELECTORS: &[&str] = &[
    ".ad",
    ".advertisement",
    ".banner",
    ".social",
    ".share",
    ".related",
    ".comment",
    ".sidebar",
    ".menu",
    ".navigation",
    ".breadcrumb",
];

const GENERIC_SELECTORS: &[&str] = &[
    "article",
    ".article-content",
    ".post-content",
    "#content",
    ".entry-content",
    "main",
];

const MIN_SELECTOR_TEXT_LEN: usize = 100;
const MIN_PARAGRAPH_LEN: usize = 20;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Korean-press boilerplate phrases stripped after selector extraction.
const BOILERPLATE_PHRASES: &[&str] = &[
    "저작권자 ⓒ",
    "무단전재 및 재배포 금지",
    "무단전재 금지",
    "본 기사는",
    "이 기사는",
    "Copyright",
    "All rights reserved",
    "연합뉴스",
    "관련기사",
    "더보기",
];

static REPORTER_BYLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[가-힣]{2,4}\s*기자\s*=\s*\S+@\S+").unwrap());

static LEADING_BULLETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[▲▼◆◇§▶◀※☞■●]").unwrap());

/// `BodyExtractor` abstraction; tests provide fakes, the aggregator uses
/// `HtmlExtractor` in production.
pub trait BodyExtractor: Send + Sync {
    fn extract_html(&self, html: &str, min_content_len: usize) -> Result<String, ExtractError>;
    fn extract_rss_content(
        &self,
        snippet: &str,
        min_content_len: usize,
    ) -> Result<String, ExtractError>;
}

#[derive(Debug, Default, Clone)]
pub struct HtmlExtractor;

impl BodyExtractor for HtmlExtractor {
    #[instrument(level = "debug", skip(self, html), fields(len = html.len()))]
    fn extract_html(&self, html: &str, min_content_len: usize) -> Result<String, ExtractError> {
        let document = Html::parse_document(html);

        let mut candidate = String::new();
        'cascade: for selector_str in KOREAN_SELECTORS.iter().chain(GENERIC_SELECTORS.iter()) {
            let Ok(selector) = Selector::parse(selector_str) else {
                continue;
            };
            for element in document.select(&selector) {
                if is_noise_descendant(&element) {
                    continue;
                }
                let text = collect_text(&element);
                if text.chars().count() >= MIN_SELECTOR_TEXT_LEN {
                    debug!(selector = %selector_str, "selector cascade hit");
                    candidate = text;
                    break 'cascade;
                }
            }
        }

        if candidate.is_empty() {
            candidate = paragraph_aggregation(&document);
        }

        clean(&candidate, min_content_len)
    }

    fn extract_rss_content(
        &self,
        snippet: &str,
        min_content_len: usize,
    ) -> Result<String, ExtractError> {
        let fragment = Html::parse_fragment(snippet);
        let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
        let unescaped = quick_xml::escape::unescape(&text)
            .map(|c| c.into_owned())
            .unwrap_or(text);
        let stripped = unescaped
            .replace("<![CDATA[", "")
            .replace("]]>", "")
            .replace("더보기", "")
            .replace("Continue reading", "");
        clean(&stripped, min_content_len)
    }
}

fn is_noise_descendant(element: &scraper::ElementRef) -> bool {
    NOISE_TAGS
        .iter()
        .chain(UNWANTED_SELECTORS.iter())
        .any(|sel_str| {
            Selector::parse(sel_str)
                .map(|sel| element.select(&sel).next().is_some())
                .unwrap_or(false)
        })
}

/// True if `element` sits inside a noise tag or an ad/share/related/nav/
/// breadcrumb container. Used by the paragraph-aggregation fallback, which
/// has no containing candidate element for `is_noise_descendant` to check.
fn has_noise_ancestor(element: &scraper::ElementRef) -> bool {
    element.ancestors().any(|node| {
        let Some(ancestor) = scraper::ElementRef::wrap(node) else {
            return false;
        };
        NOISE_TAGS
            .iter()
            .chain(UNWANTED_SELECTORS.iter())
            .any(|sel_str| {
                Selector::parse(sel_str)
                    .map(|sel| sel.matches(&ancestor))
                    .unwrap_or(false)
            })
    })
}

fn collect_text(element: &scraper::ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Last-resort fallback: aggregate `<p>` text blocks at least
/// `MIN_PARAGRAPH_LEN` chars, joined in document order.
fn paragraph_aggregation(document: &Html) -> String {
    let Ok(p_selector) = Selector::parse("p") else {
        return String::new();
    };
    document
        .select(&p_selector)
        .filter(|p| !has_noise_ancestor(p))
        .map(|p| p.text().collect::<String>().trim().to_string())
        .filter(|t| t.chars().count() >= MIN_PARAGRAPH_LEN)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Normalizes extracted text and enforces the minimum content length. Idempotent:
/// `clean(clean(text)) == clean(text)` (P9) because every transform here is
/// itself idempotent (whitespace collapse, phrase removal, trim).
fn clean(raw: &str, min_content_len: usize) -> Result<String, ExtractError> {
    let mut text = raw.to_string();
    for phrase in BOILERPLATE_PHRASES {
        text = text.replace(phrase, "");
    }
    text = REPORTER_BYLINE.replace_all(&text, "").into_owned();
    text = LEADING_BULLETS.replace_all(&text, "").into_owned();
    text = WHITESPACE.replace_all(&text, " ").trim().to_string();

    let len = text.chars().count();
    if len < min_content_len {
        return Err(ExtractError::ExtractionFailed {
            got: len,
            min: min_content_len,
        });
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_selector_wins_when_no_korean_match() {
        let html = format!(
            "<html><body><nav>skip me</nav><article>{}</article></body></html>",
            "a".repeat(150)
        );
        let extractor = HtmlExtractor;
        let out = extractor.extract_html(&html, 50).unwrap();
        assert!(out.contains(&"a".repeat(150)));
        assert!(!out.contains("skip me"));
    }

    #[test]
    fn ad_and_share_containers_are_excluded_from_fallback() {
        let html = format!(
            "<html><body><div class=\"share\"><p>{}</p></div><div><p>{}</p></div></body></html>",
            "share widget filler text here ".repeat(5),
            "This is the real article paragraph content.".repeat(2)
        );
        let extractor = HtmlExtractor;
        let out = extractor.extract_html(&html, 10).unwrap();
        assert!(!out.contains("share widget"));
        assert!(out.contains("real article paragraph"));
    }

    #[test]
    fn paragraph_aggregation_is_last_resort() {
        let html = "<html><body><div><p>This paragraph has more than twenty characters easily.</p><p>short</p></div></body></html>";
        let extractor = HtmlExtractor;
        let out = extractor.extract_html(html, 10).unwrap();
        assert!(out.contains("This paragraph"));
        assert!(!out.contains("short"));
    }

    #[test]
    fn strips_korean_boilerplate_and_bylines() {
        let raw = format!(
            "김철수 기자 = reporter@example.com 주요 내용입니다 {} 저작권자 ⓒ 한국경제 무단전재 금지",
            "내용 ".repeat(30)
        );
        let cleaned = clean(&raw, 10).unwrap();
        assert!(!cleaned.contains("기자"));
        assert!(!cleaned.contains("저작권자"));
        assert!(!cleaned.contains("무단전재"));
    }

    #[test]
    fn too_short_after_cleaning_is_extraction_failed() {
        let res = clean("short", 50);
        assert!(matches!(res, Err(ExtractError::ExtractionFailed { .. })));
    }

    #[test]
    fn clean_is_idempotent() {
        let raw = "  some   text  with   spaces  and 저작권자 ⓒ noise  ".repeat(3);
        let once = clean(&raw, 1).unwrap();
        let twice = clean(&once, 1).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn rss_content_strips_tags_and_continue_reading_marker() {
        let extractor = HtmlExtractor;
        let snippet = format!(
            "<p>{}</p><p>더보기</p>",
            "breaking news content here ".repeat(5)
        );
        let out = extractor.extract_rss_content(&snippet, 10).unwrap();
        assert!(!out.contains('<'));
        assert!(!out.contains("더보기"));
    }
}
