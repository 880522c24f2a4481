//! Summarizer (C6): produces a bounded-length, language-targeted summary
//! of one article via the LLM client.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::instrument;

use crate::llm::{ChatOptions, ChatRequest, LLMChat};
use crate::models::{Article, ArticleSummary, Language};

const MAX_INPUT_CHARS_DEFAULT: usize = 8000;
const TARGET_SUMMARY_LEN: f64 = 150.0;
const IDEAL_COMPRESSION_MIN: f64 = 0.10;
const IDEAL_COMPRESSION_MAX: f64 = 0.30;

const SYSTEM_MESSAGE_KO: &str = "너는 뉴스 기사를 요약하는 전문가야. 다음 규칙에 따라 한국어로 요약해줘:\n\
1. 핵심 사실과 중요한 정보만 포함\n\
2. 3-4문장으로 간결하게 작성\n\
3. 객관적이고 중립적인 톤 유지\n\
4. 불필요한 수사나 감정적 표현 제외\n\
5. 반드시 한국어로만 응답";

const SYSTEM_MESSAGE_EN: &str = "You are a professional news summarizer. \
Summarize the following article according to these rules:\n\
1. Include only key facts and important information\n\
2. Write concisely in 3-4 sentences\n\
3. Maintain objective and neutral tone\n\
4. Exclude unnecessary rhetoric or emotional language\n\
5. Respond in English only";

static FRAMING_PREFIXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^\s*요약\s*:\s*",
        r"^\s*Summary\s*:\s*",
        r"(?i)^\s*here\s+is\s+a\s+summary\s*:?\s*",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern is valid regex"))
    .collect()
});

static BOILERPLATE_PHRASES: &[&str] = &["이 기사는", "According to the article,", "According to the article"];

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, article: &Article, language: Language) -> Result<ArticleSummary, crate::error::LlmError>;
}

pub struct LlmSummarizer<'a> {
    pub llm: &'a dyn LLMChat,
    pub model: String,
    pub max_input_chars: usize,
}

impl<'a> LlmSummarizer<'a> {
    pub fn new(llm: &'a dyn LLMChat, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            max_input_chars: MAX_INPUT_CHARS_DEFAULT,
        }
    }
}

#[async_trait]
impl<'a> Summarizer for LlmSummarizer<'a> {
    #[instrument(level = "info", skip(self, article), fields(url = %article.url))]
    async fn summarize(
        &self,
        article: &Article,
        language: Language,
    ) -> Result<ArticleSummary, crate::error::LlmError> {
        let body = truncate_chars(&article.body, self.max_input_chars);
        let original_len = body.chars().count();

        let (system_msg, user_msg) = match language {
            Language::Korean => (
                SYSTEM_MESSAGE_KO,
                format!("다음 기사를 한국어로 요약해줘:\n\n제목: {}\n\n내용: {body}", article.title),
            ),
            Language::English => (
                SYSTEM_MESSAGE_EN,
                format!("Summarize the following article in English:\n\nTitle: {}\n\nBody: {body}", article.title),
            ),
        };

        let req = ChatRequest::new(system_msg, user_msg, ChatOptions::new(self.model.clone()));
        let resp = self.llm.chat(req).await?;

        let cleaned = post_process(&resp.text, language);
        let quality_score = Some(quality_score(&cleaned, original_len));

        ArticleSummary::new(
            article.title.clone(),
            article.url.clone(),
            cleaned,
            article.source.clone(),
            original_len,
            quality_score,
        )
        .map_err(|_| crate::error::LlmError::EmptyResponse)
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}

/// Strips framing prefixes/boilerplate, collapses whitespace, and ensures
/// the summary ends with sentence-terminating punctuation (P10).
fn post_process(raw: &str, language: Language) -> String {
    let mut text = raw.trim().to_string();
    for pattern in FRAMING_PREFIXES.iter() {
        text = pattern.replace(&text, "").into_owned();
    }
    for phrase in BOILERPLATE_PHRASES {
        text = text.replace(phrase, "");
    }
    text = WHITESPACE.replace_all(&text, " ").trim().to_string();

    let ends_terminated = text
        .chars()
        .last()
        .map(|c| matches!(c, '.' | '!' | '?' | '。' | '!' | '?'))
        .unwrap_or(false);
    if !text.is_empty() && !ends_terminated {
        let terminator = match language {
            Language::Korean => "다.",
            Language::English => ".",
        };
        text.push_str(terminator);
    }
    text
}

/// 0.0-1.0 score combining length adequacy, compression ratio, sentence
/// count, and punctuation correctness, each weighted equally.
fn quality_score(summary: &str, original_len: usize) -> f64 {
    let summary_len = summary.chars().count() as f64;

    let length_adequacy = 1.0 - ((summary_len - TARGET_SUMMARY_LEN).abs() / TARGET_SUMMARY_LEN).min(1.0);

    let compression = if original_len == 0 {
        0.0
    } else {
        summary_len / original_len as f64
    };
    let compression_score = if (IDEAL_COMPRESSION_MIN..=IDEAL_COMPRESSION_MAX).contains(&compression) {
        1.0
    } else {
        let distance = if compression < IDEAL_COMPRESSION_MIN {
            IDEAL_COMPRESSION_MIN - compression
        } else {
            compression - IDEAL_COMPRESSION_MAX
        };
        (1.0 - distance.min(1.0)).max(0.0)
    };

    let sentence_count = summary.matches(['.', '!', '?', '。']).count();
    let sentence_score = if (3..=5).contains(&sentence_count) {
        1.0
    } else {
        let distance = if sentence_count < 3 {
            3 - sentence_count
        } else {
            sentence_count - 5
        } as f64;
        (1.0 - distance * 0.2).max(0.0)
    };

    let punctuation_score = summary
        .chars()
        .last()
        .map(|c| if matches!(c, '.' | '!' | '?' | '。') { 1.0 } else { 0.0 })
        .unwrap_or(0.0);

    ((length_adequacy + compression_score + sentence_score + punctuation_score) / 4.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_process_strips_korean_framing_prefix() {
        let out = post_process("요약: 오늘 발표된 내용입니다.", Language::Korean);
        assert!(!out.starts_with("요약"));
    }

    #[test]
    fn post_process_strips_english_framing_prefix() {
        let out = post_process("Summary: The company announced a new product.", Language::English);
        assert!(!out.to_lowercase().starts_with("summary"));
    }

    #[test]
    fn post_process_appends_terminator_when_missing() {
        let out = post_process("This is an unterminated summary", Language::English);
        assert!(out.ends_with('.'));
    }

    #[test]
    fn post_process_strips_boilerplate_phrase() {
        let out = post_process("이 기사는 오늘 발표된 내용을 다룹니다.", Language::Korean);
        assert!(!out.contains("이 기사는"));
    }

    #[test]
    fn quality_score_is_clamped_to_unit_interval() {
        let score = quality_score("x", 10000);
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn quality_score_rewards_ideal_compression_and_length() {
        let original_len = 1000;
        let summary = "This sentence is reasonably informative. It adds more detail. It concludes here.";
        let score = quality_score(summary, original_len);
        assert!(score > 0.4);
    }
}
