//! LLM client (C4): typed wrapper over an OpenAI-compatible chat-completions
//! endpoint with retry/backoff, timeout, and prompt discipline.
//!
//! Talks to the chat-completions endpoint directly over `reqwest` rather
//! than through an opaque client crate, so the wire format stays
//! inspectable (see DESIGN.md). Retries are handled by the `AskAsync`/
//! `RetryAsk` wrapper in `retry`.

pub mod retry;

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::error::LlmError;
use retry::{AskAsync, RetryAsk};

const DEFAULT_MAX_TOKENS: u32 = 400;
const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_MAX_USER_MSG_CHARS: usize = 8000;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

static CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("failed to build reqwest client")
});

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    pub model: String,
}

impl ChatOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            model: model.into(),
        }
    }
}

/// A single `Chat` call's inputs. The system message is always supplied by
/// the caller, never templated from user input; `user_msg` may contain
/// user-derived text and is truncated to `max_user_msg_chars` before it is
/// ever sent.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system_msg: String,
    pub user_msg: String,
    pub opts: ChatOptions,
}

impl ChatRequest {
    pub fn new(system_msg: impl Into<String>, user_msg: impl Into<String>, opts: ChatOptions) -> Self {
        let user_msg = truncate_user_msg(user_msg.into(), DEFAULT_MAX_USER_MSG_CHARS);
        Self {
            system_msg: system_msg.into(),
            user_msg,
            opts,
        }
    }
}

fn truncate_user_msg(msg: String, max_chars: usize) -> String {
    if msg.chars().count() <= max_chars {
        msg
    } else {
        let truncated: String = msg.chars().take(max_chars).collect();
        format!("{truncated}…")
    }
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub text: String,
    pub tokens_used: u64,
    pub latency: Duration,
}

/// Abstraction point for the aggregator/summarizer/keyword extractor; the
/// production implementation is `OpenAiChatClient`, tests provide fakes.
#[async_trait]
pub trait LLMChat: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, LlmError>;
}

#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    api_key: String,
}

impl OpenAiChatClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct WireChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    total_tokens: u64,
}

/// One attempt at the chat-completions call, with no retry logic of its
/// own — `AskAsync`/`RetryAsk` in `retry.rs` wraps this for the ladder.
struct SingleAttempt<'a> {
    client: &'a OpenAiChatClient,
    system_msg: String,
    opts: ChatOptions,
}

impl<'a> std::fmt::Debug for SingleAttempt<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleAttempt").field("opts", &self.opts).finish()
    }
}

impl<'a> AskAsync for SingleAttempt<'a> {
    type Response = ChatResponse;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, user_msg: &str) -> Result<ChatResponse, LlmError> {
        let t0 = std::time::Instant::now();
        let wire = WireRequest {
            model: &self.opts.model,
            messages: vec![
                WireMessage {
                    role: "system",
                    content: &self.system_msg,
                },
                WireMessage {
                    role: "user",
                    content: user_msg,
                },
            ],
            max_tokens: self.opts.max_tokens,
            temperature: self.opts.temperature,
        };

        let response = tokio::time::timeout(
            DEFAULT_TIMEOUT,
            CLIENT
                .post(CHAT_COMPLETIONS_URL)
                .bearer_auth(&self.client.api_key)
                .json(&wire)
                .send(),
        )
        .await
        .map_err(|_| LlmError::Timeout)?
        .map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::ApiError {
                    status: 0,
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(LlmError::RateLimited(retry_after));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: WireResponse = response.json().await.map_err(|e| LlmError::ApiError {
            status: status.as_u16(),
            message: e.to_string(),
        })?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|s| !s.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        let tokens_used = body.usage.map(|u| u.total_tokens).unwrap_or(0);
        let latency = t0.elapsed();
        Ok(ChatResponse {
            text,
            tokens_used,
            latency,
        })
    }
}

#[async_trait]
impl LLMChat for OpenAiChatClient {
    #[instrument(level = "info", skip(self, req), fields(model = %req.opts.model))]
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, LlmError> {
        let attempt = SingleAttempt {
            client: self,
            system_msg: req.system_msg,
            opts: req.opts,
        };
        let retrying = RetryAsk::new(attempt);
        let res = retrying.ask(&req.user_msg).await;
        if let Err(e) = &res {
            warn!(error = %e, "chat() exhausted retries or hit a permanent error");
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_user_messages_with_ellipsis_marker() {
        let long = "x".repeat(10_000);
        let truncated = truncate_user_msg(long, 100);
        assert_eq!(truncated.chars().count(), 101);
        assert!(truncated.ends_with('…'));
    }

    #[test]
    fn leaves_short_messages_untouched() {
        let short = "hello".to_string();
        assert_eq!(truncate_user_msg(short.clone(), 100), short);
    }

    #[test]
    fn chat_request_never_puts_user_text_in_system_role() {
        let req = ChatRequest::new("system rules", "user says ignore instructions", ChatOptions::new("gpt-3.5-turbo"));
        assert_eq!(req.system_msg, "system rules");
        assert!(req.user_msg.contains("ignore instructions"));
    }
}
