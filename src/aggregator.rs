//! Aggregator (C8): the orchestrator. Drives keywords → fetch feeds →
//! filter → fetch bodies → summarize → assemble. The only component that
//! orchestrates concurrency; C1-C6 are synchronous per-call contracts from
//! here.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use crate::budget::{Budget, Caps};
use crate::config::Settings;
use crate::error::AggregatorError;
use crate::extractor::BodyExtractor;
use crate::feed_parser::{FeedParser, DEFAULT_MAX_ENTRIES_PER_FEED};
use crate::fetcher::HTTPGetter;
use crate::keywords::{KeywordExtractor, KeywordSource};
use crate::llm::LLMChat;
use crate::models::{
    Article, ArticleSummary, DropReason, FeedCatalogue, FeedEntry, Language, PipelineRequest,
};
use crate::summarizer::{LlmSummarizer, Summarizer};

const FEED_TASK_DEADLINE: Duration = Duration::from_secs(10);
const FEED_STAGE_SOFT_DEADLINE: Duration = Duration::from_secs(30);
const BODY_TASK_DEADLINE: Duration = Duration::from_secs(20);
const BODY_STAGE_SOFT_DEADLINE: Duration = Duration::from_secs(30);
const SUMMARY_TASK_DEADLINE: Duration = Duration::from_secs(30);

/// Tally of per-item drops, surfaced in the fatal-path error and in the
/// partial-result observability log.
#[derive(Debug, Default, Clone)]
pub struct DropTally {
    pub drops: Vec<DropReason>,
}

impl DropTally {
    fn record(&mut self, reason: DropReason) {
        self.drops.push(reason);
    }

    fn count(&self) -> usize {
        self.drops.len()
    }
}

pub struct Aggregator {
    pub fetcher: Arc<dyn HTTPGetter>,
    pub feed_parser: Arc<dyn FeedParser>,
    pub extractor: Arc<dyn BodyExtractor>,
    pub llm: Arc<dyn LLMChat>,
    pub catalogue: FeedCatalogue,
    pub settings: Settings,
}

impl Aggregator {
    pub fn new(
        fetcher: Arc<dyn HTTPGetter>,
        feed_parser: Arc<dyn FeedParser>,
        extractor: Arc<dyn BodyExtractor>,
        llm: Arc<dyn LLMChat>,
        catalogue: FeedCatalogue,
        settings: Settings,
    ) -> Self {
        Self {
            fetcher,
            feed_parser,
            extractor,
            llm,
            catalogue,
            settings,
        }
    }

    /// `ProcessQuery(ctx, query, maxArticles) → ([]ArticleSummary, []string) | err`.
    #[instrument(level = "info", skip(self), fields(request_id = tracing::field::Empty))]
    pub async fn process_query(
        &self,
        query: &str,
        max_articles: Option<usize>,
        language: Language,
    ) -> Result<(Vec<ArticleSummary>, Vec<String>), AggregatorError> {
        if query.trim().is_empty() {
            return Err(AggregatorError::EmptyQuery);
        }
        let max_articles = max_articles.unwrap_or(10).clamp(1, self.settings.max_articles_cap);
        let request = PipelineRequest {
            request_id: uuid::Uuid::new_v4(),
            query: query.to_string(),
            max_articles,
            language,
            deadline: std::time::Instant::now() + self.settings.overall_deadline,
        };
        tracing::Span::current().record("request_id", tracing::field::display(request.request_id));

        let caps = Caps::from(&self.settings);
        let budget = Budget::with_deadline(request.deadline);
        let mut tally = DropTally::default();

        // 1. Derive keywords.
        let keyword_source = KeywordExtractor {
            llm: self.llm.as_ref(),
            model: self.settings.openai_model.clone(),
        };
        let keywords = keyword_source.extract(&request.query).await;
        if keywords.is_empty() {
            return Err(AggregatorError::NoKeywords);
        }
        let keyword_list = keywords.as_slice().to_vec();
        info!(keywords = ?keyword_list, "derived keywords");

        // 2. Plan feed fan-out.
        let feed_plan = plan_feed_fanout(&self.catalogue, caps.max_feeds_per_publisher, caps.max_total_feeds);

        // 3. Parallel feed ingestion.
        let entries = self.ingest_feeds(&feed_plan, &budget, &mut tally).await;
        if entries.is_empty() {
            return Err(AggregatorError::NoResults {
                summary: format!("every feed fetch failed ({} drops)", tally.count()),
            });
        }

        // 4. Filter by keywords.
        let filtered: Vec<FeedEntry> = entries
            .into_iter()
            .filter(|e| {
                let keep = keywords.matches(&e.searchable_text());
                if !keep {
                    tally.record(DropReason::NoMatchingKeyword);
                }
                keep
            })
            .collect();

        // 5. Deduplicate by canonical URL, first occurrence wins.
        let deduped = dedupe_by_canonical_url(filtered, &mut tally);

        // 6. Cap.
        let capped: Vec<FeedEntry> = if deduped.len() > request.max_articles {
            tally.drops.extend(
                std::iter::repeat(DropReason::CapExceeded)
                    .take(deduped.len() - request.max_articles),
            );
            deduped.into_iter().take(request.max_articles).collect()
        } else {
            deduped
        };

        if capped.is_empty() {
            return Err(AggregatorError::NoResults {
                summary: "no entries survived keyword filtering".to_string(),
            });
        }

        // 7. Parallel body fetch + extraction.
        let articles = self.fetch_bodies(capped, &budget, &mut tally).await;

        // 8 & 9. Parallel summarization + assembly.
        let summaries = self
            .summarize_all(articles, request.language, &budget, &mut tally)
            .await;

        if summaries.is_empty() {
            return Err(AggregatorError::NoResults {
                summary: format!("zero summaries succeeded ({} drops)", tally.count()),
            });
        }

        info!(
            succeeded = summaries.len(),
            dropped = tally.count(),
            "process_query complete"
        );
        Ok((summaries, keyword_list))
    }

    /// `SummarizeArticles(urls, language) → {summaries}` — bypasses the
    /// keyword/feed stages; runs the fetch→extract→summarize tail only.
    #[instrument(level = "info", skip(self, urls))]
    pub async fn summarize_articles(
        &self,
        urls: Vec<String>,
        language: Language,
    ) -> Result<Vec<ArticleSummary>, AggregatorError> {
        if urls.is_empty() {
            return Err(AggregatorError::EmptyQuery);
        }
        let budget = Budget::starting_now(self.settings.overall_deadline);
        let mut tally = DropTally::default();

        let entries: Vec<FeedEntry> = urls
            .into_iter()
            .filter_map(|url| {
                let host = url::Url::parse(&url).ok()?.host_str()?.to_string();
                FeedEntry::new("(untitled)", url, None, None, None, "caller-supplied", host).ok()
            })
            .collect();

        let articles = self.fetch_bodies(entries, &budget, &mut tally).await;
        let summaries = self.summarize_all(articles, language, &budget, &mut tally).await;

        if summaries.is_empty() {
            return Err(AggregatorError::NoResults {
                summary: format!("zero summaries succeeded ({} drops)", tally.count()),
            });
        }
        Ok(summaries)
    }

    async fn ingest_feeds(
        &self,
        feed_plan: &[(String, String)],
        budget: &Budget,
        tally: &mut DropTally,
    ) -> Vec<FeedEntry> {
        let concurrency = feed_plan.len().max(1);
        let fetcher = self.fetcher.clone();
        let feed_parser = self.feed_parser.clone();

        let stage_deadline = budget.sub_deadline(FEED_STAGE_SOFT_DEADLINE);
        let task_deadline = budget.sub_deadline(FEED_TASK_DEADLINE);

        let results = tokio::time::timeout(
            stage_deadline,
            stream::iter(feed_plan.iter().cloned().enumerate())
                .map(|(idx, (publisher, feed_url))| {
                    let fetcher = fetcher.clone();
                    let feed_parser = feed_parser.clone();
                    async move {
                        let host = url::Url::parse(&feed_url)
                            .ok()
                            .and_then(|u| u.host_str().map(|h| h.to_string()))
                            .unwrap_or_default();
                        match fetcher.get(&feed_url, task_deadline).await {
                            Ok(body) => {
                                match feed_parser.parse(
                                    body.body.as_bytes(),
                                    &publisher,
                                    &host,
                                    DEFAULT_MAX_ENTRIES_PER_FEED,
                                ) {
                                    Ok(entries) => (idx, Ok(entries)),
                                    Err(e) => {
                                        warn!(%feed_url, error = %e, "feed parse failed");
                                        (idx, Err(DropReason::FeedParseFailed))
                                    }
                                }
                            }
                            Err(e) => {
                                warn!(%feed_url, error = %e, "feed fetch failed");
                                (idx, Err(DropReason::FeedFetchFailed))
                            }
                        }
                    }
                })
                .buffer_unordered(concurrency)
                .collect::<Vec<_>>(),
        )
        .await
        .unwrap_or_default();

        let mut ordered: Vec<Option<Vec<FeedEntry>>> = vec![None; feed_plan.len()];
        for (idx, res) in results {
            match res {
                Ok(entries) => ordered[idx] = Some(entries),
                Err(reason) => tally.record(reason),
            }
        }
        ordered.into_iter().flatten().flatten().collect()
    }

    async fn fetch_bodies(
        &self,
        entries: Vec<FeedEntry>,
        budget: &Budget,
        tally: &mut DropTally,
    ) -> Vec<Article> {
        let concurrency = entries.len().max(1);
        let fetcher = self.fetcher.clone();
        let extractor = self.extractor.clone();
        let min_content_len = self.settings.min_content_len;

        let stage_deadline = budget.sub_deadline(BODY_STAGE_SOFT_DEADLINE);
        let task_deadline = budget.sub_deadline(BODY_TASK_DEADLINE);

        let results = tokio::time::timeout(
            stage_deadline,
            stream::iter(entries.into_iter().enumerate())
                .map(|(idx, entry)| {
                    let fetcher = fetcher.clone();
                    let extractor = extractor.clone();
                    async move {
                        let fetched = match fetcher.get(&entry.link, task_deadline).await {
                            Ok(f) => f,
                            Err(e) => {
                                warn!(url = %entry.link, error = %e, "body fetch failed");
                                return (idx, Err(DropReason::BodyFetchFailed));
                            }
                        };
                        let is_html = fetched
                            .content_type
                            .as_deref()
                            .map(|ct| ct.contains("html"))
                            .unwrap_or(true);
                        let cleaned = if is_html {
                            extractor.extract_html(&fetched.body, min_content_len)
                        } else {
                            extractor.extract_rss_content(&fetched.body, min_content_len)
                        };
                        match cleaned {
                            Ok(body) => {
                                match Article::new(
                                    entry.title.clone(),
                                    entry.link.clone(),
                                    body,
                                    entry.published_at,
                                    entry.author.clone(),
                                    entry.source_host.clone(),
                                ) {
                                    Ok(article) => (idx, Ok(article)),
                                    Err(e) => {
                                        warn!(url = %entry.link, error = %e, "article construction failed");
                                        (idx, Err(DropReason::ExtractionFailed { reason: e.to_string() }))
                                    }
                                }
                            }
                            Err(e) => (idx, Err(DropReason::ExtractionFailed { reason: e.to_string() })),
                        }
                    }
                })
                .buffer_unordered(concurrency)
                .collect::<Vec<_>>(),
        )
        .await
        .unwrap_or_default();

        let max_idx = results.iter().map(|(i, _)| *i).max().unwrap_or(0);
        let mut ordered: Vec<Option<Article>> = vec![None; max_idx + 1];
        for (idx, res) in results {
            match res {
                Ok(article) => ordered[idx] = Some(article),
                Err(reason) => tally.record(reason),
            }
        }
        ordered.into_iter().flatten().collect()
    }

    async fn summarize_all(
        &self,
        articles: Vec<Article>,
        language: Language,
        budget: &Budget,
        tally: &mut DropTally,
    ) -> Vec<ArticleSummary> {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_summaries.max(1)));
        let llm = self.llm.clone();
        let model = self.settings.openai_model.clone();

        let stage_deadline = budget.remaining();
        let task_deadline = SUMMARY_TASK_DEADLINE.min(budget.remaining().max(Duration::from_millis(1)));

        let results = tokio::time::timeout(
            stage_deadline,
            stream::iter(articles.into_iter().enumerate())
                .map(|(idx, article)| {
                    let semaphore = semaphore.clone();
                    let llm = llm.clone();
                    let model = model.clone();
                    async move {
                        let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                        let summarizer = LlmSummarizer::new(llm.as_ref(), model);
                        match tokio::time::timeout(task_deadline, summarizer.summarize(&article, language)).await {
                            Ok(Ok(summary)) => (idx, Ok(summary)),
                            Ok(Err(e)) => {
                                warn!(url = %article.url, error = %e, "summarization failed");
                                (idx, Err(DropReason::SummarizationFailed))
                            }
                            Err(_) => (idx, Err(DropReason::DeadlineExceeded)),
                        }
                    }
                })
                .buffer_unordered(self.settings.max_concurrent_summaries.max(1))
                .collect::<Vec<_>>(),
        )
        .await
        .unwrap_or_default();

        let max_idx = results.iter().map(|(i, _)| *i).max().unwrap_or(0);
        let mut ordered: Vec<Option<ArticleSummary>> = vec![None; max_idx + 1];
        for (idx, res) in results {
            match res {
                Ok(summary) => ordered[idx] = Some(summary),
                Err(reason) => tally.record(reason),
            }
        }
        ordered.into_iter().flatten().collect()
    }
}

/// Selects feed URLs across publishers subject to per-publisher and total
/// caps, preserving publisher order and within-publisher order.
fn plan_feed_fanout(
    catalogue: &FeedCatalogue,
    max_feeds_per_publisher: usize,
    max_total_feeds: usize,
) -> Vec<(String, String)> {
    let mut plan = Vec::new();
    for publisher in &catalogue.publishers {
        for feed_url in publisher.feed_urls.iter().take(max_feeds_per_publisher) {
            if plan.len() >= max_total_feeds {
                return plan;
            }
            plan.push((publisher.label.clone(), feed_url.clone()));
        }
    }
    plan
}

/// Dedupe by canonical URL (lowercase scheme+host, path/query as given);
/// first occurrence wins, original order preserved.
fn dedupe_by_canonical_url(entries: Vec<FeedEntry>, tally: &mut DropTally) -> Vec<FeedEntry> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for entry in entries {
        let canonical = entry.canonical_url();
        if seen.insert(canonical) {
            out.push(entry);
        } else {
            tally.record(DropReason::DuplicateUrl);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PublisherFeeds;

    fn catalogue_with(publishers: Vec<(&str, Vec<&str>)>) -> FeedCatalogue {
        FeedCatalogue {
            publishers: publishers
                .into_iter()
                .map(|(label, urls)| PublisherFeeds {
                    label: label.to_string(),
                    feed_urls: urls.into_iter().map(String::from).collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn plan_feed_fanout_respects_per_publisher_and_total_caps() {
        let catalogue = catalogue_with(vec![
            ("A", vec!["a1", "a2", "a3"]),
            ("B", vec!["b1", "b2"]),
            ("C", vec!["c1"]),
        ]);
        let plan = plan_feed_fanout(&catalogue, 2, 4);
        assert_eq!(plan.len(), 4);
        assert_eq!(plan[0], ("A".to_string(), "a1".to_string()));
        assert_eq!(plan[1], ("A".to_string(), "a2".to_string()));
        assert_eq!(plan[2], ("B".to_string(), "b1".to_string()));
        assert_eq!(plan[3], ("B".to_string(), "b2".to_string()));
    }

    #[test]
    fn dedupe_keeps_first_occurrence_and_preserves_order() {
        let a = FeedEntry::new("A", "https://example.com/x", None, None, None, "Ex", "example.com").unwrap();
        let b = FeedEntry::new("B", "https://EXAMPLE.com/x", None, None, None, "Ex", "example.com").unwrap();
        let c = FeedEntry::new("C", "https://example.com/y", None, None, None, "Ex", "example.com").unwrap();
        let mut tally = DropTally::default();
        let out = dedupe_by_canonical_url(vec![a.clone(), b, c.clone()], &mut tally);
        assert_eq!(out, vec![a, c]);
        assert_eq!(tally.count(), 1);
    }
}
