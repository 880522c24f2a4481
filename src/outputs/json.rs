use crate::models::ArticleSummary;
use std::error::Error;
use tokio::fs;
use tracing::{error, info, instrument};

/// A `ProcessQuery`/`SummarizeArticles` result: a flat
/// `{summaries, keywords}` payload.
#[derive(Debug, serde::Serialize)]
pub struct QueryResult<'a> {
    pub summaries: &'a [ArticleSummary],
    pub keywords: &'a [String],
}

/// Render a query result to a JSON string for the CLI's `--output json`
/// mode (stdout) or, if `path` is given, a file on disk.
#[instrument(level = "info", skip_all)]
pub async fn write_result(result: &QueryResult<'_>, path: Option<&str>) -> Result<String, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(result)?;

    if let Some(path) = path {
        info!(%path, "writing JSON result");
        if let Some(parent) = std::path::Path::new(path).parent() {
            fs::create_dir_all(parent).await?;
        }
        if let Err(e) = fs::write(path, &json).await {
            error!(%path, error = %e, "failed to write JSON result");
            return Err(e.into());
        }
    }

    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn renders_summaries_and_keywords() {
        let summary = ArticleSummary::new(
            "Title",
            "https://example.com/a",
            "A factual summary.",
            "example.com",
            1000,
            Some(0.8),
        )
        .unwrap();
        let summaries = vec![summary];
        let keywords = vec!["semiconductor".to_string()];
        let result = QueryResult {
            summaries: &summaries,
            keywords: &keywords,
        };
        let json = write_result(&result, None).await.unwrap();
        assert!(json.contains("\"summary\""));
        assert!(json.contains("semiconductor"));
        assert!(json.contains("original_length"));
    }
}
