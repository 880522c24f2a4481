use crate::models::ArticleSummary;
use std::fmt::Write;
use tracing::{debug, instrument};

/// Render a list of summaries (plus the keywords that produced them) as a
/// Markdown report.
#[instrument(level = "debug", skip_all)]
pub fn summaries_to_markdown(query: &str, keywords: &[String], summaries: &[ArticleSummary]) -> String {
    let mut md = String::new();

    writeln!(md, "# News Summary: {query}\n").unwrap();
    if !keywords.is_empty() {
        writeln!(md, "_Keywords: {}_\n", keywords.join(", ")).unwrap();
    }

    for summary in summaries {
        writeln!(md, "## {}\n", summary.title).unwrap();
        writeln!(md, "- [source]({})", summary.url).unwrap();
        writeln!(md, "- **{}**", summary.source).unwrap();
        if let Some(score) = summary.quality_score {
            writeln!(md, "- <small>quality: `{score:.2}`</small>").unwrap();
        }
        writeln!(md).unwrap();
        writeln!(md, "{}\n", summary.summary.trim()).unwrap();
        writeln!(md, "---\n").unwrap();
    }

    debug!(chars = md.len(), "rendered Markdown length");
    md
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_summaries_still_renders_header() {
        let md = summaries_to_markdown("semiconductors", &["semiconductor".to_string()], &[]);
        assert!(md.contains("# News Summary: semiconductors"));
        assert!(md.contains("Keywords: semiconductor"));
    }

    #[test]
    fn renders_one_summary_with_source_and_score() {
        let summary = ArticleSummary::new(
            "Chip Boom",
            "https://example.com/a",
            "Factual summary here.",
            "example.com",
            1000,
            Some(0.75),
        )
        .unwrap();
        let md = summaries_to_markdown("chips", &[], &[summary]);
        assert!(md.contains("## Chip Boom"));
        assert!(md.contains("[source](https://example.com/a)"));
        assert!(md.contains("quality: `0.75`"));
        assert!(md.contains("Factual summary here."));
    }
}
