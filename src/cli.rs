use clap::{Parser, Subcommand, ValueEnum};

/// Run the query → keyword → feed → summary pipeline locally, or summarize
/// a caller-supplied URL list directly, against stdout (JSON or Markdown).
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Optional path to a YAML overrides file (see Settings::load).
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Output format.
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Markdown,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// ProcessQuery: distill a natural-language query into keywords, gather
    /// matching articles from the feed registry, and summarize them.
    Query {
        query: String,
        #[arg(long, default_value_t = 10)]
        max_articles: usize,
        #[arg(long, default_value = "ko")]
        language: String,
    },
    /// SummarizeArticles: summarize the given URLs directly, bypassing the
    /// keyword/feed stages.
    Summarize {
        urls: Vec<String>,
        #[arg(long, default_value = "ko")]
        language: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_subcommand() {
        let cli = Cli::parse_from(["nyeusi", "query", "반도체 뉴스", "--max-articles", "5"]);
        match cli.command {
            Command::Query { query, max_articles, .. } => {
                assert_eq!(query, "반도체 뉴스");
                assert_eq!(max_articles, 5);
            }
            _ => panic!("expected Query subcommand"),
        }
    }

    #[test]
    fn parses_summarize_subcommand_with_multiple_urls() {
        let cli = Cli::parse_from([
            "nyeusi",
            "summarize",
            "https://example.com/a",
            "https://example.com/b",
        ]);
        match cli.command {
            Command::Summarize { urls, .. } => assert_eq!(urls.len(), 2),
            _ => panic!("expected Summarize subcommand"),
        }
    }

    #[test]
    fn defaults_output_format_to_json() {
        let cli = Cli::parse_from(["nyeusi", "query", "test"]);
        assert!(matches!(cli.output, OutputFormat::Json));
    }
}
