mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;

use cli::{Cli, Command, OutputFormat};
use nyeusi::aggregator;
use nyeusi::config::{ConfigOverrides, Settings};
use nyeusi::extractor::HtmlExtractor;
use nyeusi::feed_parser::FeedRsParser;
use nyeusi::fetcher::HttpFetcher;
use nyeusi::llm::OpenAiChatClient;
use nyeusi::models::{self, Language};
use nyeusi::outputs::json::{write_result, QueryResult};
use nyeusi::outputs::markdown::summaries_to_markdown;
use nyeusi::registry::default_catalogue;
use nyeusi::telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init();

    let cli = Cli::parse();

    let overrides = match cli.config.as_deref() {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(contents) => match ConfigOverrides::from_yaml_str(&contents) {
                Ok(overrides) => overrides,
                Err(e) => {
                    error!(error = %e, %path, "invalid config overrides file");
                    return ExitCode::FAILURE;
                }
            },
            Err(e) => {
                error!(error = %e, %path, "failed to read config overrides file");
                return ExitCode::FAILURE;
            }
        },
        None => ConfigOverrides::default(),
    };

    let settings = match Settings::load(overrides) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "failed to load settings");
            return ExitCode::FAILURE;
        }
    };

    let aggregator = aggregator::Aggregator::new(
        Arc::new(HttpFetcher),
        Arc::new(FeedRsParser),
        Arc::new(HtmlExtractor),
        Arc::new(OpenAiChatClient::new(settings.openai_api_key.clone())),
        default_catalogue(),
        settings,
    );

    let result = match cli.command {
        Command::Query {
            query,
            max_articles,
            language,
        } => {
            let language = parse_language(&language);
            aggregator
                .process_query(&query, Some(max_articles), language)
                .await
        }
        Command::Summarize { urls, language } => {
            let language = parse_language(&language);
            aggregator
                .summarize_articles(urls, language)
                .await
                .map(|summaries| (summaries, Vec::new()))
        }
    };

    match result {
        Ok((summaries, keywords)) => {
            render(&summaries, &keywords, cli.output).await;
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "pipeline failed");
            ExitCode::FAILURE
        }
    }
}

fn parse_language(s: &str) -> Language {
    match s {
        "en" => Language::English,
        _ => Language::Korean,
    }
}

async fn render(summaries: &[models::ArticleSummary], keywords: &[String], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let result = QueryResult { summaries, keywords };
            match write_result(&result, None).await {
                Ok(json) => println!("{json}"),
                Err(e) => error!(error = %e, "failed to render JSON"),
            }
        }
        OutputFormat::Markdown => {
            let query = keywords.join(", ");
            println!("{}", summaries_to_markdown(&query, keywords, summaries));
        }
    }
}
