pub mod aggregator;
pub mod budget;
pub mod config;
pub mod error;
pub mod extractor;
pub mod feed_parser;
pub mod fetcher;
pub mod keywords;
pub mod llm;
pub mod models;
pub mod outputs;
pub mod registry;
pub mod sanitize;
pub mod summarizer;
pub mod telemetry;
