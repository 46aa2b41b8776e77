//! Sleuth Common - shared types, configuration and collaborators
//!
//! Everything the research loop talks to lives here: the language model,
//! the web search provider and the page fetcher. Each collaborator is a
//! trait with a real HTTP implementation and a fake for tests.

pub mod config;
pub mod errors;
pub mod llm_client;
pub mod page_fetcher;
pub mod response_parser;
pub mod robots;
pub mod text;
pub mod types;
pub mod web_search;

pub use config::Config;
pub use errors::ResearchError;
pub use llm_client::{GenerateOptions, LlmClient, LlmError};
pub use page_fetcher::PageFetcher;
pub use types::*;
pub use web_search::SearchClient;
