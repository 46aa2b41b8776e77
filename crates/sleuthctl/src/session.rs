//! One conversation with the assistant.
//!
//! Holds the research loop and the direct responder, built once from the
//! config, and routes each user turn to one of them.

use anyhow::{Context, Result};
use sleuth_common::llm_client::build_llm_client;
use sleuth_common::page_fetcher::HttpPageFetcher;
use sleuth_common::web_search::DuckDuckGoClient;
use sleuth_common::{Config, LlmClient, PageFetcher, Question, ResearchError, SearchClient};
use sleuth_research::{DirectResponder, ProgressEmitter, RefinementLoop, ResearchReport};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::input::UserInput;

#[derive(Debug)]
pub enum TurnResult {
    Researched(ResearchReport),
    Direct(String),
    /// Empty input or quit, nothing was asked
    Nothing,
}

pub struct Session {
    research: RefinementLoop,
    direct: DirectResponder,
    show_rounds: bool,
    model_name: String,
}

impl Session {
    /// Real collaborators: configured model backend, DuckDuckGo, HTTP fetcher
    pub fn from_config(config: &Config) -> Result<Self> {
        let llm = build_llm_client(config).context("Failed to set up the language model")?;
        let search = DuckDuckGoClient::new(config.search.clone(), &config.fetch.user_agent)
            .context("Failed to set up web search")?;
        let fetcher =
            HttpPageFetcher::new(config.fetch.clone()).context("Failed to set up page fetcher")?;

        Ok(Self::new(llm, Arc::new(search), Arc::new(fetcher), config))
    }

    pub fn new(
        llm: Arc<dyn LlmClient>,
        search: Arc<dyn SearchClient>,
        fetcher: Arc<dyn PageFetcher>,
        config: &Config,
    ) -> Self {
        let model_name = llm.model_name().to_string();
        let direct = DirectResponder::new(
            llm.clone(),
            Duration::from_secs(config.research.step_timeout_secs),
            config.sampling.max_tokens,
        );
        let research = RefinementLoop::new(llm, search, fetcher, config.research.clone());

        Self {
            research,
            direct,
            show_rounds: config.research.show_rounds,
            model_name,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn show_rounds(&self) -> bool {
        self.show_rounds
    }

    pub async fn handle(
        &self,
        input: UserInput,
        progress: &dyn ProgressEmitter,
    ) -> Result<TurnResult, ResearchError> {
        let turn = Uuid::new_v4();
        match input {
            UserInput::Empty | UserInput::Quit => Ok(TurnResult::Nothing),
            UserInput::Search(text) => {
                let question = Question::new(&text);
                if question.is_empty() {
                    return Ok(TurnResult::Nothing);
                }
                let span = info_span!("turn", id = %turn, kind = "search");
                async {
                    info!("Researching: {}", question);
                    let report = self.research.answer(&question, progress).await?;
                    Ok(TurnResult::Researched(report))
                }
                .instrument(span)
                .await
            }
            UserInput::Direct(text) => {
                let span = info_span!("turn", id = %turn, kind = "direct");
                async {
                    info!("Direct reply ({} chars in)", text.chars().count());
                    let reply = self.direct.respond(&text).await?;
                    Ok(TurnResult::Direct(reply))
                }
                .instrument(span)
                .await
            }
        }
    }
}
