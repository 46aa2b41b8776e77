//! Web search collaborator
//!
//! `DuckDuckGoClient` posts to the DuckDuckGo HTML endpoint and scrapes the
//! result list. Results come back in provider ranking order, unique by URL,
//! at most ten.

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::SearchConfig;
use crate::errors::ResearchError;
use crate::types::{SearchQuery, SearchResult};

/// Hard cap on results handed to the loop
pub const MAX_RESULTS: usize = 10;

/// Search provider trait
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Ranked results for the query, at most `MAX_RESULTS`
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, ResearchError>;
}

/// DuckDuckGo HTML search
pub struct DuckDuckGoClient {
    config: SearchConfig,
    http: reqwest::Client,
}

impl DuckDuckGoClient {
    pub fn new(config: SearchConfig, user_agent: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(user_agent)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self { config, http })
    }

    fn form(&self, query: &SearchQuery) -> Vec<(&'static str, String)> {
        let mut form = vec![("q", query.text.clone())];
        if let Some(code) = query.window.provider_code() {
            form.push(("df", code.to_string()));
        }
        if let Some(region) = &self.config.region {
            form.push(("kl", region.clone()));
        }
        form
    }
}

#[async_trait]
impl SearchClient for DuckDuckGoClient {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, ResearchError> {
        if query.text.trim().is_empty() {
            return Err(ResearchError::SearchFailed("empty query".to_string()));
        }

        debug!("Searching DuckDuckGo: {}", query);
        let response = self
            .http
            .post(&self.config.endpoint)
            .form(&self.form(query))
            .header("Accept", "text/html")
            .send()
            .await
            .map_err(|e| ResearchError::SearchFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ResearchError::SearchFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| ResearchError::SearchFailed(e.to_string()))?;

        let results = parse_duckduckgo_html(&html, self.config.effective_max_results());
        info!("DuckDuckGo returned {} results for {}", results.len(), query);

        if results.is_empty() {
            return Err(ResearchError::SearchFailed(format!("no results for {}", query)));
        }
        Ok(results)
    }
}

/// Parse the DuckDuckGo HTML result page
pub fn parse_duckduckgo_html(html: &str, max_results: usize) -> Vec<SearchResult> {
    let document = Html::parse_document(html);

    let (Ok(result_sel), Ok(link_sel), Ok(snippet_sel)) = (
        Selector::parse(".result"),
        Selector::parse("a.result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut results = Vec::new();

    for block in document.select(&result_sel) {
        if results.len() >= max_results.min(MAX_RESULTS) {
            break;
        }

        let Some(link) = block.select(&link_sel).next() else {
            continue;
        };
        let title = collapse(&link.text().collect::<String>());
        let url = decode_redirect(link.value().attr("href").unwrap_or(""));

        if title.is_empty() || !url.starts_with("http") || !seen.insert(url.clone()) {
            continue;
        }

        let snippet = block
            .select(&snippet_sel)
            .next()
            .map(|el| collapse(&el.text().collect::<String>()))
            .unwrap_or_default();

        results.push(SearchResult {
            title,
            url,
            snippet,
        });
    }

    results
}

fn collapse(text: &str) -> String {
    crate::text::collapse_whitespace(text)
}

/// DuckDuckGo wraps result links as `//duckduckgo.com/l/?uddg=<encoded>&rut=...`
fn decode_redirect(href: &str) -> String {
    if !href.contains("uddg=") {
        return href.to_string();
    }
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{}", href)
    } else {
        href.to_string()
    };

    reqwest::Url::parse(&absolute)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(k, _)| k == "uddg")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or_else(|| href.to_string())
}

/// Fake search client for testing
///
/// Replays one scripted response per call; once the script runs out every
/// call returns `SearchFailed`. Issued queries are recorded.
#[derive(Default)]
pub struct FakeSearchClient {
    script: Mutex<VecDeque<Result<Vec<SearchResult>, ResearchError>>>,
    queries: Mutex<Vec<SearchQuery>>,
}

impl FakeSearchClient {
    pub fn new(script: Vec<Result<Vec<SearchResult>, ResearchError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// A client that never finds anything
    pub fn empty() -> Self {
        Self::default()
    }

    /// Queries received so far, oldest first
    pub fn queries(&self) -> Vec<SearchQuery> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.queries.lock().map(|q| q.len()).unwrap_or(0)
    }
}

/// Build a result list from `(title, url, snippet)` triples
pub fn results_from(entries: &[(&str, &str, &str)]) -> Vec<SearchResult> {
    entries
        .iter()
        .map(|(title, url, snippet)| SearchResult {
            title: title.to_string(),
            url: url.to_string(),
            snippet: snippet.to_string(),
        })
        .collect()
}

#[async_trait]
impl SearchClient for FakeSearchClient {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, ResearchError> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.clone());
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(Ok(results)) if results.is_empty() => {
                Err(ResearchError::SearchFailed(format!("no results for {}", query)))
            }
            Some(Ok(mut results)) => {
                results.truncate(MAX_RESULTS);
                Ok(results)
            }
            Some(Err(e)) => Err(e),
            None => Err(ResearchError::SearchFailed(format!("no results for {}", query))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TimeWindow;

    const DDG_PAGE: &str = r#"
<html><body>
<div class="result results_links">
  <h2 class="result__title">
    <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fen.wikipedia.org%2Fwiki%2FBerlin_Wall&amp;rut=abc">Berlin   Wall - Wikipedia</a>
  </h2>
  <a class="result__snippet">The Berlin Wall fell on 9 November 1989.</a>
</div>
<div class="result">
  <a class="result__a" href="https://www.history.com/berlin-wall">Fall of the Berlin Wall</a>
  <div class="result__snippet">East German officials opened the border.</div>
</div>
<div class="result">
  <a class="result__a" href="https://www.history.com/berlin-wall">Duplicate entry</a>
</div>
<div class="result">
  <a class="result__a" href="javascript:void(0)">Ad</a>
</div>
</body></html>
"#;

    #[test]
    fn test_parse_duckduckgo_html() {
        let results = parse_duckduckgo_html(DDG_PAGE, 10);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://en.wikipedia.org/wiki/Berlin_Wall");
        assert_eq!(results[0].title, "Berlin Wall - Wikipedia");
        assert!(results[0].snippet.contains("9 November 1989"));
        assert_eq!(results[1].url, "https://www.history.com/berlin-wall");
    }

    #[test]
    fn test_parse_respects_max_results() {
        let results = parse_duckduckgo_html(DDG_PAGE, 1);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_decode_redirect_passthrough() {
        assert_eq!(decode_redirect("https://a.example/x"), "https://a.example/x");
    }

    #[test]
    fn test_form_includes_window_and_region() {
        let config = SearchConfig {
            region: Some("us-en".to_string()),
            ..SearchConfig::default()
        };
        let client = DuckDuckGoClient::new(config, "test-agent").unwrap();
        let form = client.form(&SearchQuery::new("rust", TimeWindow::PastWeek));
        assert!(form.contains(&("df", "w".to_string())));
        assert!(form.contains(&("kl", "us-en".to_string())));

        let form = client.form(&SearchQuery::new("rust", TimeWindow::Any));
        assert_eq!(form.len(), 2);
    }

    #[tokio::test]
    async fn test_fake_search_client_script() {
        let fake = FakeSearchClient::new(vec![
            Ok(results_from(&[("A", "https://a.example", "a")])),
            Ok(Vec::new()),
        ]);
        let q = SearchQuery::new("q", TimeWindow::Any);

        assert_eq!(fake.search(&q).await.unwrap().len(), 1);
        assert!(matches!(
            fake.search(&q).await,
            Err(ResearchError::SearchFailed(_))
        ));
        assert!(fake.search(&q).await.is_err());
        assert_eq!(fake.call_count(), 3);
    }
}
