//! Page fetcher collaborator - downloads a URL and extracts readable text
//!
//! Honours robots.txt, spaces out requests to the same host and retries
//! transient failures with exponential backoff.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::FetchConfig;
use crate::errors::ResearchError;
use crate::robots::RobotsRules;
use crate::text::{collapse_whitespace, truncate_chars};

/// Page fetcher trait
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Extracted readable text of the page
    async fn fetch(&self, url: &str) -> Result<String, ResearchError>;
}

/// Real fetcher over HTTP
pub struct HttpPageFetcher {
    config: FetchConfig,
    http: reqwest::Client,
    robots: Mutex<HashMap<String, RobotsRules>>,
    last_request: Mutex<HashMap<String, Instant>>,
}

impl HttpPageFetcher {
    pub fn new(config: FetchConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            config,
            http,
            robots: Mutex::new(HashMap::new()),
            last_request: Mutex::new(HashMap::new()),
        })
    }

    /// Check robots.txt for the URL's host (cached per host)
    async fn can_fetch(&self, url: &reqwest::Url) -> bool {
        if !self.config.respect_robots {
            return true;
        }
        let Some(host) = url.host_str() else {
            return true;
        };
        let origin = format!("{}://{}", url.scheme(), host);
        let path = match url.query() {
            Some(q) => format!("{}?{}", url.path(), q),
            None => url.path().to_string(),
        };

        let cached = self
            .robots
            .lock()
            .ok()
            .and_then(|cache| cache.get(&origin).cloned());
        let rules = match cached {
            Some(rules) => rules,
            None => {
                let rules = self.load_robots(&origin).await;
                if let Ok(mut cache) = self.robots.lock() {
                    cache.insert(origin, rules.clone());
                }
                rules
            }
        };

        rules.is_allowed(&path)
    }

    /// Unreadable robots.txt means allowed
    async fn load_robots(&self, origin: &str) -> RobotsRules {
        let robots_url = format!("{}/robots.txt", origin);
        let response = match self.http.get(&robots_url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(_) => return RobotsRules::allow_all(),
            Err(e) => {
                warn!("Error reading {}: {}", robots_url, e);
                return RobotsRules::allow_all();
            }
        };
        match response.text().await {
            Ok(body) => RobotsRules::parse(&body, &self.config.user_agent),
            Err(_) => RobotsRules::allow_all(),
        }
    }

    /// Wait until `rate_limit_ms` has passed since the last request to `host`
    async fn respect_rate_limit(&self, host: &str) {
        let min_gap = Duration::from_millis(self.config.rate_limit_ms);
        let wait = {
            let Ok(mut last) = self.last_request.lock() else {
                return;
            };
            let now = Instant::now();
            let wait = last
                .get(host)
                .map(|prev| (*prev + min_gap).saturating_duration_since(now))
                .unwrap_or_default();
            // Reserve the slot now so a concurrent fetch queues behind us
            last.insert(host.to_string(), now + wait);
            wait
        };
        if !wait.is_zero() {
            debug!("Rate limiting {} for {:?}", host, wait);
            tokio::time::sleep(wait).await;
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<String, String> {
        let response = self
            .http
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml")
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        response.text().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ResearchError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| ResearchError::fetch(url, e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ResearchError::fetch(url, "unsupported scheme"));
        }

        if !self.can_fetch(&parsed).await {
            info!("Robots.txt disallows fetching {}", url);
            return Err(ResearchError::fetch(url, "disallowed by robots.txt"));
        }

        let host = parsed.host_str().unwrap_or_default().to_string();
        let attempts = self.config.max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 0..attempts {
            self.respect_rate_limit(&host).await;

            match self.fetch_once(url).await {
                Ok(html) => {
                    let text = extract_readable_text(&html, self.config.max_content_chars);
                    if text.is_empty() {
                        return Err(ResearchError::fetch(url, "no readable content"));
                    }
                    debug!("Fetched {} ({} chars)", url, text.len());
                    return Ok(text);
                }
                Err(e) => {
                    warn!(
                        "Error fetching {} (attempt {}/{}): {}",
                        url,
                        attempt + 1,
                        attempts,
                        e
                    );
                    last_error = e;
                    if attempt + 1 < attempts {
                        let backoff = retry_backoff(self.config.retry_backoff_ms, attempt);
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        Err(ResearchError::fetch(url, last_error))
    }
}

/// Exponential backoff before retry `attempt + 1`, saturating
fn retry_backoff(base_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor))
}

/// Extract readable text from HTML.
///
/// Prefers paragraphs inside `main`, `article` or `div.content`, then any
/// paragraph, then a plain-text rendering of the whole page. Whitespace is
/// collapsed and the result capped at `max_chars`.
pub fn extract_readable_text(html: &str, max_chars: usize) -> String {
    let document = Html::parse_document(html);

    let paragraphs = Selector::parse("p").ok().and_then(|p| {
        let in_container = ["main", "article", "div.content"]
            .iter()
            .filter_map(|sel| Selector::parse(sel).ok())
            .find_map(|sel| document.select(&sel).next())
            .map(|container| join_paragraphs(container.select(&p)))
            .filter(|text| !text.is_empty());

        in_container.or_else(|| Some(join_paragraphs(document.select(&p))).filter(|t| !t.is_empty()))
    });

    let text = paragraphs.unwrap_or_else(|| {
        let rendered = html2text::from_read(html.as_bytes(), 120);
        collapse_whitespace(&rendered)
    });

    truncate_chars(&text, max_chars)
}

fn join_paragraphs<'a>(paragraphs: impl Iterator<Item = ElementRef<'a>>) -> String {
    paragraphs
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fake page fetcher for testing
#[derive(Default)]
pub struct FakePageFetcher {
    pages: HashMap<String, Result<String, String>>,
    calls: Mutex<Vec<String>>,
}

impl FakePageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `text` for `url`
    pub fn page(mut self, url: &str, text: &str) -> Self {
        self.pages.insert(url.to_string(), Ok(text.to_string()));
        self
    }

    /// Fail every fetch of `url`
    pub fn failing(mut self, url: &str, reason: &str) -> Self {
        self.pages.insert(url.to_string(), Err(reason.to_string()));
        self
    }

    /// URLs fetched so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PageFetcher for FakePageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ResearchError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.to_string());
        }
        match self.pages.get(url) {
            Some(Ok(text)) => Ok(text.clone()),
            Some(Err(reason)) => Err(ResearchError::fetch(url, reason.clone())),
            None => Err(ResearchError::fetch(url, "HTTP 404")),
        }
    }
}
