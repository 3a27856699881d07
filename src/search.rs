use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const HOSTED_FIRECRAWL_URL: &str = "https://api.firecrawl.dev";

/// Options for one search call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    pub timeout_ms: u64,
    pub limit: usize,
    pub formats: Vec<String>,
}

impl SearchOptions {
    pub fn markdown(timeout: Duration, limit: usize) -> Self {
        Self {
            timeout_ms: timeout.as_millis() as u64,
            limit,
            formats: vec!["markdown".to_string()],
        }
    }
}

/// One scraped page. Every field is optional on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
}

impl SearchHit {
    /// Page text, falling back to rendered HTML when no markdown was returned.
    pub fn content(&self) -> Option<String> {
        if let Some(md) = self.markdown.as_deref().filter(|m| !m.trim().is_empty()) {
            return Some(md.to_string());
        }
        let html = self.html.as_deref().filter(|h| !h.trim().is_empty())?;
        Some(
            html2text::from_read(html.as_bytes(), 120)
                .unwrap_or_else(|_| html.to_string()),
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub data: Option<Vec<SearchHit>>,
}

/// Web search-and-scrape capability consumed by the research engine.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchResponse>;
}

/// Firecrawl `/v1/search` client.
pub struct SearchClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl SearchClient {
    pub fn from_env() -> Result<Self> {
        let base_url = dotenv::var("FIRECRAWL_BASE_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| HOSTED_FIRECRAWL_URL.to_string());
        let api_key = dotenv::var("FIRECRAWL_API_KEY").ok().filter(|k| !k.is_empty());

        if api_key.is_none() && base_url.trim_end_matches('/') == HOSTED_FIRECRAWL_URL {
            bail!("FIRECRAWL_API_KEY required (or set FIRECRAWL_BASE_URL for a self-hosted instance)");
        }
        url::Url::parse(&base_url)
            .with_context(|| format!("FIRECRAWL_BASE_URL is not a valid URL: {}", base_url))?;

        let client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/search", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SearchProvider for SearchClient {
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchResponse> {
        let body = serde_json::json!({
            "query": query,
            "limit": options.limit,
            "timeout": options.timeout_ms,
            "scrapeOptions": { "formats": options.formats },
        });

        let mut req = self
            .client
            .post(self.endpoint())
            .timeout(Duration::from_millis(options.timeout_ms))
            .json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req.send().await.context("Search request failed")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("Search returned {}", status);
        }
        let parsed: SearchResponse = resp
            .json()
            .await
            .context("Failed to parse search response")?;

        debug!(
            query,
            hits = parsed.data.as_ref().map(|d| d.len()).unwrap_or(0),
            "search complete"
        );
        Ok(parsed)
    }
}
