//! SearXNG call-through for self-hosted, keyless search.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::RuntimeConfig;
use crate::pipeline::artifact::SourceSnippet;
use crate::provider::{
    classify_status, classify_transport, env_key, Result, SearchProvider, USER_AGENT,
};

const DEFAULT_BASE: &str = "http://localhost:8888";

/// A SearXNG instance, located by `SEARX_BASE_URL`. No API key.
pub struct SearxSearch {
    client: Client,
    base_url: String,
    max_results: usize,
}

impl SearxSearch {
    pub fn new(cfg: &RuntimeConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: env_key("SEARX_BASE_URL").unwrap_or_else(|| DEFAULT_BASE.to_string()),
            max_results: cfg.search.max_results as usize,
        }
    }
}

#[async_trait]
impl SearchProvider for SearxSearch {
    fn name(&self) -> &'static str {
        "searx"
    }

    async fn research(&self, topic: &str) -> Result<Vec<SourceSnippet>> {
        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        tracing::debug!(topic = %topic, base = %self.base_url, "querying searx");
        let response = self
            .client
            .get(&url)
            .query(&[("q", topic), ("format", "json")])
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| classify_transport("searx", &e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status("searx", status, &text));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| classify_transport("searx", &e))?;
        let results = payload["results"].as_array().cloned().unwrap_or_default();
        let snippets = results
            .iter()
            .filter_map(|result| {
                let url = result["url"].as_str()?;
                Some((url.to_string(), result))
            })
            .enumerate()
            .map(|(rank, (url, result))| SourceSnippet {
                title: result["title"].as_str().unwrap_or_default().to_string(),
                url,
                snippet: result["content"].as_str().unwrap_or_default().to_string(),
                rank,
            })
            .take(self.max_results)
            .collect();
        Ok(snippets)
    }
}
