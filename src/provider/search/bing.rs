//! Bing Web Search call-through.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::RuntimeConfig;
use crate::pipeline::artifact::SourceSnippet;
use crate::provider::{
    classify_status, classify_transport, env_key, ProviderError, Result, SearchProvider,
    USER_AGENT,
};

const API_URL: &str = "https://api.bing.microsoft.com/v7.0/search";

/// Bing Web Search v7. Needs `BING_SEARCH_API_KEY`.
pub struct BingSearch {
    client: Client,
    api_key: Option<String>,
    max_results: usize,
}

impl BingSearch {
    pub fn new(cfg: &RuntimeConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: env_key("BING_SEARCH_API_KEY"),
            max_results: cfg.search.max_results as usize,
        }
    }
}

#[async_trait]
impl SearchProvider for BingSearch {
    fn name(&self) -> &'static str {
        "bing"
    }

    async fn research(&self, topic: &str) -> Result<Vec<SourceSnippet>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::auth("bing", "BING_SEARCH_API_KEY is not set"))?;

        let count = self.max_results.to_string();
        tracing::debug!(topic = %topic, "querying bing web search");
        let response = self
            .client
            .get(API_URL)
            .query(&[("q", topic), ("count", &count), ("textDecorations", "false")])
            .header("Ocp-Apim-Subscription-Key", api_key)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| classify_transport("bing", &e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status("bing", status, &text));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| classify_transport("bing", &e))?;
        let pages = payload
            .pointer("/webPages/value")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let snippets = pages
            .iter()
            .filter_map(|page| {
                let url = page["url"].as_str()?;
                Some((url.to_string(), page))
            })
            .enumerate()
            .map(|(rank, (url, page))| SourceSnippet {
                title: page["name"].as_str().unwrap_or_default().to_string(),
                url,
                snippet: page["snippet"].as_str().unwrap_or_default().to_string(),
                rank,
            })
            .take(self.max_results)
            .collect();
        Ok(snippets)
    }
}
