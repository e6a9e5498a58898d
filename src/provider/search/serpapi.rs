//! SerpApi call-through.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::RuntimeConfig;
use crate::pipeline::artifact::SourceSnippet;
use crate::provider::{
    classify_status, classify_transport, env_key, ProviderError, Result, SearchProvider,
    USER_AGENT,
};

const API_URL: &str = "https://serpapi.com/search";

/// Google results via SerpApi. Needs `SERPAPI_KEY`.
pub struct SerpApiSearch {
    client: Client,
    api_key: Option<String>,
    max_results: usize,
}

impl SerpApiSearch {
    pub fn new(cfg: &RuntimeConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: env_key("SERPAPI_KEY"),
            max_results: cfg.search.max_results as usize,
        }
    }
}

#[async_trait]
impl SearchProvider for SerpApiSearch {
    fn name(&self) -> &'static str {
        "serpapi"
    }

    async fn research(&self, topic: &str) -> Result<Vec<SourceSnippet>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::auth("serpapi", "SERPAPI_KEY is not set"))?;

        let num = self.max_results.to_string();
        let query = [("engine", "google"), ("q", topic), ("num", &num), ("api_key", api_key)];

        tracing::debug!(topic = %topic, "querying serpapi");
        let response = self
            .client
            .get(API_URL)
            .query(&query)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| classify_transport("serpapi", &e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status("serpapi", status, &text));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| classify_transport("serpapi", &e))?;
        let results = payload["organic_results"].as_array().cloned().unwrap_or_default();
        let snippets = results
            .iter()
            .filter_map(|result| {
                let url = result["link"].as_str()?;
                Some((url.to_string(), result))
            })
            .enumerate()
            .map(|(rank, (url, result))| SourceSnippet {
                title: result["title"].as_str().unwrap_or_default().to_string(),
                url,
                snippet: result["snippet"].as_str().unwrap_or_default().to_string(),
                rank,
            })
            .take(self.max_results)
            .collect();
        Ok(snippets)
    }
}
