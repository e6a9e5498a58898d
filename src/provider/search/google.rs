//! Google Programmable Search call-through.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::RuntimeConfig;
use crate::pipeline::artifact::SourceSnippet;
use crate::provider::{
    classify_status, classify_transport, env_key, ProviderError, Result, SearchProvider,
    USER_AGENT,
};

const API_URL: &str = "https://www.googleapis.com/customsearch/v1";

/// Google Programmable Search Engine. Needs both `GOOGLE_SEARCH_API_KEY` and
/// the engine id `GOOGLE_SEARCH_CX`.
pub struct GoogleSearch {
    client: Client,
    api_key: Option<String>,
    cx: Option<String>,
    max_results: usize,
}

impl GoogleSearch {
    pub fn new(cfg: &RuntimeConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: env_key("GOOGLE_SEARCH_API_KEY"),
            cx: env_key("GOOGLE_SEARCH_CX"),
            max_results: cfg.search.max_results as usize,
        }
    }
}

#[async_trait]
impl SearchProvider for GoogleSearch {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn research(&self, topic: &str) -> Result<Vec<SourceSnippet>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::auth("google", "GOOGLE_SEARCH_API_KEY is not set"))?;
        let cx = self
            .cx
            .as_deref()
            .ok_or_else(|| ProviderError::auth("google", "GOOGLE_SEARCH_CX is not set"))?;

        // The API caps one page at 10 results.
        let num = self.max_results.min(10).to_string();
        let query = [("key", api_key), ("cx", cx), ("q", topic), ("num", &num)];

        tracing::debug!(topic = %topic, "querying google programmable search");
        let response = self
            .client
            .get(API_URL)
            .query(&query)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| classify_transport("google", &e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status("google", status, &text));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| classify_transport("google", &e))?;
        let items = payload["items"].as_array().cloned().unwrap_or_default();
        let snippets = items
            .iter()
            .filter_map(|item| {
                let url = item["link"].as_str()?;
                Some((url.to_string(), item))
            })
            .enumerate()
            .map(|(rank, (url, item))| SourceSnippet {
                title: item["title"].as_str().unwrap_or_default().to_string(),
                url,
                snippet: item["snippet"].as_str().unwrap_or_default().to_string(),
                rank,
            })
            .take(self.max_results)
            .collect();
        Ok(snippets)
    }
}
