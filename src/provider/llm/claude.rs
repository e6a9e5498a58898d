//! Anthropic Messages API call-through.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::{Persona, RuntimeConfig, SectionBounds};
use crate::pipeline::artifact::ScriptDraft;
use crate::provider::{
    classify_status, classify_transport, env_key, LlmProvider, ProviderError, Result, USER_AGENT,
};

use super::prompt;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// Script generation via the Anthropic Messages API.
///
/// Reads `ANTHROPIC_API_KEY` at construction. A missing key surfaces as
/// `AuthFailed` on first use; it is never logged and never enters the config.
pub struct ClaudeProvider {
    client: Client,
    api_key: Option<String>,
    model: String,
    temperature: f64,
    max_tokens: u32,
    sections: SectionBounds,
}

impl ClaudeProvider {
    pub fn new(cfg: &RuntimeConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: env_key("ANTHROPIC_API_KEY"),
            model: cfg.llm_model().unwrap_or(DEFAULT_MODEL).to_string(),
            temperature: cfg.llm.temperature,
            max_tokens: cfg.llm.max_tokens,
            sections: cfg.script.sections.clone(),
        }
    }
}

#[async_trait]
impl LlmProvider for ClaudeProvider {
    fn name(&self) -> &'static str {
        "claude"
    }

    async fn generate_script(
        &self,
        topic: &str,
        persona: &Persona,
        target_minutes: u32,
    ) -> Result<ScriptDraft> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::auth("claude", "ANTHROPIC_API_KEY is not set"))?;

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "system": prompt::system_prompt(persona),
            "messages": [{
                "role": "user",
                "content": prompt::user_prompt(topic, target_minutes, &self.sections)
            }]
        });

        tracing::debug!(model = %self.model, "requesting script from anthropic");
        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport("claude", &e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status("claude", status, &text));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| classify_transport("claude", &e))?;
        let text = payload["content"][0]["text"]
            .as_str()
            .ok_or_else(|| ProviderError::unavailable("claude", "response missing content text"))?;
        prompt::parse_script("claude", topic, text)
    }
}
