//! OpenAI Chat Completions call-through.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::{Persona, RuntimeConfig, SectionBounds};
use crate::pipeline::artifact::ScriptDraft;
use crate::provider::{
    classify_status, classify_transport, env_key, LlmProvider, ProviderError, Result, USER_AGENT,
};

use super::prompt;

const API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o";

/// Script generation via OpenAI chat completions, forced into JSON mode.
pub struct OpenAiProvider {
    client: Client,
    api_key: Option<String>,
    model: String,
    temperature: f64,
    max_tokens: u32,
    sections: SectionBounds,
}

impl OpenAiProvider {
    pub fn new(cfg: &RuntimeConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: env_key("OPENAI_API_KEY"),
            model: cfg.llm_model().unwrap_or(DEFAULT_MODEL).to_string(),
            temperature: cfg.llm.temperature,
            max_tokens: cfg.llm.max_tokens,
            sections: cfg.script.sections.clone(),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
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
            .ok_or_else(|| ProviderError::auth("openai", "OPENAI_API_KEY is not set"))?;

        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": prompt::system_prompt(persona)},
                {"role": "user", "content": prompt::user_prompt(topic, target_minutes, &self.sections)}
            ]
        });

        tracing::debug!(model = %self.model, "requesting script from openai");
        let response = self
            .client
            .post(API_URL)
            .bearer_auth(api_key)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport("openai", &e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status("openai", status, &text));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| classify_transport("openai", &e))?;
        let text = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ProviderError::unavailable("openai", "response missing message content"))?;
        prompt::parse_script("openai", topic, text)
    }
}
