//! Google Gemini generateContent call-through.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::{Persona, RuntimeConfig, SectionBounds};
use crate::pipeline::artifact::ScriptDraft;
use crate::provider::{
    classify_status, classify_transport, env_key, LlmProvider, ProviderError, Result, USER_AGENT,
};

use super::prompt;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Script generation via Gemini, with JSON output requested through
/// `responseMimeType`.
pub struct GeminiProvider {
    client: Client,
    api_key: Option<String>,
    model: String,
    temperature: f64,
    max_tokens: u32,
    sections: SectionBounds,
}

impl GeminiProvider {
    pub fn new(cfg: &RuntimeConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: env_key("GEMINI_API_KEY"),
            model: cfg.llm_model().unwrap_or(DEFAULT_MODEL).to_string(),
            temperature: cfg.llm.temperature,
            max_tokens: cfg.llm.max_tokens,
            sections: cfg.script.sections.clone(),
        }
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
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
            .ok_or_else(|| ProviderError::auth("gemini", "GEMINI_API_KEY is not set"))?;

        let body = serde_json::json!({
            "system_instruction": {"parts": [{"text": prompt::system_prompt(persona)}]},
            "contents": [{
                "parts": [{"text": prompt::user_prompt(topic, target_minutes, &self.sections)}]
            }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens,
                "responseMimeType": "application/json"
            }
        });

        tracing::debug!(model = %self.model, "requesting script from gemini");
        let url = format!("{API_BASE}/{}:generateContent", self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport("gemini", &e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status("gemini", status, &text));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| classify_transport("gemini", &e))?;
        let text = payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| ProviderError::unavailable("gemini", "response missing candidate text"))?;
        prompt::parse_script("gemini", topic, text)
    }
}
