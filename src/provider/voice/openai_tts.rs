//! OpenAI text-to-speech (`/v1/audio/speech`).

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::config::{RuntimeConfig, VoiceProfile};
use crate::pipeline::artifact::{AudioClip, ScriptSegment};
use crate::provider::voice::{clip_path, estimate_duration, probe_duration, write_clip};
use crate::provider::{
    classify_status, classify_transport, env_key, ProviderError, Result, VoiceProvider, USER_AGENT,
};

const API_URL: &str = "https://api.openai.com/v1/audio/speech";
/// Voices the speech endpoint accepts. Anything else is rejected before we
/// spend a request on it.
const KNOWN_VOICES: &[&str] =
    &["alloy", "ash", "coral", "echo", "fable", "onyx", "nova", "sage", "shimmer"];
const DEFAULT_VOICE: &str = "alloy";

/// OpenAI TTS client. `OPENAI_TTS_API_KEY` wins over the shared
/// `OPENAI_API_KEY` when both are set.
pub struct OpenAiTtsVoice {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl OpenAiTtsVoice {
    pub fn new(_cfg: &RuntimeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: env_key("OPENAI_TTS_API_KEY").or_else(|| env_key("OPENAI_API_KEY")),
        }
    }

    fn resolve_voice(profile: &VoiceProfile) -> Result<&str> {
        let named = profile.settings.voice_name.trim();
        if named.is_empty() {
            return Ok(DEFAULT_VOICE);
        }
        if KNOWN_VOICES.contains(&named) {
            Ok(named)
        } else {
            Err(ProviderError::unsupported_voice("openai_tts", named))
        }
    }
}

#[async_trait]
impl VoiceProvider for OpenAiTtsVoice {
    fn name(&self) -> &'static str {
        "openai_tts"
    }

    async fn synthesize(
        &self,
        segment: &ScriptSegment,
        profile: &VoiceProfile,
    ) -> Result<AudioClip> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(ProviderError::auth("openai_tts", "OPENAI_TTS_API_KEY is not set"));
        };
        let voice = Self::resolve_voice(profile)?;
        debug!(segment = %segment.id, voice, "synthesizing with openai tts");

        let body = json!({
            "model": profile.model,
            "input": segment.narration,
            "voice": voice,
            "speed": profile.settings.speed,
            "response_format": "mp3",
        });

        let response = self
            .client
            .post(API_URL)
            .bearer_auth(key)
            .header("user-agent", USER_AGENT)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport("openai_tts", &e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status("openai_tts", status, &text));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_transport("openai_tts", &e))?;
        let path = clip_path(&profile.temp_dir, "openai_tts", &segment.id);
        write_clip("openai_tts", &path, &bytes).await?;

        let duration_seconds = match probe_duration(&path).await {
            Some(d) => d,
            None => estimate_duration(&segment.narration, profile.settings.speed),
        };
        Ok(AudioClip { segment_id: segment.id.clone(), path, duration_seconds })
    }
}
