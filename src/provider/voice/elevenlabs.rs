//! ElevenLabs text-to-speech.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::config::{RuntimeConfig, VoiceProfile};
use crate::pipeline::artifact::{AudioClip, ScriptSegment};
use crate::provider::voice::{clip_path, estimate_duration, probe_duration, write_clip};
use crate::provider::{
    classify_status, classify_transport, env_key, ProviderError, Result, VoiceProvider, USER_AGENT,
};

const API_BASE: &str = "https://api.elevenlabs.io/v1/text-to-speech";
/// Public "Rachel" voice, usable on every plan.
const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

/// ElevenLabs client, keyed by `ELEVENLABS_API_KEY` with the target voice
/// taken from the profile or `ELEVENLABS_VOICE_ID`.
pub struct ElevenLabsVoice {
    client: reqwest::Client,
    api_key: Option<String>,
    voice_id: String,
}

impl ElevenLabsVoice {
    pub fn new(_cfg: &RuntimeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: env_key("ELEVENLABS_API_KEY"),
            voice_id: env_key("ELEVENLABS_VOICE_ID")
                .unwrap_or_else(|| DEFAULT_VOICE_ID.to_string()),
        }
    }

    fn resolve_voice<'a>(&'a self, profile: &'a VoiceProfile) -> &'a str {
        let named = profile.settings.voice_name.trim();
        if named.is_empty() { &self.voice_id } else { named }
    }
}

#[async_trait]
impl VoiceProvider for ElevenLabsVoice {
    fn name(&self) -> &'static str {
        "elevenlabs"
    }

    async fn synthesize(
        &self,
        segment: &ScriptSegment,
        profile: &VoiceProfile,
    ) -> Result<AudioClip> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(ProviderError::auth("elevenlabs", "ELEVENLABS_API_KEY is not set"));
        };
        let voice = self.resolve_voice(profile);
        debug!(segment = %segment.id, voice, "synthesizing with elevenlabs");

        let body = json!({
            "text": segment.narration,
            "model_id": profile.model,
            "voice_settings": {
                "stability": profile.settings.stability,
                "similarity_boost": profile.settings.similarity_boost,
                "style": profile.settings.style_strength,
                "use_speaker_boost": profile.settings.use_speaker_boost,
            },
        });

        let response = self
            .client
            .post(format!("{API_BASE}/{voice}"))
            .header("xi-api-key", key)
            .header("accept", "audio/mpeg")
            .header("user-agent", USER_AGENT)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport("elevenlabs", &e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::NOT_FOUND
                || (status == reqwest::StatusCode::BAD_REQUEST && text.contains("voice"))
            {
                return Err(ProviderError::unsupported_voice("elevenlabs", voice));
            }
            return Err(classify_status("elevenlabs", status, &text));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_transport("elevenlabs", &e))?;
        let path = clip_path(&profile.temp_dir, "elevenlabs", &segment.id);
        write_clip("elevenlabs", &path, &bytes).await?;

        let duration_seconds = match probe_duration(&path).await {
            Some(d) => d,
            None => estimate_duration(&segment.narration, profile.settings.speed),
        };
        Ok(AudioClip { segment_id: segment.id.clone(), path, duration_seconds })
    }
}
