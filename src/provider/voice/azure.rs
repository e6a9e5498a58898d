//! Azure Cognitive Services text-to-speech.

use async_trait::async_trait;
use tracing::debug;

use crate::config::{RuntimeConfig, VoiceProfile};
use crate::pipeline::artifact::{AudioClip, ScriptSegment};
use crate::provider::voice::{clip_path, estimate_duration, probe_duration, write_clip};
use crate::provider::{
    classify_status, classify_transport, env_key, ProviderError, Result, VoiceProvider, USER_AGENT,
};

const OUTPUT_FORMAT: &str = "audio-24khz-96kbitrate-mono-mp3";

/// Azure TTS client, keyed by `AZURE_TTS_KEY` with `AZURE_TTS_REGION`
/// selecting the regional endpoint (default `eastus`).
pub struct AzureVoice {
    client: reqwest::Client,
    api_key: Option<String>,
    region: String,
}

impl AzureVoice {
    pub fn new(_cfg: &RuntimeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: env_key("AZURE_TTS_KEY"),
            region: env_key("AZURE_TTS_REGION").unwrap_or_else(|| "eastus".to_string()),
        }
    }

    fn endpoint(&self) -> String {
        format!("https://{}.tts.speech.microsoft.com/cognitiveservices/v1", self.region)
    }

    /// Azure voices ride in the profile's model slot (`en-US-JennyNeural`
    /// style names); an explicit `voice_name` overrides it.
    fn resolve_voice<'a>(profile: &'a VoiceProfile) -> &'a str {
        let named = profile.settings.voice_name.trim();
        if named.is_empty() { &profile.model } else { named }
    }

    fn ssml(voice: &str, profile: &VoiceProfile, narration: &str) -> String {
        format!(
            "<speak version='1.0' xml:lang='en-US'><voice name='{voice}'>\
             <prosody rate='{rate}' pitch='{pitch}'>{text}</prosody></voice></speak>",
            rate = xml_escape(&profile.settings.rate),
            pitch = xml_escape(&profile.settings.pitch),
            text = xml_escape(narration),
        )
    }
}

fn xml_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[async_trait]
impl VoiceProvider for AzureVoice {
    fn name(&self) -> &'static str {
        "azure"
    }

    async fn synthesize(
        &self,
        segment: &ScriptSegment,
        profile: &VoiceProfile,
    ) -> Result<AudioClip> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(ProviderError::auth("azure", "AZURE_TTS_KEY is not set"));
        };
        let voice = Self::resolve_voice(profile);
        debug!(segment = %segment.id, voice, region = %self.region, "synthesizing with azure");

        let response = self
            .client
            .post(self.endpoint())
            .header("Ocp-Apim-Subscription-Key", key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .header("user-agent", USER_AGENT)
            .body(Self::ssml(voice, profile, &segment.narration))
            .send()
            .await
            .map_err(|e| classify_transport("azure", &e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::BAD_REQUEST && text.to_lowercase().contains("voice") {
                return Err(ProviderError::unsupported_voice("azure", voice));
            }
            return Err(classify_status("azure", status, &text));
        }

        let bytes = response.bytes().await.map_err(|e| classify_transport("azure", &e))?;
        let path = clip_path(&profile.temp_dir, "azure", &segment.id);
        write_clip("azure", &path, &bytes).await?;

        let duration_seconds = match probe_duration(&path).await {
            Some(d) => d,
            None => estimate_duration(&segment.narration, profile.settings.speed),
        };
        Ok(AudioClip { segment_id: segment.id.clone(), path, duration_seconds })
    }
}
