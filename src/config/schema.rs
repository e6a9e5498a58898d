//! Typed configuration schema with builtin defaults.
//!
//! Every leaf is addressable by a dotted override path (`video.style`,
//! `llm.model.claude`, `stages.voice.attempts`, ...). Serde handles shape and
//! primitive types; [`RuntimeConfig::validate`] enforces the relational rules
//! serde cannot express (selected style/persona must exist, budgets must be
//! positive).

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::pipeline::StageName;

use super::{ConfigError, Result};

/// Immutable, fully resolved configuration for one pipeline run.
///
/// Produced by [`ConfigTree::resolve`](super::ConfigTree::resolve). Carries no
/// secrets: API keys live in the environment and are read by provider
/// constructors. Runs share it as `Arc<RuntimeConfig>`; nothing hands out
/// `&mut` access after resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub voice: VoiceConfig,
    pub script: ScriptConfig,
    pub video: VideoConfig,
    pub output: OutputConfig,
    pub metadata: MetadataConfig,
    pub quality_checks: QualityConfig,
    pub stages: StagePolicies,
    pub server: ServerConfig,
}

/// LLM capability selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Registry identifier (`claude`, `openai`, `gemini`, or anything
    /// registered by an embedder).
    pub provider: String,
    /// Per-provider model ids, keyed by registry identifier.
    pub model: BTreeMap<String, String>,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Web-search capability selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Registry identifier (`google`, `bing`, `serpapi`, `searx`, ...).
    pub provider: String,
    /// Result cap per query.
    pub max_results: u32,
}

/// TTS capability selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Registry identifier (`elevenlabs`, `openai_tts`, `azure`, ...).
    pub provider: String,
    /// Per-provider model ids, keyed by registry identifier.
    pub model: BTreeMap<String, String>,
    pub settings: VoiceSettings,
}

/// Flat synthesis tuning shared across voice providers.
///
/// Each provider reads only the fields it supports; an empty `voice_name`
/// means the provider default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub voice_name: String,
    pub speed: f64,
    pub stability: f64,
    pub similarity_boost: f64,
    pub style_strength: f64,
    pub use_speaker_boost: bool,
    /// SSML prosody rate (Azure), e.g. `+0%`.
    pub rate: String,
    /// SSML prosody pitch (Azure), e.g. `+0Hz`.
    pub pitch: String,
}

/// Everything the voice provider needs for one synthesis call, projected from
/// the resolved config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    /// Model id for the selected provider.
    pub model: String,
    pub settings: VoiceSettings,
    /// Directory synthesized clips are written to.
    pub temp_dir: PathBuf,
}

/// Script shaping: persona, pacing, and section bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Key into `personas`.
    pub persona: String,
    pub personas: BTreeMap<String, Persona>,
    pub target_minutes: u32,
    pub words_per_minute: u32,
    pub sections: SectionBounds,
}

/// A narration persona handed to the LLM prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub tone: String,
    pub audience: String,
    pub style: String,
    pub opener_hook: String,
}

/// Allowed section count and kinds for a generated script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionBounds {
    pub min: u32,
    pub max: u32,
    pub kinds: Vec<String>,
}

/// Visual styling and assembly knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Key into `styles`.
    pub style: String,
    pub styles: BTreeMap<String, StyleSpec>,
    pub transitions: TransitionConfig,
    /// How long a screenshot stays on screen before the next cue.
    pub screenshot_seconds: f64,
    pub background_music: MusicConfig,
}

/// One named visual style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleSpec {
    pub canvas: Canvas,
    pub fps: u32,
    /// Background color, `#rrggbb`.
    pub background: String,
    pub accent: String,
    pub font: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionConfig {
    #[serde(rename = "type")]
    pub kind: TransitionKind,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    Fade,
    Cut,
    Slide,
    Wipe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicConfig {
    pub enabled: bool,
    pub path: String,
    pub volume: f64,
}

/// Output locations and encoder settings handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub cache_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub video_codec: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub preset: String,
}

/// Publishing metadata defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataConfig {
    pub category: String,
    pub language: String,
    pub default_tags: Vec<String>,
    pub max_tags: usize,
}

/// Which stages carry a quality gate and the gate thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Stages whose output is gated before the run advances.
    pub enabled: Vec<StageName>,
    /// Script gate: allowed fractional deviation from `target_minutes`.
    pub script_length_tolerance: f64,
    /// Video gate: max A/V length mismatch in seconds.
    pub max_sync_drift_seconds: f64,
    /// Visual gate: minimum asset count.
    pub min_visual_assets: u32,
}

/// Retry budget, backoff base, and deadline for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StagePolicy {
    /// Total invocation budget, first attempt included. Must be >= 1.
    pub attempts: u32,
    /// Backoff base; actual delay doubles per retry with jitter.
    pub backoff_ms: u64,
    /// Per-invocation deadline; elapsing counts as a transient failure.
    pub timeout_seconds: u64,
}

/// One policy per pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagePolicies {
    pub research: StagePolicy,
    pub script: StagePolicy,
    pub visual: StagePolicy,
    pub voice: StagePolicy,
    pub sync: StagePolicy,
    pub video: StagePolicy,
    pub metadata: StagePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl RuntimeConfig {
    /// The selected persona, if it exists in the table.
    pub fn persona(&self) -> Option<&Persona> {
        self.script.personas.get(&self.script.persona)
    }

    /// The selected visual style, if it exists in the table.
    pub fn style(&self) -> Option<&StyleSpec> {
        self.video.styles.get(&self.video.style)
    }

    /// Model id for the selected LLM provider.
    pub fn llm_model(&self) -> Option<&str> {
        self.llm.model.get(&self.llm.provider).map(String::as_str)
    }

    /// Synthesis profile for the selected voice provider.
    pub fn voice_profile(&self) -> Option<VoiceProfile> {
        let model = self.voice.model.get(&self.voice.provider)?;
        Some(VoiceProfile {
            model: model.clone(),
            settings: self.voice.settings.clone(),
            temp_dir: self.output.temp_dir.clone(),
        })
    }

    /// Retry/backoff/deadline policy for a stage.
    pub fn policy(&self, stage: StageName) -> &StagePolicy {
        let s = &self.stages;
        match stage {
            StageName::Research => &s.research,
            StageName::Script => &s.script,
            StageName::Visual => &s.visual,
            StageName::Voice => &s.voice,
            StageName::Sync => &s.sync,
            StageName::Video => &s.video,
            StageName::Metadata => &s.metadata,
        }
    }

    /// Whether a stage's output passes through a quality gate.
    pub fn is_gated(&self, stage: StageName) -> bool {
        self.quality_checks.enabled.contains(&stage)
    }

    /// Relational checks serde cannot express. Called by the resolver after
    /// typed deserialization; every failure maps to a dotted path.
    pub fn validate(&self) -> Result<()> {
        if self.persona().is_none() {
            return Err(ConfigError::invalid(
                "script.persona",
                format!(
                    "unknown persona '{}' (available: {})",
                    self.script.persona,
                    keys(&self.script.personas)
                ),
            ));
        }
        if self.style().is_none() {
            return Err(ConfigError::invalid(
                "video.style",
                format!(
                    "unknown style '{}' (available: {})",
                    self.video.style,
                    keys(&self.video.styles)
                ),
            ));
        }
        if self.llm_model().is_none() {
            return Err(ConfigError::invalid(
                "llm.model",
                format!("no model entry for provider '{}'", self.llm.provider),
            ));
        }
        if !self.voice.model.contains_key(&self.voice.provider) {
            return Err(ConfigError::invalid(
                "voice.model",
                format!("no model entry for provider '{}'", self.voice.provider),
            ));
        }
        if self.script.target_minutes == 0 {
            return Err(ConfigError::invalid("script.target_minutes", "must be >= 1"));
        }
        if self.script.words_per_minute == 0 {
            return Err(ConfigError::invalid("script.words_per_minute", "must be >= 1"));
        }
        let bounds = &self.script.sections;
        if bounds.min == 0 || bounds.min > bounds.max {
            return Err(ConfigError::invalid(
                "script.sections",
                format!("invalid range {}..={}", bounds.min, bounds.max),
            ));
        }
        for (name, style) in &self.video.styles {
            if style.canvas.width == 0 || style.canvas.height == 0 || style.fps == 0 {
                return Err(ConfigError::invalid(
                    format!("video.styles.{name}"),
                    "canvas dimensions and fps must be positive",
                ));
            }
        }
        if self.video.screenshot_seconds <= 0.0 {
            return Err(ConfigError::invalid("video.screenshot_seconds", "must be > 0"));
        }
        if self.video.transitions.duration_seconds < 0.0 {
            return Err(ConfigError::invalid(
                "video.transitions.duration_seconds",
                "must be >= 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.video.background_music.volume) {
            return Err(ConfigError::invalid(
                "video.background_music.volume",
                "must be within 0.0..=1.0",
            ));
        }
        let q = &self.quality_checks;
        if q.script_length_tolerance < 0.0 {
            return Err(ConfigError::invalid(
                "quality_checks.script_length_tolerance",
                "must be >= 0",
            ));
        }
        if q.max_sync_drift_seconds < 0.0 {
            return Err(ConfigError::invalid(
                "quality_checks.max_sync_drift_seconds",
                "must be >= 0",
            ));
        }
        if self.metadata.max_tags == 0 {
            return Err(ConfigError::invalid("metadata.max_tags", "must be >= 1"));
        }
        for stage in StageName::ALL {
            if self.policy(stage).attempts == 0 {
                return Err(ConfigError::invalid(
                    format!("stages.{stage}.attempts"),
                    "must be >= 1",
                ));
            }
        }
        Ok(())
    }
}

fn keys<V>(map: &BTreeMap<String, V>) -> String {
    map.keys().cloned().collect::<Vec<_>>().join(", ")
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            voice: VoiceConfig::default(),
            script: ScriptConfig::default(),
            video: VideoConfig::default(),
            output: OutputConfig::default(),
            metadata: MetadataConfig::default(),
            quality_checks: QualityConfig::default(),
            stages: StagePolicies::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        let mut model = BTreeMap::new();
        model.insert("claude".into(), "claude-sonnet-4-5".into());
        model.insert("openai".into(), "gpt-4o".into());
        model.insert("gemini".into(), "gemini-2.0-flash".into());
        Self { provider: "claude".into(), model, temperature: 0.7, max_tokens: 8192 }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { provider: "google".into(), max_results: 8 }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        let mut model = BTreeMap::new();
        model.insert("elevenlabs".into(), "eleven_multilingual_v2".into());
        model.insert("openai_tts".into(), "tts-1-hd".into());
        model.insert("azure".into(), "en-US-JennyNeural".into());
        Self {
            provider: "elevenlabs".into(),
            model,
            settings: VoiceSettings::default(),
        }
    }
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            voice_name: String::new(),
            speed: 1.0,
            stability: 0.5,
            similarity_boost: 0.75,
            style_strength: 0.0,
            use_speaker_boost: true,
            rate: "+0%".into(),
            pitch: "+0Hz".into(),
        }
    }
}

impl Default for ScriptConfig {
    fn default() -> Self {
        let mut personas = BTreeMap::new();
        personas.insert(
            "tech_enthusiast".into(),
            Persona {
                tone: "energetic, fast, plugged-in".into(),
                audience: "developers and early adopters".into(),
                style: "short punchy sentences, concrete numbers, zero filler".into(),
                opener_hook: "open with the single most surprising fact".into(),
            },
        );
        personas.insert(
            "calm_explainer".into(),
            Persona {
                tone: "measured and warm".into(),
                audience: "curious generalists".into(),
                style: "plain language, one idea per sentence, gentle pacing".into(),
                opener_hook: "open with a question the viewer has asked themselves".into(),
            },
        );
        personas.insert(
            "news_anchor".into(),
            Persona {
                tone: "neutral and authoritative".into(),
                audience: "general news audience".into(),
                style: "inverted pyramid, attribution up front".into(),
                opener_hook: "open with the headline in one sentence".into(),
            },
        );
        Self {
            persona: "tech_enthusiast".into(),
            personas,
            target_minutes: 8,
            words_per_minute: 150,
            sections: SectionBounds {
                min: 5,
                max: 9,
                kinds: vec![
                    "intro".into(),
                    "main".into(),
                    "deep_dive".into(),
                    "recap".into(),
                    "outro".into(),
                ],
            },
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        let mut styles = BTreeMap::new();
        styles.insert(
            "dark_tech".into(),
            StyleSpec {
                canvas: Canvas { width: 1920, height: 1080 },
                fps: 30,
                background: "#0d1117".into(),
                accent: "#58a6ff".into(),
                font: "JetBrains Mono".into(),
            },
        );
        styles.insert(
            "news_room".into(),
            StyleSpec {
                canvas: Canvas { width: 1920, height: 1080 },
                fps: 30,
                background: "#13233a".into(),
                accent: "#e8b931".into(),
                font: "Inter".into(),
            },
        );
        styles.insert(
            "minimal_white".into(),
            StyleSpec {
                canvas: Canvas { width: 1920, height: 1080 },
                fps: 30,
                background: "#fafafa".into(),
                accent: "#111111".into(),
                font: "Helvetica Neue".into(),
            },
        );
        Self {
            style: "dark_tech".into(),
            styles,
            transitions: TransitionConfig { kind: TransitionKind::Fade, duration_seconds: 0.5 },
            screenshot_seconds: 8.0,
            background_music: MusicConfig { enabled: false, path: String::new(), volume: 0.08 },
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./output"),
            cache_dir: PathBuf::from("./cache"),
            temp_dir: PathBuf::from("./temp"),
            video_codec: "libx264".into(),
            audio_codec: "aac".into(),
            audio_bitrate: "192k".into(),
            preset: "fast".into(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            category: "Science & Technology".into(),
            language: "en".into(),
            default_tags: vec!["ai".into(), "technology".into(), "news".into()],
            max_tags: 20,
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            enabled: vec![StageName::Script, StageName::Video],
            script_length_tolerance: 0.35,
            max_sync_drift_seconds: 2.0,
            min_visual_assets: 3,
        }
    }
}

impl Default for StagePolicies {
    fn default() -> Self {
        Self {
            research: StagePolicy { attempts: 3, backoff_ms: 500, timeout_seconds: 30 },
            script: StagePolicy { attempts: 3, backoff_ms: 1000, timeout_seconds: 120 },
            visual: StagePolicy { attempts: 2, backoff_ms: 250, timeout_seconds: 30 },
            voice: StagePolicy { attempts: 3, backoff_ms: 1000, timeout_seconds: 120 },
            sync: StagePolicy { attempts: 1, backoff_ms: 0, timeout_seconds: 10 },
            video: StagePolicy { attempts: 2, backoff_ms: 2000, timeout_seconds: 600 },
            metadata: StagePolicy { attempts: 2, backoff_ms: 250, timeout_seconds: 30 },
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = RuntimeConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.video.style, "dark_tech");
        assert_eq!(cfg.script.persona, "tech_enthusiast");
        assert_eq!(
            cfg.quality_checks.enabled,
            vec![StageName::Script, StageName::Video]
        );
    }

    #[test]
    fn default_accessors_resolve() {
        let cfg = RuntimeConfig::default();
        assert!(cfg.persona().is_some());
        assert!(cfg.style().is_some());
        assert_eq!(cfg.llm_model(), Some("claude-sonnet-4-5"));
        let profile = cfg.voice_profile().unwrap();
        assert_eq!(profile.model, "eleven_multilingual_v2");
    }

    #[test]
    fn unknown_style_fails_validation() {
        let mut cfg = RuntimeConfig::default();
        cfg.video.style = "noir".into();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("video.style"));
        assert!(err.to_string().contains("noir"));
    }

    #[test]
    fn unknown_persona_fails_validation() {
        let mut cfg = RuntimeConfig::default();
        cfg.script.persona = "shock_jock".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_attempts_fails_validation() {
        let mut cfg = RuntimeConfig::default();
        cfg.stages.voice.attempts = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("stages.voice.attempts"));
    }

    #[test]
    fn per_stage_policies_line_up() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.policy(StageName::Sync).attempts, 1);
        assert_eq!(cfg.policy(StageName::Video).timeout_seconds, 600);
        assert!(cfg.is_gated(StageName::Script));
        assert!(!cfg.is_gated(StageName::Research));
    }
}
