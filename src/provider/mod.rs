//! Provider capabilities: the trait contracts, the shared error taxonomy,
//! and the registry that turns config identifiers into live handles.
//!
//! Three capabilities exist: `llm` (script generation), `search` (topic
//! research), `voice` (narration synthesis). Stages call these traits and
//! nothing else; swapping vendors is a config edit, adding one is a single
//! registry registration.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{Persona, VoiceProfile};
use crate::pipeline::artifact::{AudioClip, ScriptDraft, ScriptSegment, SourceSnippet};

pub mod llm;
pub mod registry;
pub mod search;
pub mod voice;

pub use registry::{ProviderRegistry, Providers};

pub(crate) const USER_AGENT: &str = concat!("showrun/", env!("CARGO_PKG_VERSION"));

/// The three pluggable capability slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Llm,
    Search,
    Voice,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Llm => "llm",
            Capability::Search => "search",
            Capability::Voice => "voice",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures crossing the provider boundary.
///
/// `RateLimited`, `Timeout`, and `Unavailable` are transient: the
/// orchestrator retries them within the stage budget. `AuthFailed` and
/// `UnsupportedVoice` are fatal and abort the run immediately.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider}: rate limited")]
    RateLimited { provider: String },
    #[error("{provider}: request timed out")]
    Timeout { provider: String },
    #[error("{provider}: authentication failed: {detail}")]
    AuthFailed { provider: String, detail: String },
    #[error("{provider}: unavailable: {detail}")]
    Unavailable { provider: String, detail: String },
    #[error("{provider}: unsupported voice '{voice}'")]
    UnsupportedVoice { provider: String, voice: String },
}

impl ProviderError {
    pub fn rate_limited(provider: impl Into<String>) -> Self {
        Self::RateLimited { provider: provider.into() }
    }

    pub fn timeout(provider: impl Into<String>) -> Self {
        Self::Timeout { provider: provider.into() }
    }

    pub fn auth(provider: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::AuthFailed { provider: provider.into(), detail: detail.into() }
    }

    pub fn unavailable(provider: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Unavailable { provider: provider.into(), detail: detail.into() }
    }

    pub fn unsupported_voice(provider: impl Into<String>, voice: impl Into<String>) -> Self {
        Self::UnsupportedVoice { provider: provider.into(), voice: voice.into() }
    }

    /// Whether the orchestrator may retry the call.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Unavailable { .. }
        )
    }

    /// Which provider raised the error.
    pub fn provider(&self) -> &str {
        match self {
            Self::RateLimited { provider }
            | Self::Timeout { provider }
            | Self::AuthFailed { provider, .. }
            | Self::Unavailable { provider, .. }
            | Self::UnsupportedVoice { provider, .. } => provider,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Script generation behind a vendor API.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Registry identifier, e.g. `claude`.
    fn name(&self) -> &'static str;

    /// Produce a script draft for `topic` in the given persona, sized for
    /// `target_minutes` of narration. Marker extraction and timing are the
    /// script stage's job, not the provider's.
    async fn generate_script(
        &self,
        topic: &str,
        persona: &Persona,
        target_minutes: u32,
    ) -> Result<ScriptDraft>;
}

/// Web search behind a vendor API.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Registry identifier, e.g. `google`.
    fn name(&self) -> &'static str;

    /// Run one fresh query and return a finite, ranked snapshot of results.
    /// Calls are independent; nothing is resumable across them.
    async fn research(&self, topic: &str) -> Result<Vec<SourceSnippet>>;
}

/// Narration synthesis behind a vendor API.
#[async_trait]
pub trait VoiceProvider: Send + Sync {
    /// Registry identifier, e.g. `elevenlabs`.
    fn name(&self) -> &'static str;

    /// Render one segment's narration to an audio file on disk.
    async fn synthesize(
        &self,
        segment: &ScriptSegment,
        profile: &VoiceProfile,
    ) -> Result<AudioClip>;
}

/// Map an HTTP error status to the shared taxonomy.
pub(crate) fn classify_status(
    provider: &str,
    status: reqwest::StatusCode,
    body: &str,
) -> ProviderError {
    let snippet: String = body.chars().take(200).collect();
    match status.as_u16() {
        401 | 403 => ProviderError::auth(provider, snippet),
        429 => ProviderError::rate_limited(provider),
        408 => ProviderError::timeout(provider),
        _ => ProviderError::unavailable(provider, format!("HTTP {status}: {snippet}")),
    }
}

/// Map a reqwest transport failure to the shared taxonomy.
pub(crate) fn classify_transport(provider: &str, err: &reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::timeout(provider)
    } else {
        ProviderError::unavailable(provider, err.to_string())
    }
}

/// Read a secret from the environment. Empty values count as absent.
pub(crate) fn env_key(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_split_matches_the_taxonomy() {
        assert!(ProviderError::rate_limited("claude").is_transient());
        assert!(ProviderError::timeout("google").is_transient());
        assert!(ProviderError::unavailable("bing", "502").is_transient());
        assert!(!ProviderError::auth("claude", "bad key").is_transient());
        assert!(!ProviderError::unsupported_voice("openai_tts", "gravel").is_transient());
    }

    #[test]
    fn status_codes_map_to_error_kinds() {
        use reqwest::StatusCode;
        assert!(matches!(
            classify_status("claude", StatusCode::TOO_MANY_REQUESTS, ""),
            ProviderError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_status("claude", StatusCode::UNAUTHORIZED, "bad key"),
            ProviderError::AuthFailed { .. }
        ));
        assert!(matches!(
            classify_status("claude", StatusCode::BAD_GATEWAY, ""),
            ProviderError::Unavailable { .. }
        ));
        assert!(matches!(
            classify_status("claude", StatusCode::REQUEST_TIMEOUT, ""),
            ProviderError::Timeout { .. }
        ));
    }

    #[test]
    fn errors_name_their_provider() {
        let err = ProviderError::unsupported_voice("openai_tts", "gravel");
        assert_eq!(err.provider(), "openai_tts");
        assert!(err.to_string().contains("gravel"));
    }
}
