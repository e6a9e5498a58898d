//! Identifier -> constructor registry for the three capability slots.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{ConfigError, RuntimeConfig};

use super::{llm, search, voice, Capability, LlmProvider, SearchProvider, VoiceProvider};

type LlmCtor = Box<dyn Fn(&RuntimeConfig) -> Arc<dyn LlmProvider> + Send + Sync>;
type SearchCtor = Box<dyn Fn(&RuntimeConfig) -> Arc<dyn SearchProvider> + Send + Sync>;
type VoiceCtor = Box<dyn Fn(&RuntimeConfig) -> Arc<dyn VoiceProvider> + Send + Sync>;

/// Maps configuration identifiers to provider constructors.
///
/// Open for extension, closed for modification: registering a new vendor is
/// one `register_*` call, and a duplicate identifier is refused with the
/// original entry kept. Selection happens in [`materialize`], which
/// constructs each selected provider exactly once per run. Handles are never
/// shared across runs; concurrent runs only share this table of constructors.
///
/// [`materialize`]: Self::materialize
pub struct ProviderRegistry {
    llm: HashMap<String, LlmCtor>,
    search: HashMap<String, SearchCtor>,
    voice: HashMap<String, VoiceCtor>,
}

impl ProviderRegistry {
    /// Empty registry. Embedders that want full control register everything
    /// themselves.
    pub fn new() -> Self {
        Self { llm: HashMap::new(), search: HashMap::new(), voice: HashMap::new() }
    }

    /// Registry with every builtin vendor registered.
    pub fn with_defaults() -> Self {
        let mut r = Self::new();
        r.register_llm("claude", |cfg| Arc::new(llm::ClaudeProvider::new(cfg)));
        r.register_llm("openai", |cfg| Arc::new(llm::OpenAiProvider::new(cfg)));
        r.register_llm("gemini", |cfg| Arc::new(llm::GeminiProvider::new(cfg)));
        r.register_search("google", |cfg| Arc::new(search::GoogleSearch::new(cfg)));
        r.register_search("bing", |cfg| Arc::new(search::BingSearch::new(cfg)));
        r.register_search("serpapi", |cfg| Arc::new(search::SerpApiSearch::new(cfg)));
        r.register_search("searx", |cfg| Arc::new(search::SearxSearch::new(cfg)));
        r.register_voice("elevenlabs", |cfg| Arc::new(voice::ElevenLabsVoice::new(cfg)));
        r.register_voice("openai_tts", |cfg| Arc::new(voice::OpenAiTtsVoice::new(cfg)));
        r.register_voice("azure", |cfg| Arc::new(voice::AzureVoice::new(cfg)));
        r
    }

    /// Register an LLM constructor under `id`. Returns `false` and keeps the
    /// existing entry if the identifier is already taken.
    pub fn register_llm(
        &mut self,
        id: impl Into<String>,
        ctor: impl Fn(&RuntimeConfig) -> Arc<dyn LlmProvider> + Send + Sync + 'static,
    ) -> bool {
        let id = id.into();
        if self.llm.contains_key(&id) {
            return false;
        }
        self.llm.insert(id, Box::new(ctor));
        true
    }

    /// Register a search constructor under `id`.
    pub fn register_search(
        &mut self,
        id: impl Into<String>,
        ctor: impl Fn(&RuntimeConfig) -> Arc<dyn SearchProvider> + Send + Sync + 'static,
    ) -> bool {
        let id = id.into();
        if self.search.contains_key(&id) {
            return false;
        }
        self.search.insert(id, Box::new(ctor));
        true
    }

    /// Register a voice constructor under `id`.
    pub fn register_voice(
        &mut self,
        id: impl Into<String>,
        ctor: impl Fn(&RuntimeConfig) -> Arc<dyn VoiceProvider> + Send + Sync + 'static,
    ) -> bool {
        let id = id.into();
        if self.voice.contains_key(&id) {
            return false;
        }
        self.voice.insert(id, Box::new(ctor));
        true
    }

    /// Construct the LLM provider `id` selects.
    pub fn llm(&self, id: &str, cfg: &RuntimeConfig) -> Result<Arc<dyn LlmProvider>, ConfigError> {
        self.llm
            .get(id)
            .map(|ctor| ctor(cfg))
            .ok_or_else(|| self.unknown(Capability::Llm, id))
    }

    /// Construct the search provider `id` selects.
    pub fn search(
        &self,
        id: &str,
        cfg: &RuntimeConfig,
    ) -> Result<Arc<dyn SearchProvider>, ConfigError> {
        self.search
            .get(id)
            .map(|ctor| ctor(cfg))
            .ok_or_else(|| self.unknown(Capability::Search, id))
    }

    /// Construct the voice provider `id` selects.
    pub fn voice(
        &self,
        id: &str,
        cfg: &RuntimeConfig,
    ) -> Result<Arc<dyn VoiceProvider>, ConfigError> {
        self.voice
            .get(id)
            .map(|ctor| ctor(cfg))
            .ok_or_else(|| self.unknown(Capability::Voice, id))
    }

    /// Construct every provider the config selects, before any stage runs.
    ///
    /// An unregistered identifier fails here with
    /// [`ConfigError::UnknownProvider`], no network touched.
    pub fn materialize(&self, cfg: &RuntimeConfig) -> Result<Providers, ConfigError> {
        Ok(Providers {
            llm: self.llm(&cfg.llm.provider, cfg)?,
            search: self.search(&cfg.search.provider, cfg)?,
            voice: self.voice(&cfg.voice.provider, cfg)?,
        })
    }

    /// Registered identifiers for a capability, sorted.
    pub fn registered(&self, capability: Capability) -> Vec<String> {
        let mut ids: Vec<String> = match capability {
            Capability::Llm => self.llm.keys().cloned().collect(),
            Capability::Search => self.search.keys().cloned().collect(),
            Capability::Voice => self.voice.keys().cloned().collect(),
        };
        ids.sort();
        ids
    }

    fn unknown(&self, capability: Capability, id: &str) -> ConfigError {
        ConfigError::UnknownProvider {
            capability,
            identifier: id.to_string(),
            registered: self.registered(capability).join(", "),
        }
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Live handles for one run, constructed together and dropped together.
#[derive(Clone)]
pub struct Providers {
    pub llm: Arc<dyn LlmProvider>,
    pub search: Arc<dyn SearchProvider>,
    pub voice: Arc<dyn VoiceProvider>,
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers")
            .field("llm", &self.llm.name())
            .field("search", &self.search.name())
            .field("voice", &self.voice.name())
            .finish()
    }
}
