//! Layered configuration: typed schema, builtin defaults, and override
//! resolution.

mod resolve;
mod schema;

pub use resolve::{ConfigError, ConfigTree, Override, Result};
pub use schema::{
    Canvas, LlmConfig, MetadataConfig, MusicConfig, OutputConfig, Persona, QualityConfig,
    RuntimeConfig, ScriptConfig, SearchConfig, SectionBounds, ServerConfig, StagePolicies,
    StagePolicy, StyleSpec, TransitionConfig, TransitionKind, VideoConfig, VoiceConfig,
    VoiceProfile, VoiceSettings,
};
