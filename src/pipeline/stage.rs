//! The stage seam every pipeline step implements.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Persona, RuntimeConfig, StyleSpec, VoiceProfile};
use crate::pipeline::artifact::{
    Narration, ResearchDossier, ScriptDraft, StagePayload, Timeline, VideoArtifact, VideoMetadata,
    VisualSet,
};
use crate::pipeline::stages;
use crate::pipeline::{StageError, StageName};
use crate::provider::Providers;
use crate::render::Renderer;

/// Artifacts accumulated across a run. Each slot fills exactly once, when its
/// stage succeeds.
#[derive(Debug, Default)]
pub struct RunState {
    pub topic: String,
    pub research: Option<ResearchDossier>,
    pub script: Option<ScriptDraft>,
    pub visuals: Option<VisualSet>,
    pub narration: Option<Narration>,
    pub timeline: Option<Timeline>,
    pub video: Option<VideoArtifact>,
    pub metadata: Option<VideoMetadata>,
}

impl RunState {
    pub(crate) fn new(topic: &str) -> Self {
        Self { topic: topic.to_string(), ..Default::default() }
    }

    pub(crate) fn absorb(&mut self, payload: &StagePayload) {
        match payload {
            StagePayload::Research(d) => self.research = Some(d.clone()),
            StagePayload::Script(d) => self.script = Some(d.clone()),
            StagePayload::Visual(d) => self.visuals = Some(d.clone()),
            StagePayload::Voice(d) => self.narration = Some(d.clone()),
            StagePayload::Sync(d) => self.timeline = Some(d.clone()),
            StagePayload::Video(d) => self.video = Some(d.clone()),
            StagePayload::Metadata(d) => self.metadata = Some(d.clone()),
        }
    }
}

/// Read-only surroundings of a stage: resolved config, materialized
/// providers, and the renderer.
#[derive(Clone)]
pub struct StageContext {
    pub cfg: Arc<RuntimeConfig>,
    pub providers: Providers,
    pub renderer: Arc<dyn Renderer>,
    /// Persona selected by `script.persona`, resolved up front.
    pub persona: Persona,
    pub style_name: String,
    pub style: StyleSpec,
    pub profile: VoiceProfile,
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> StageName;

    /// Produce this stage's artifact from what earlier stages left behind.
    async fn run(&self, state: &RunState, ctx: &StageContext) -> Result<StagePayload, StageError>;
}

/// The seven stages in execution order.
pub(crate) fn stage_set() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(stages::ResearchStage),
        Box::new(stages::ScriptStage),
        Box::new(stages::VisualStage),
        Box::new(stages::VoiceStage),
        Box::new(stages::SyncStage),
        Box::new(stages::VideoStage),
        Box::new(stages::MetadataStage),
    ]
}
