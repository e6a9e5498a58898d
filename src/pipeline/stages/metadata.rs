//! Metadata stage: publishing fields derived from the finished artifacts.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::info;

use crate::config::RuntimeConfig;
use crate::pipeline::artifact::{ResearchDossier, ScriptDraft, StagePayload, VideoMetadata};
use crate::pipeline::stage::{RunState, Stage, StageContext};
use crate::pipeline::{StageCause, StageError, StageName};

/// Words shorter than this are too generic to be tags.
const MIN_TAG_WORD: usize = 4;
const MAX_THUMBNAILS: usize = 3;

pub(crate) struct MetadataStage;

#[async_trait]
impl Stage for MetadataStage {
    fn name(&self) -> StageName {
        StageName::Metadata
    }

    async fn run(&self, state: &RunState, ctx: &StageContext) -> Result<StagePayload, StageError> {
        let script = state
            .script
            .as_ref()
            .ok_or_else(|| StageError::missing(StageName::Metadata, "script"))?;
        let research = state
            .research
            .as_ref()
            .ok_or_else(|| StageError::missing(StageName::Metadata, "research"))?;
        let video = state
            .video
            .as_ref()
            .ok_or_else(|| StageError::missing(StageName::Metadata, "video"))?;

        let stem = video.path.file_stem().map_or_else(
            || "video".to_string(),
            |s| s.to_string_lossy().to_string(),
        );
        let metadata_path = ctx.cfg.output.dir.join(format!("{stem}_metadata.json"));
        let meta = derive(script, research, &ctx.cfg, &ctx.style_name, metadata_path);

        let json = serde_json::to_string_pretty(&meta)
            .map_err(|e| StageError::new(StageName::Metadata, StageCause::Io(std::io::Error::other(e))))?;
        tokio::fs::create_dir_all(&ctx.cfg.output.dir)
            .await
            .map_err(|e| StageError::new(StageName::Metadata, StageCause::Io(e)))?;
        tokio::fs::write(&meta.metadata_path, json)
            .await
            .map_err(|e| StageError::new(StageName::Metadata, StageCause::Io(e)))?;
        info!(path = %meta.metadata_path.display(), tags = meta.tags.len(), "metadata written");

        Ok(StagePayload::Metadata(meta))
    }
}

fn derive(
    script: &ScriptDraft,
    research: &ResearchDossier,
    cfg: &RuntimeConfig,
    style_name: &str,
    metadata_path: std::path::PathBuf,
) -> VideoMetadata {
    let mut description = research.summary.clone();
    description.push_str("\n\nChapters:\n");
    for segment in &script.segments {
        description.push_str(&format!("{} {}\n", timestamp(segment.start_seconds), segment.title));
    }
    if !research.relevant_urls.is_empty() {
        description.push_str("\nSources:\n");
        for url in &research.relevant_urls {
            description.push_str(url);
            description.push('\n');
        }
    }

    VideoMetadata {
        title: script.title.clone(),
        description,
        tags: collect_tags(script, research, cfg),
        category: cfg.metadata.category.clone(),
        language: cfg.metadata.language.clone(),
        style: style_name.to_string(),
        persona: cfg.script.persona.clone(),
        thumbnail_suggestions: script
            .segments
            .iter()
            .take(MAX_THUMBNAILS)
            .map(|s| s.title.clone())
            .collect(),
        metadata_path,
    }
}

/// Default tags first, then topic words, then distinctive key-fact words,
/// deduplicated and capped.
fn collect_tags(script: &ScriptDraft, research: &ResearchDossier, cfg: &RuntimeConfig) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tags = Vec::new();
    let mut push = |tag: String, tags: &mut Vec<String>| {
        if tags.len() < cfg.metadata.max_tags && seen.insert(tag.clone()) {
            tags.push(tag);
        }
    };

    for tag in &cfg.metadata.default_tags {
        push(tag.to_lowercase(), &mut tags);
    }
    for word in script.topic.split_whitespace() {
        let word: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
        if word.len() >= 2 {
            push(word.to_lowercase(), &mut tags);
        }
    }
    for fact in &research.key_facts {
        for word in fact.split_whitespace().take(6) {
            let word: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
            if word.len() >= MIN_TAG_WORD {
                push(word.to_lowercase(), &mut tags);
            }
        }
    }
    tags
}

fn timestamp(seconds: f64) -> String {
    let whole = seconds.max(0.0).round() as u64;
    format!("{:02}:{:02}", whole / 60, whole % 60)
}
