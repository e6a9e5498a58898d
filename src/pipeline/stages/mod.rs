//! The seven pipeline stages.

mod metadata;
mod research;
mod script;
mod sync;
mod video;
mod visual;
mod voice;

pub(crate) use metadata::MetadataStage;
pub(crate) use research::ResearchStage;
pub(crate) use script::ScriptStage;
pub(crate) use sync::SyncStage;
pub(crate) use video::VideoStage;
pub(crate) use visual::VisualStage;
pub(crate) use voice::VoiceStage;
