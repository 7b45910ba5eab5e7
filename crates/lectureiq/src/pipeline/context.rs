use crate::lecture::artifacts::Transcript;
use crate::storage::LocalAudio;
use crate::worker::job::PipelineJob;

use super::error::PipelineWarning;

pub struct PipelineContext {
    // Input
    pub job: PipelineJob,
    pub storage_key: String,

    // Stage 1 result, released when the run ends
    pub audio: Option<LocalAudio>,

    // Stage 2 result
    pub transcript: Option<Transcript>,

    // Stage 3 result, feeds notes and resources
    pub key_concepts: Vec<String>,

    // Stage 7 result
    pub resources_linked: usize,

    // Non-fatal warnings
    pub warnings: Vec<PipelineWarning>,
}

impl PipelineContext {
    pub fn new(job: PipelineJob, storage_key: String) -> Self {
        Self {
            job,
            storage_key,
            audio: None,
            transcript: None,
            key_concepts: Vec::new(),
            resources_linked: 0,
            warnings: Vec::new(),
        }
    }
}
