use crate::config::Config;

use super::retry::RetryPolicy;

pub struct PipelineConfig {
    pub whisper_model: String,
    pub flashcard_count: usize,
    pub mcq_count: usize,
    pub max_resources: usize,
    pub retry: RetryPolicy,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            whisper_model: config.transcription.model.clone(),
            flashcard_count: config.generation.flashcard_count,
            mcq_count: config.generation.mcq_count,
            max_resources: config.resources.max_total,
            retry: RetryPolicy::from_config(&config.retry),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
