use serde::{Deserialize, Serialize};

use crate::secrets::SecretSource;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub resources: ResourcesConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Transcription is CPU bound, so only half the cores get a worker.
fn default_worker_count() -> usize {
    (num_cpus::get() / 2).max(1)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database_path: None,
            worker_count: default_worker_count(),
            storage: StorageConfig::default(),
            transcription: TranscriptionConfig::default(),
            generation: GenerationConfig::default(),
            resources: ResourcesConfig::default(),
            retry: RetryConfig::default(),
            upload: UploadConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_upload_directory")]
    pub upload_directory: String,
    /// Where remote objects are staged for transcription. Defaults to the
    /// system temp directory.
    #[serde(default)]
    pub staging_directory: Option<String>,
    #[serde(default)]
    pub remote: Option<RemoteStorageConfig>,
}

fn default_upload_directory() -> String {
    "uploads".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_directory: default_upload_directory(),
            staging_directory: None,
            remote: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteStorageConfig {
    pub endpoint: String,
    pub bucket: String,
    /// Request server-side encryption on upload.
    #[serde(default = "default_true")]
    pub server_side_encryption: bool,
    #[serde(default = "default_storage_token")]
    pub access_token: SecretSource,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_storage_token() -> SecretSource {
    SecretSource::from_env("LECTUREIQ_STORAGE_TOKEN")
}

fn default_http_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    #[serde(default = "default_whisper_command")]
    pub command: String,
    #[serde(default = "default_whisper_model")]
    pub model: String,
}

fn default_whisper_command() -> String {
    "whisper".to_string()
}

fn default_whisper_model() -> String {
    "base".to_string()
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            command: default_whisper_command(),
            model: default_whisper_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_generation_key")]
    pub api_key: SecretSource,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_flashcard_count")]
    pub flashcard_count: usize,
    #[serde(default = "default_mcq_count")]
    pub mcq_count: usize,
}

fn default_generation_endpoint() -> String {
    "https://api.groq.com/openai/v1/chat/completions".to_string()
}

fn default_generation_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_generation_key() -> SecretSource {
    SecretSource::from_env("GROQ_API_KEY")
}

fn default_flashcard_count() -> usize {
    12
}

fn default_mcq_count() -> usize {
    8
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_generation_endpoint(),
            model: default_generation_model(),
            api_key: default_generation_key(),
            timeout_secs: default_http_timeout_secs(),
            flashcard_count: default_flashcard_count(),
            mcq_count: default_mcq_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesConfig {
    #[serde(default = "default_youtube_key")]
    pub youtube_api_key: SecretSource,
    /// Number of key concepts looked up (YouTube quota is per topic).
    #[serde(default = "default_topic_limit")]
    pub topic_limit: usize,
    #[serde(default = "default_max_resources")]
    pub max_total: usize,
    #[serde(default = "default_videos_per_topic")]
    pub videos_per_topic: usize,
}

fn default_youtube_key() -> SecretSource {
    SecretSource::from_env("YOUTUBE_API_KEY")
}

fn default_topic_limit() -> usize {
    3
}

fn default_max_resources() -> usize {
    5
}

fn default_videos_per_topic() -> usize {
    2
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            youtube_api_key: default_youtube_key(),
            topic_limit: default_topic_limit(),
            max_total: default_max_resources(),
            videos_per_topic: default_videos_per_topic(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_secs() -> u64 {
    60
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_secs: default_base_delay_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

fn default_max_file_size() -> u64 {
    100 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    ["mp3", "wav", "m4a", "ogg", "flac"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_file_size(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
