//! External collaborators: transcription, text generation and resource
//! lookup. Each sits behind a trait so the pipeline can run against fakes.

pub mod error;
pub mod generator;
pub mod llm;
pub mod resources;
pub mod transcriber;

pub use error::ServiceError;
pub use generator::{ContentGenerator, Generated, LlmGenerator};
pub use llm::{ChatClient, CompletionRequest, LanguageModel};
pub use resources::{ResourceLinker, ResourceLookup, VideoSearch, YouTubeSearch};
pub use transcriber::{Transcriber, WhisperCommand};
