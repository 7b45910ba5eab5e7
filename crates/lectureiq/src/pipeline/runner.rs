use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, info_span, warn};

use crate::db::{artifact_repo, lecture_repo, Database};
use crate::lecture::artifacts::{Note, Transcript};
use crate::sanitize::{self, MAX_ERROR_MESSAGE_CHARS};
use crate::services::generator::{placeholder_flashcards, placeholder_mcqs};
use crate::services::{ContentGenerator, Generated, ResourceLookup, Transcriber};
use crate::storage::{LocalAudio, StorageLocator};
use crate::worker::job::PipelineJob;

use super::checkpoint::Checkpoint;
use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::{PipelineError, PipelineWarning};
use super::progress::{ProgressReporter, ProgressTracker};
use super::retry::RetryDecision;

/// External collaborators the stages call.
#[derive(Clone)]
pub struct Services {
    pub transcriber: Arc<dyn Transcriber>,
    pub generator: Arc<dyn ContentGenerator>,
    pub resources: Arc<dyn ResourceLookup>,
}

/// How a single run ended.
#[derive(Debug)]
pub enum RunOutcome {
    Completed {
        warnings: Vec<PipelineWarning>,
    },
    /// The run failed and should be re-enqueued as `job` after `delay`.
    Retry {
        job: PipelineJob,
        delay: Duration,
        error: String,
    },
    /// Retries are exhausted; the lecture is FAILED.
    Failed {
        error: String,
    },
    /// The lecture is gone or was reprocessed; nothing was written.
    Dropped {
        reason: String,
    },
}

pub struct Pipeline {
    config: Arc<PipelineConfig>,
    db: Database,
    locator: StorageLocator,
    services: Services,
}

impl Pipeline {
    pub fn new(
        config: Arc<PipelineConfig>,
        db: Database,
        locator: StorageLocator,
        services: Services,
    ) -> Self {
        Self {
            config,
            db,
            locator,
            services,
        }
    }

    /// Runs every stage for one job and settles the lecture's state.
    pub fn run(&self, job: &PipelineJob, progress: &dyn ProgressReporter) -> RunOutcome {
        let _pipeline_span = info_span!("pipeline",
            lecture_id = %job.lecture_id,
            generation = job.generation,
            attempt = job.attempt,
        )
        .entered();

        let storage_key = match lecture_repo::find_by_id(&self.db, &job.lecture_id) {
            Ok(Some(row)) if row.generation == job.generation => row.storage_key,
            Ok(Some(row)) => {
                let reason = format!(
                    "generation {} superseded by {}",
                    job.generation, row.generation
                );
                info!("Dropping stale job: {}", reason);
                return RunOutcome::Dropped { reason };
            }
            Ok(None) => {
                info!("Dropping job: lecture no longer exists");
                return RunOutcome::Dropped {
                    reason: "lecture no longer exists".to_string(),
                };
            }
            Err(e) => {
                let mut tracker =
                    ProgressTracker::new(&self.db, &job.lecture_id, job.generation, progress);
                return self.handle_failure(job, &mut tracker, e.into());
            }
        };

        let mut ctx = PipelineContext::new(job.clone(), storage_key);
        let mut tracker = ProgressTracker::new(&self.db, &job.lecture_id, job.generation, progress);

        let result = self.run_stages(&mut ctx, &mut tracker);

        if let Some(audio) = ctx.audio.take() {
            self.locator.release(audio);
        }

        match result {
            Ok(()) => {
                info!(
                    warnings = ctx.warnings.len(),
                    resources = ctx.resources_linked,
                    "Lecture processed"
                );
                RunOutcome::Completed {
                    warnings: ctx.warnings,
                }
            }
            Err(e) => self.handle_failure(job, &mut tracker, e),
        }
    }

    fn run_stages(
        &self,
        ctx: &mut PipelineContext,
        tracker: &mut ProgressTracker<'_>,
    ) -> Result<(), PipelineError> {
        {
            let _step = info_span!("begin").entered();
            tracker.begin()?;
        }

        // Stage 1: Resolve audio to a local file
        let audio = {
            let _step = info_span!("acquire_audio").entered();
            ctx.audio
                .insert(self.step_acquire_audio(&ctx.storage_key, tracker)?)
        };

        // Stage 2: Transcribe
        let transcript = {
            let _step = info_span!("transcribe").entered();
            ctx.transcript
                .insert(self.step_transcribe(audio.path(), tracker)?)
        };

        // Stage 3: Key concepts
        {
            let _step = info_span!("extract_concepts").entered();
            ctx.key_concepts =
                self.step_extract_concepts(transcript, tracker, &mut ctx.warnings)?;
        }

        // Stage 4: Notes
        {
            let _step = info_span!("generate_notes").entered();
            self.step_generate_notes(transcript, &ctx.key_concepts, tracker, &mut ctx.warnings)?;
        }

        // Stage 5: Flashcards
        {
            let _step = info_span!("generate_flashcards").entered();
            self.step_generate_flashcards(transcript, tracker, &mut ctx.warnings)?;
        }

        // Stage 6: MCQs
        {
            let _step = info_span!("generate_mcqs").entered();
            self.step_generate_mcqs(transcript, tracker, &mut ctx.warnings)?;
        }

        // Stage 7: Resources, never fatal
        {
            let _step = info_span!("link_resources").entered();
            ctx.resources_linked =
                self.step_link_resources(&ctx.key_concepts, tracker, &mut ctx.warnings)?;
        }

        tracker.complete()?;
        Ok(())
    }

    fn step_acquire_audio(
        &self,
        storage_key: &str,
        tracker: &mut ProgressTracker<'_>,
    ) -> Result<LocalAudio, PipelineError> {
        let audio = self.locator.resolve(storage_key)?;
        debug!(
            "Audio ready at {} (staged: {})",
            sanitize::redact_path(audio.path()),
            audio.is_staged()
        );
        // On error `audio` is dropped here and a staged copy removed.
        tracker.checkpoint(Checkpoint::AudioReady, |_| Ok(()))?;
        Ok(audio)
    }

    fn step_transcribe(
        &self,
        audio: &Path,
        tracker: &mut ProgressTracker<'_>,
    ) -> Result<Transcript, PipelineError> {
        let transcript = self
            .services
            .transcriber
            .transcribe(audio, &self.config.whisper_model)?;
        let duration = transcript.duration_secs();

        let (id, generation) = (tracker.lecture_id().to_string(), tracker.generation());
        tracker.checkpoint(Checkpoint::Transcribed, |conn| {
            artifact_repo::replace_transcript(conn, &id, &transcript)?;
            if let Some(duration) = duration {
                lecture_repo::set_duration(conn, &id, generation, duration)?;
            }
            Ok(())
        })?;
        Ok(transcript)
    }

    fn step_extract_concepts(
        &self,
        transcript: &Transcript,
        tracker: &mut ProgressTracker<'_>,
        warnings: &mut Vec<PipelineWarning>,
    ) -> Result<Vec<String>, PipelineError> {
        let concepts = self
            .services
            .generator
            .key_concepts(&transcript.full_text)?;
        let concepts = take_generated(concepts, "key_concepts", warnings);

        tracker.checkpoint(Checkpoint::ConceptsExtracted, |_| Ok(()))?;
        Ok(concepts)
    }

    fn step_generate_notes(
        &self,
        transcript: &Transcript,
        key_concepts: &[String],
        tracker: &mut ProgressTracker<'_>,
        warnings: &mut Vec<PipelineWarning>,
    ) -> Result<(), PipelineError> {
        let content = self.services.generator.notes(&transcript.full_text)?;
        let note = Note {
            content: take_generated(content, "notes", warnings),
            key_concepts: key_concepts.to_vec(),
        };

        let id = tracker.lecture_id().to_string();
        tracker.checkpoint(Checkpoint::NotesSaved, |conn| {
            artifact_repo::replace_note(conn, &id, &note)
        })?;
        Ok(())
    }

    fn step_generate_flashcards(
        &self,
        transcript: &Transcript,
        tracker: &mut ProgressTracker<'_>,
        warnings: &mut Vec<PipelineWarning>,
    ) -> Result<(), PipelineError> {
        let cards = self
            .services
            .generator
            .flashcards(&transcript.full_text, self.config.flashcard_count)?;
        let cards = non_empty_or(
            take_generated(cards, "flashcards", warnings),
            placeholder_flashcards,
            "flashcards",
            warnings,
        );
        debug!("Generated {} flashcards", cards.len());

        let id = tracker.lecture_id().to_string();
        tracker.checkpoint(Checkpoint::FlashcardsSaved, |conn| {
            artifact_repo::replace_flashcards(conn, &id, &cards)
        })?;
        Ok(())
    }

    fn step_generate_mcqs(
        &self,
        transcript: &Transcript,
        tracker: &mut ProgressTracker<'_>,
        warnings: &mut Vec<PipelineWarning>,
    ) -> Result<(), PipelineError> {
        let mcqs = self
            .services
            .generator
            .mcqs(&transcript.full_text, self.config.mcq_count)?;
        let mcqs = non_empty_or(
            take_generated(mcqs, "mcqs", warnings),
            placeholder_mcqs,
            "mcqs",
            warnings,
        );
        debug!("Generated {} MCQs", mcqs.len());

        let id = tracker.lecture_id().to_string();
        tracker.checkpoint(Checkpoint::McqsSaved, |conn| {
            artifact_repo::replace_mcqs(conn, &id, &mcqs)
        })?;
        Ok(())
    }

    /// Lookup failures become a warning and an empty resource list. Only a
    /// failed checkpoint write stops the run.
    fn step_link_resources(
        &self,
        key_concepts: &[String],
        tracker: &mut ProgressTracker<'_>,
        warnings: &mut Vec<PipelineWarning>,
    ) -> Result<usize, PipelineError> {
        let resources = match self
            .services
            .resources
            .resources_for(key_concepts, self.config.max_resources)
        {
            Ok(resources) => resources,
            Err(e) => {
                warn!("Resource lookup failed (non-fatal): {}", e);
                warnings.push(PipelineWarning::ResourceLookupFailed {
                    error: e.to_string(),
                });
                Vec::new()
            }
        };

        let id = tracker.lecture_id().to_string();
        tracker.checkpoint(Checkpoint::ResourcesLinked, |conn| {
            artifact_repo::replace_resources(conn, &id, &resources)
        })?;
        Ok(resources.len())
    }

    fn handle_failure(
        &self,
        job: &PipelineJob,
        tracker: &mut ProgressTracker<'_>,
        err: PipelineError,
    ) -> RunOutcome {
        if err.is_stale() {
            info!("Dropping job: {}", err);
            return RunOutcome::Dropped {
                reason: err.to_string(),
            };
        }

        let message = err.to_string();
        match self.config.retry.decide(job.attempt) {
            RetryDecision::Retry { delay } => {
                warn!(
                    checkpoint = ?tracker.last(),
                    "Attempt {} failed, retrying in {:?}: {}",
                    job.attempt + 1,
                    delay,
                    message
                );
                RunOutcome::Retry {
                    job: job.next_attempt(),
                    delay,
                    error: message,
                }
            }
            RetryDecision::GiveUp => {
                let message = sanitize::truncate_message(&message, MAX_ERROR_MESSAGE_CHARS);
                error!(
                    "Giving up after {} attempts: {}",
                    job.attempt + 1,
                    message
                );
                match tracker.fail(&message) {
                    Ok(()) => RunOutcome::Failed { error: message },
                    Err(e) if e.is_stale() => RunOutcome::Dropped {
                        reason: e.to_string(),
                    },
                    Err(e) => {
                        error!("Could not mark lecture failed: {}", e);
                        RunOutcome::Failed { error: message }
                    }
                }
            }
        }
    }
}

/// Unwraps generator output, recording a warning for placeholders.
fn take_generated<T>(
    generated: Generated<T>,
    artifact: &'static str,
    warnings: &mut Vec<PipelineWarning>,
) -> T {
    if let Some(reason) = generated.fallback {
        warn!("Using placeholder {}: {}", artifact, reason);
        warnings.push(PipelineWarning::PlaceholderContent { artifact, reason });
    }
    generated.value
}

/// A completed lecture always has cards and questions; an empty list is
/// treated like unparseable output.
fn non_empty_or<T>(
    items: Vec<T>,
    placeholder: fn() -> Vec<T>,
    artifact: &'static str,
    warnings: &mut Vec<PipelineWarning>,
) -> Vec<T> {
    if !items.is_empty() {
        return items;
    }
    warn!("Generator returned no {}, using placeholder", artifact);
    warnings.push(PipelineWarning::PlaceholderContent {
        artifact,
        reason: format!("no {} generated", artifact),
    });
    placeholder()
}
