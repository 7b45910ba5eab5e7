//! End-to-end runs of the processing pipeline against scripted
//! collaborators.

mod common;

use std::sync::Arc;

use common::{documentation, FakeLookup, ScriptedModel, ScriptedTranscriber, TestHarness};
use lectureiq::db::{artifact_repo, lecture_repo, Database};
use lectureiq::lecture::Transcript;
use lectureiq::pipeline::{Checkpoint, Pipeline, PipelineWarning, ProgressReporter, RunOutcome};
use lectureiq::services::{LlmGenerator, ServiceError, Transcriber};
use lectureiq::PipelineJob;

const FULL_RUN: [u8; 9] = [5, 10, 40, 50, 65, 75, 85, 95, 100];

/// Runs a job and follows retries inline until a terminal outcome.
fn run_to_end(pipeline: &Pipeline, job: PipelineJob, progress: &dyn ProgressReporter) -> RunOutcome {
    let mut job = job;
    loop {
        match pipeline.run(&job, progress) {
            RunOutcome::Retry { job: next, .. } => job = next,
            outcome => return outcome,
        }
    }
}

#[test]
fn test_full_run_reaches_every_checkpoint_in_order() {
    let harness = TestHarness::new();
    let key = harness.write_audio("bst.mp3", b"ID3 audio");
    harness.insert_lecture("lec-1", &key);

    let lookup = Arc::new(FakeLookup::returning(vec![
        documentation("binary search tree", "https://example.org/bst"),
        documentation("recursion", "https://example.org/recursion"),
    ]));
    let pipeline = harness.pipeline(
        harness.local_locator(),
        Arc::new(ScriptedTranscriber::succeeding()),
        Arc::new(LlmGenerator::new(Arc::new(ScriptedModel::well_formed()))),
        lookup.clone(),
    );

    let outcome = pipeline.run(&PipelineJob::new("lec-1", 1), harness.progress.as_ref());
    match outcome {
        RunOutcome::Completed { warnings } => assert!(warnings.is_empty(), "{:?}", warnings),
        other => panic!("expected completion, got {:?}", other),
    }

    assert_eq!(harness.progress.progress_of("lec-1"), FULL_RUN);

    let row = harness.lecture("lec-1");
    assert_eq!(row.status, "completed");
    assert_eq!(row.progress, 100);
    assert_eq!(row.duration, Some(61));
    assert!(row.processed_at.is_some());
    assert!(row.error_message.is_none());

    let transcript = artifact_repo::transcript_for(&harness.db, "lec-1")
        .unwrap()
        .unwrap();
    assert_eq!(transcript.segments.len(), 2);

    let note = artifact_repo::note_for(&harness.db, "lec-1").unwrap().unwrap();
    assert!(note.content.starts_with("## Binary Search Trees"));
    assert_eq!(note.key_concepts, vec!["binary search tree", "recursion"]);

    let cards = artifact_repo::flashcards_for(&harness.db, "lec-1").unwrap();
    let questions: Vec<_> = cards.iter().map(|c| c.question.as_str()).collect();
    assert_eq!(questions, vec!["What is a BST?", "What is recursion?"]);

    let mcqs = artifact_repo::mcqs_for(&harness.db, "lec-1").unwrap();
    assert_eq!(mcqs.len(), 1);
    assert_eq!(mcqs[0].correct_index(), 1);

    let resources = artifact_repo::resources_for(&harness.db, "lec-1").unwrap();
    assert_eq!(resources.len(), 2);
    assert_eq!(resources[0].url, "https://example.org/bst");

    assert_eq!(
        lookup.topics_seen(),
        vec![vec!["binary search tree".to_string(), "recursion".to_string()]]
    );
}

#[test]
fn test_resource_lookup_failure_still_completes() {
    let harness = TestHarness::new();
    let key = harness.write_audio("bst.mp3", b"ID3 audio");
    harness.insert_lecture("lec-1", &key);

    let pipeline = harness.pipeline(
        harness.local_locator(),
        Arc::new(ScriptedTranscriber::succeeding()),
        Arc::new(LlmGenerator::new(Arc::new(ScriptedModel::well_formed()))),
        Arc::new(FakeLookup::failing()),
    );

    let outcome = pipeline.run(&PipelineJob::new("lec-1", 1), harness.progress.as_ref());
    let warnings = match outcome {
        RunOutcome::Completed { warnings } => warnings,
        other => panic!("expected completion, got {:?}", other),
    };
    assert_eq!(warnings.len(), 1);
    assert!(matches!(
        &warnings[0],
        PipelineWarning::ResourceLookupFailed { error } if error.contains("quota exceeded")
    ));

    assert_eq!(harness.progress.progress_of("lec-1"), FULL_RUN);
    assert!(harness.progress.failures_of("lec-1").is_empty());

    let row = harness.lecture("lec-1");
    assert_eq!(row.status, "completed");
    assert_eq!(row.progress, 100);
    assert!(artifact_repo::resources_for(&harness.db, "lec-1")
        .unwrap()
        .is_empty());
}

#[test]
fn test_transcription_failing_every_attempt_ends_failed_at_audio_ready() {
    let harness = TestHarness::new();
    let key = harness.write_audio("bst.mp3", b"ID3 audio");
    harness.insert_lecture("lec-1", &key);

    let transcriber = Arc::new(ScriptedTranscriber::always_failing());
    let pipeline = harness.default_pipeline(transcriber.clone());

    let outcome = run_to_end(&pipeline, PipelineJob::new("lec-1", 1), harness.progress.as_ref());
    let error = match outcome {
        RunOutcome::Failed { error } => error,
        other => panic!("expected failure, got {:?}", other),
    };
    assert!(error.contains("decoder crashed"));

    // First attempt plus three retries.
    assert_eq!(transcriber.calls(), 4);

    let row = harness.lecture("lec-1");
    assert_eq!(row.status, "failed");
    assert_eq!(row.progress, 10);
    let message = row.error_message.unwrap();
    assert!(!message.is_empty());
    assert!(message.chars().count() <= 500);

    assert_eq!(harness.progress.failures_of("lec-1").len(), 1);
    assert!(artifact_repo::transcript_for(&harness.db, "lec-1")
        .unwrap()
        .is_none());
}

#[test]
fn test_two_failures_then_success_completes() {
    let harness = TestHarness::new();
    let key = harness.write_audio("bst.mp3", b"ID3 audio");
    harness.insert_lecture("lec-1", &key);

    let transcriber = Arc::new(ScriptedTranscriber::failing(2));
    let pipeline = harness.default_pipeline(transcriber.clone());

    let first = pipeline.run(&PipelineJob::new("lec-1", 1), harness.progress.as_ref());
    let retry = match first {
        RunOutcome::Retry { job, delay, .. } => {
            assert_eq!(job.attempt, 1);
            assert!(!delay.is_zero());
            job
        }
        other => panic!("expected retry, got {:?}", other),
    };

    // A lecture waiting for its retry stays in processing.
    let waiting = harness.lecture("lec-1");
    assert_eq!(waiting.status, "processing");
    assert_eq!(waiting.progress, 10);

    let outcome = run_to_end(&pipeline, retry, harness.progress.as_ref());
    assert!(matches!(outcome, RunOutcome::Completed { .. }));
    assert_eq!(transcriber.calls(), 3);

    let row = harness.lecture("lec-1");
    assert_eq!(row.status, "completed");
    assert_eq!(row.progress, 100);
    assert!(row.error_message.is_none());
}

#[test]
fn test_progress_never_decreases_within_a_run() {
    let harness = TestHarness::new();
    let key = harness.write_audio("bst.mp3", b"ID3 audio");
    harness.insert_lecture("lec-1", &key);

    let pipeline = harness.default_pipeline(Arc::new(ScriptedTranscriber::failing(1)));
    let outcome = run_to_end(&pipeline, PipelineJob::new("lec-1", 1), harness.progress.as_ref());
    assert!(matches!(outcome, RunOutcome::Completed { .. }));

    // Each run starts over at `Started` and then only moves forward.
    let mut runs: Vec<Vec<Checkpoint>> = Vec::new();
    for checkpoint in harness.progress.checkpoints_of("lec-1") {
        if checkpoint == Checkpoint::Started {
            runs.push(Vec::new());
        }
        runs.last_mut().unwrap().push(checkpoint);
    }
    assert_eq!(runs.len(), 2);
    for run in &runs {
        assert!(run.windows(2).all(|pair| pair[0] < pair[1]), "{:?}", run);
    }
    assert_eq!(
        harness.progress.progress_of("lec-1"),
        [5, 10, 5, 10, 40, 50, 65, 75, 85, 95, 100]
    );
}

#[test]
fn test_three_option_mcq_falls_back_to_placeholder() {
    let harness = TestHarness::new();
    let key = harness.write_audio("bst.mp3", b"ID3 audio");
    harness.insert_lecture("lec-1", &key);

    let model = ScriptedModel::well_formed().with_mcqs(
        r#"[{"question": "Pick one", "options": ["a", "b", "c"], "correct_index": 0, "explanation": "a"}]"#,
    );
    let pipeline = harness.pipeline(
        harness.local_locator(),
        Arc::new(ScriptedTranscriber::succeeding()),
        Arc::new(LlmGenerator::new(Arc::new(model))),
        Arc::new(FakeLookup::returning(vec![])),
    );

    let outcome = pipeline.run(&PipelineJob::new("lec-1", 1), harness.progress.as_ref());
    let warnings = match outcome {
        RunOutcome::Completed { warnings } => warnings,
        other => panic!("expected completion, got {:?}", other),
    };
    assert!(warnings.iter().any(|w| matches!(
        w,
        PipelineWarning::PlaceholderContent { artifact: "mcqs", .. }
    )));

    assert!(harness.progress.progress_of("lec-1").contains(&85));
    assert_eq!(harness.lecture("lec-1").status, "completed");

    let mcqs = artifact_repo::mcqs_for(&harness.db, "lec-1").unwrap();
    assert_eq!(mcqs.len(), 1);
    assert_eq!(mcqs[0].options.len(), 4);
    assert_eq!(mcqs[0].correct_index(), 3);
}

#[test]
fn test_unreachable_model_fails_after_transcription() {
    let harness = TestHarness::new();
    let key = harness.write_audio("bst.mp3", b"ID3 audio");
    harness.insert_lecture("lec-1", &key);

    let pipeline = harness.pipeline(
        harness.local_locator(),
        Arc::new(ScriptedTranscriber::succeeding()),
        Arc::new(LlmGenerator::new(Arc::new(ScriptedModel::unreachable()))),
        Arc::new(FakeLookup::returning(vec![])),
    );

    let outcome = run_to_end(&pipeline, PipelineJob::new("lec-1", 1), harness.progress.as_ref());
    assert!(matches!(outcome, RunOutcome::Failed { .. }));

    let row = harness.lecture("lec-1");
    assert_eq!(row.status, "failed");
    assert_eq!(row.progress, 40);
    assert!(row.error_message.unwrap().contains("connection refused"));
    // The transcript from the last attempt is kept.
    assert!(artifact_repo::transcript_for(&harness.db, "lec-1")
        .unwrap()
        .is_some());
}

#[test]
fn test_job_for_older_generation_is_dropped_without_writes() {
    let harness = TestHarness::new();
    let key = harness.write_audio("bst.mp3", b"ID3 audio");
    harness.insert_lecture("lec-1", &key);
    lecture_repo::bump_generation(&harness.db, "lec-1").unwrap();

    let transcriber = Arc::new(ScriptedTranscriber::succeeding());
    let pipeline = harness.default_pipeline(transcriber.clone());

    let outcome = pipeline.run(&PipelineJob::new("lec-1", 1), harness.progress.as_ref());
    assert!(matches!(outcome, RunOutcome::Dropped { .. }));
    assert_eq!(transcriber.calls(), 0);
    assert!(harness.progress.events().is_empty());

    let row = harness.lecture("lec-1");
    assert_eq!(row.status, "uploading");
    assert_eq!(row.generation, 2);
}

/// Bumps the lecture's generation while "transcribing", as a reprocess
/// request arriving mid-run would.
struct ReprocessDuringTranscription {
    db: Database,
    lecture_id: String,
}

impl Transcriber for ReprocessDuringTranscription {
    fn transcribe(
        &self,
        _audio: &std::path::Path,
        _model_hint: &str,
    ) -> Result<Transcript, ServiceError> {
        lecture_repo::bump_generation(&self.db, &self.lecture_id)
            .map_err(|e| ServiceError::Transcription(e.to_string()))?;
        Ok(common::sample_transcript())
    }
}

#[test]
fn test_run_superseded_mid_flight_stops_at_next_checkpoint() {
    let harness = TestHarness::new();
    let key = harness.write_audio("bst.mp3", b"ID3 audio");
    harness.insert_lecture("lec-1", &key);

    let pipeline = harness.default_pipeline(Arc::new(ReprocessDuringTranscription {
        db: harness.db.clone(),
        lecture_id: "lec-1".to_string(),
    }));

    let outcome = pipeline.run(&PipelineJob::new("lec-1", 1), harness.progress.as_ref());
    assert!(matches!(outcome, RunOutcome::Dropped { .. }));

    assert_eq!(harness.progress.progress_of("lec-1"), [5, 10]);

    let row = harness.lecture("lec-1");
    assert_eq!(row.generation, 2);
    assert_eq!(row.status, "uploading");
    assert_eq!(row.progress, 0);
    assert!(artifact_repo::transcript_for(&harness.db, "lec-1")
        .unwrap()
        .is_none());
}

#[test]
fn test_deleted_lecture_job_is_dropped() {
    let harness = TestHarness::new();
    let pipeline = harness.default_pipeline(Arc::new(ScriptedTranscriber::succeeding()));

    let outcome = pipeline.run(&PipelineJob::new("gone", 1), harness.progress.as_ref());
    assert!(matches!(outcome, RunOutcome::Dropped { .. }));
}
