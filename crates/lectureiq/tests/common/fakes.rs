//! Scripted stand-ins for the pipeline's external collaborators.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use lectureiq::lecture::{Resource, ResourceKind, Segment, Transcript};
use lectureiq::pipeline::{Checkpoint, ProgressEvent, ProgressReporter};
use lectureiq::services::{
    CompletionRequest, LanguageModel, ResourceLookup, ServiceError, Transcriber,
};
use lectureiq::storage::{ObjectStore, ObjectStoreError};

/// Transcriber that fails a fixed number of times before succeeding.
pub struct ScriptedTranscriber {
    failures_left: AtomicU32,
    calls: AtomicU32,
    /// Audio paths seen, with whether each existed when transcription ran.
    seen: Mutex<Vec<(PathBuf, bool)>>,
}

impl ScriptedTranscriber {
    pub fn succeeding() -> Self {
        Self::failing(0)
    }

    pub fn failing(times: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(times),
            calls: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn always_failing() -> Self {
        Self::failing(u32::MAX)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<(PathBuf, bool)> {
        self.seen.lock().unwrap().clone()
    }
}

impl Transcriber for ScriptedTranscriber {
    fn transcribe(&self, audio: &Path, _model_hint: &str) -> Result<Transcript, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((audio.to_path_buf(), audio.is_file()));

        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.failures_left.store(remaining - 1, Ordering::SeqCst);
            }
            return Err(ServiceError::Transcription(
                "decoder crashed on frame 12".to_string(),
            ));
        }

        Ok(sample_transcript())
    }
}

pub fn sample_transcript() -> Transcript {
    Transcript {
        full_text: "Today we cover binary search trees and recursion.".to_string(),
        segments: vec![
            Segment {
                start: 0.0,
                end: 4.5,
                text: "Today we cover binary search trees".to_string(),
            },
            Segment {
                start: 4.5,
                end: 61.2,
                text: "and recursion.".to_string(),
            },
        ],
        language: "en".to_string(),
    }
}

/// Language model that answers each kind of prompt with a canned reply.
pub struct ScriptedModel {
    pub notes: String,
    pub concepts: String,
    pub flashcards: String,
    pub mcqs: String,
    pub unreachable: bool,
}

impl ScriptedModel {
    pub fn well_formed() -> Self {
        Self {
            notes: "## Binary Search Trees\n\n- **BST**: ordered binary tree".to_string(),
            concepts: r#"["binary search tree", "recursion"]"#.to_string(),
            flashcards: r#"[
                {"question": "What is a BST?", "answer": "An ordered binary tree."},
                {"question": "What is recursion?", "answer": "A function calling itself."}
            ]"#
            .to_string(),
            mcqs: r#"[
                {
                    "question": "Lookup cost in a balanced BST?",
                    "options": ["O(1)", "O(log n)", "O(n)", "O(n log n)"],
                    "correct_index": 1,
                    "explanation": "Each comparison halves the search space."
                }
            ]"#
            .to_string(),
            unreachable: false,
        }
    }

    pub fn with_mcqs(mut self, raw: &str) -> Self {
        self.mcqs = raw.to_string();
        self
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::well_formed()
        }
    }
}

impl LanguageModel for ScriptedModel {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, ServiceError> {
        if self.unreachable {
            return Err(ServiceError::LanguageModel(
                "connection refused".to_string(),
            ));
        }

        let prompt = request.prompt;
        let reply = if prompt.contains("multiple-choice") {
            &self.mcqs
        } else if prompt.contains("flashcards") {
            &self.flashcards
        } else if prompt.contains("searchable topics") {
            &self.concepts
        } else {
            &self.notes
        };
        Ok(reply.clone())
    }
}

/// Resource lookup returning a fixed list, or failing outright.
pub struct FakeLookup {
    resources: Vec<Resource>,
    fail: bool,
    topics_seen: Mutex<Vec<Vec<String>>>,
}

impl FakeLookup {
    pub fn returning(resources: Vec<Resource>) -> Self {
        Self {
            resources,
            fail: false,
            topics_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            resources: Vec::new(),
            fail: true,
            topics_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn topics_seen(&self) -> Vec<Vec<String>> {
        self.topics_seen.lock().unwrap().clone()
    }
}

impl ResourceLookup for FakeLookup {
    fn resources_for(
        &self,
        topics: &[String],
        max_total: usize,
    ) -> Result<Vec<Resource>, ServiceError> {
        self.topics_seen.lock().unwrap().push(topics.to_vec());
        if self.fail {
            return Err(ServiceError::ResourceLookup(
                "quota exceeded".to_string(),
            ));
        }
        Ok(self.resources.iter().take(max_total).cloned().collect())
    }
}

pub fn documentation(topic: &str, url: &str) -> Resource {
    Resource {
        kind: ResourceKind::Documentation,
        title: format!("{topic} reference"),
        url: url.to_string(),
        thumbnail_url: None,
        topic: Some(topic.to_string()),
        relevance_score: 0.9,
    }
}

/// In-memory object store. Failing downloads write part of the object
/// before erroring so partial staging files can be observed.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_downloads: AtomicBool,
}

impl MemoryObjectStore {
    pub fn insert(&self, key: &str, body: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), body.to_vec());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn set_fail_downloads(&self, fail: bool) {
        self.fail_downloads.store(fail, Ordering::SeqCst);
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put_object(
        &self,
        key: &str,
        body: &[u8],
        _content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        self.insert(key, body);
        Ok(())
    }

    fn download_to(&self, key: &str, dest: &mut dyn Write) -> Result<u64, ObjectStoreError> {
        let body = self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or(ObjectStoreError::NotFound)?;

        if self.fail_downloads.load(Ordering::SeqCst) {
            dest.write_all(&body[..body.len() / 2])?;
            return Err(ObjectStoreError::Http("connection reset".to_string()));
        }

        dest.write_all(&body)?;
        Ok(body.len() as u64)
    }

    fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Records every progress event in order.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Progress percentages reported for one lecture, in order.
    pub fn progress_of(&self, lecture_id: &str) -> Vec<u8> {
        self.checkpoints_of(lecture_id)
            .into_iter()
            .map(Checkpoint::progress)
            .collect()
    }

    pub fn checkpoints_of(&self, lecture_id: &str) -> Vec<Checkpoint> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Checkpoint {
                    lecture_id: id,
                    checkpoint,
                } if id == lecture_id => Some(*checkpoint),
                _ => None,
            })
            .collect()
    }

    pub fn failures_of(&self, lecture_id: &str) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Failed {
                    lecture_id: id,
                    error,
                } if id == lecture_id => Some(error.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}
