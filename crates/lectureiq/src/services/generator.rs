//! Study-material generation on top of a [`LanguageModel`].
//!
//! The model is asked for JSON; whatever comes back is parsed leniently and
//! validated item by item. When nothing usable survives, the caller gets a
//! clearly marked placeholder instead of an error so the lecture can still
//! complete. A backend that cannot be reached is an error.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;

use crate::lecture::artifacts::{Flashcard, Mcq};
use crate::sanitize::clip_chars;
use crate::services::llm::{CompletionRequest, LanguageModel};
use crate::services::ServiceError;

const NOTES_INPUT_CHARS: usize = 8000;
const CARDS_INPUT_CHARS: usize = 6000;
const CONCEPTS_INPUT_CHARS: usize = 3000;

pub const MAX_FLASHCARDS: usize = 15;
pub const MAX_MCQS: usize = 10;
pub const MAX_CONCEPTS: usize = 8;

static RE_JSON_ARRAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\[.*\]").unwrap());
static RE_JSON_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Generator output, flagged when it is a placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated<T> {
    pub value: T,
    /// Why the placeholder was used, if it was.
    pub fallback: Option<String>,
}

impl<T> Generated<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            fallback: None,
        }
    }

    pub fn placeholder(value: T, reason: impl Into<String>) -> Self {
        Self {
            value,
            fallback: Some(reason.into()),
        }
    }
}

pub trait ContentGenerator: Send + Sync {
    /// Markdown study notes.
    fn notes(&self, transcript: &str) -> Result<Generated<String>, ServiceError>;

    fn flashcards(
        &self,
        transcript: &str,
        count: usize,
    ) -> Result<Generated<Vec<Flashcard>>, ServiceError>;

    fn mcqs(&self, transcript: &str, count: usize) -> Result<Generated<Vec<Mcq>>, ServiceError>;

    /// Short searchable topics, most important first.
    fn key_concepts(&self, transcript: &str) -> Result<Generated<Vec<String>>, ServiceError>;
}

pub fn placeholder_notes() -> String {
    "# Lecture Notes\n\n\
     > ⚠️ Notes could not be generated automatically. \
     Please re-process this lecture.\n"
        .to_string()
}

pub fn placeholder_flashcards() -> Vec<Flashcard> {
    vec![Flashcard {
        question: "Flashcard generation failed.".to_string(),
        answer: "Please re-process this lecture.".to_string(),
    }]
}

pub fn placeholder_mcqs() -> Vec<Mcq> {
    let options = ["Re-process", "Contact support", "Try again", "All of the above"]
        .map(String::from);
    vec![Mcq::last_option_correct(
        "MCQ generation failed for this lecture.".to_string(),
        options,
        "MCQ generation failed. Please try re-processing this lecture.".to_string(),
    )]
}

/// Returns the first JSON array in `text`, else the first object, else the
/// text itself.
pub fn extract_json(text: &str) -> &str {
    RE_JSON_ARRAY
        .find(text)
        .or_else(|| RE_JSON_OBJECT.find(text))
        .map(|m| m.as_str())
        .unwrap_or(text)
}

fn parse_array(raw: &str) -> Result<Vec<Value>, String> {
    match serde_json::from_str::<Value>(extract_json(raw)) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(_) => Err("model output was not a JSON array".to_string()),
        Err(e) => Err(format!("model output was not valid JSON: {}", e)),
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    let text = value?.as_str()?.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

pub fn parse_flashcards(raw: &str) -> Result<Vec<Flashcard>, String> {
    let cards: Vec<Flashcard> = parse_array(raw)?
        .iter()
        .filter_map(|item| {
            Some(Flashcard {
                question: non_empty_str(item.get("question"))?,
                answer: non_empty_str(item.get("answer"))?,
            })
        })
        .take(MAX_FLASHCARDS)
        .collect();

    if cards.is_empty() {
        return Err("no valid flashcards in model output".to_string());
    }
    Ok(cards)
}

fn parse_mcq(item: &Value) -> Option<Mcq> {
    let question = non_empty_str(item.get("question"))?;
    let explanation = non_empty_str(item.get("explanation"))?;
    let options: [String; 4] = item
        .get("options")?
        .as_array()?
        .iter()
        .map(value_to_text)
        .collect::<Vec<_>>()
        .try_into()
        .ok()?;
    let correct_index = u8::try_from(item.get("correct_index")?.as_u64()?).ok()?;

    Mcq::new(question, options, correct_index, explanation).ok()
}

pub fn parse_mcqs(raw: &str) -> Result<Vec<Mcq>, String> {
    let mcqs: Vec<Mcq> = parse_array(raw)?
        .iter()
        .filter_map(parse_mcq)
        .take(MAX_MCQS)
        .collect();

    if mcqs.is_empty() {
        return Err("no valid MCQs in model output".to_string());
    }
    Ok(mcqs)
}

pub fn parse_concepts(raw: &str) -> Result<Vec<String>, String> {
    Ok(parse_array(raw)?
        .iter()
        .filter(|v| !v.is_null())
        .map(value_to_text)
        .filter(|c| !c.is_empty())
        .take(MAX_CONCEPTS)
        .collect())
}

/// [`ContentGenerator`] backed by a chat-completion model.
pub struct LlmGenerator {
    model: Arc<dyn LanguageModel>,
}

impl LlmGenerator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    fn ask(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String, ServiceError> {
        self.model.complete(&CompletionRequest {
            prompt,
            max_tokens,
            temperature,
        })
    }
}

impl ContentGenerator for LlmGenerator {
    fn notes(&self, transcript: &str) -> Result<Generated<String>, ServiceError> {
        let prompt = format!(
            "You are an expert academic note-taker for college students.\n\n\
             Given the lecture transcript below, write comprehensive, well-structured study notes in Markdown.\n\n\
             Requirements:\n\
             - Use clear hierarchical headers (##, ###)\n\
             - Bullet points for key concepts and sub-points\n\
             - Bold (**text**) for definitions and important terms\n\
             - Format math expressions in LaTeX: inline $x^2$ or block $$E=mc^2$$\n\
             - Code snippets in fenced code blocks with language tag\n\
             - Keep the logical flow of the original lecture\n\
             - Be thorough but concise; a student should be able to revise from these notes alone\n\n\
             TRANSCRIPT:\n{}\n\n---\nGenerate Markdown notes now:",
            clip_chars(transcript, NOTES_INPUT_CHARS)
        );

        let content = self.ask(&prompt, 4000, 0.2)?;
        if content.trim().is_empty() {
            tracing::warn!("Model returned empty notes; using placeholder");
            return Ok(Generated::placeholder(
                placeholder_notes(),
                "model returned empty notes",
            ));
        }
        Ok(Generated::ok(content))
    }

    fn flashcards(
        &self,
        transcript: &str,
        count: usize,
    ) -> Result<Generated<Vec<Flashcard>>, ServiceError> {
        let prompt = format!(
            "You are an expert educator creating study flashcards for college students.\n\n\
             Based on the lecture transcript below, create exactly {count} high-quality flashcards.\n\n\
             Rules:\n\
             - Cover key definitions, theorems, formulas, concepts, and important facts\n\
             - Questions must be clear and specific\n\
             - Answers should be concise but complete (2-4 sentences)\n\
             - Vary question types: \"What is...\", \"How does...\", \"Why...\", \"Compare...\", \"Define...\"\n\n\
             Return ONLY a valid JSON array, no markdown, no extra text:\n\
             [\n  {{\"question\": \"...\", \"answer\": \"...\"}}\n]\n\n\
             TRANSCRIPT:\n{transcript}\n\n\
             JSON array ({count} flashcards):",
            count = count,
            transcript = clip_chars(transcript, CARDS_INPUT_CHARS)
        );

        let raw = self.ask(&prompt, 3000, 0.4)?;
        Ok(match parse_flashcards(&raw) {
            Ok(cards) => Generated::ok(cards),
            Err(reason) => {
                tracing::warn!(%reason, "Flashcard parsing failed; using placeholder");
                Generated::placeholder(placeholder_flashcards(), reason)
            }
        })
    }

    fn mcqs(&self, transcript: &str, count: usize) -> Result<Generated<Vec<Mcq>>, ServiceError> {
        let prompt = format!(
            "You are an expert exam question writer for college students.\n\n\
             Based on the lecture transcript below, create exactly {count} multiple-choice questions (MCQs).\n\n\
             Rules:\n\
             - Test conceptual understanding, not just memorization\n\
             - Exactly 4 options (index 0-3), exactly one correct answer\n\
             - Distractors should be plausible but clearly wrong on reflection\n\
             - Include a detailed explanation (2-3 sentences) for the correct answer\n\
             - Mix easy, medium, and hard questions\n\n\
             Return ONLY a valid JSON array, no markdown, no extra text:\n\
             [\n  {{\n    \"question\": \"...\",\n    \"options\": [\"option A\", \"option B\", \"option C\", \"option D\"],\n    \
             \"correct_index\": 1,\n    \"explanation\": \"...\"\n  }}\n]\n\n\
             TRANSCRIPT:\n{transcript}\n\n\
             JSON array ({count} MCQs):",
            count = count,
            transcript = clip_chars(transcript, CARDS_INPUT_CHARS)
        );

        let raw = self.ask(&prompt, 3000, 0.4)?;
        Ok(match parse_mcqs(&raw) {
            Ok(mcqs) => Generated::ok(mcqs),
            Err(reason) => {
                tracing::warn!(%reason, "MCQ parsing failed; using placeholder");
                Generated::placeholder(placeholder_mcqs(), reason)
            }
        })
    }

    fn key_concepts(&self, transcript: &str) -> Result<Generated<Vec<String>>, ServiceError> {
        let prompt = format!(
            "Extract the 5-8 most important, specific, searchable topics from this lecture transcript.\n\n\
             Rules:\n\
             - Return a JSON array of short strings (2-5 words each)\n\
             - Be specific: \"binary search tree\" not \"trees\"\n\
             - Focus on things a student would search for to learn more\n\
             - Avoid generic terms like \"introduction\" or \"overview\"\n\n\
             TRANSCRIPT:\n{}\n\n\
             Return ONLY a JSON array:",
            clip_chars(transcript, CONCEPTS_INPUT_CHARS)
        );

        let raw = self.ask(&prompt, 400, 0.2)?;
        Ok(match parse_concepts(&raw) {
            Ok(concepts) => Generated::ok(concepts),
            Err(reason) => {
                tracing::warn!(%reason, "Concept extraction failed; continuing without concepts");
                Generated::placeholder(Vec::new(), reason)
            }
        })
    }
}
