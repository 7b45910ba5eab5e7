//! Study material derived from a lecture by the pipeline.
//!
//! Ordered collections (flashcards, MCQs, resources) carry no position of
//! their own: the slice order is the order, and the repository persists it
//! as an explicit `position` column.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One timed span of the transcript, in seconds from the start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    pub full_text: String,
    pub segments: Vec<Segment>,
    pub language: String,
}

impl Transcript {
    /// Duration in whole seconds, taken from the end of the last segment.
    pub fn duration_secs(&self) -> Option<u32> {
        let end = self.segments.last()?.end;
        if !end.is_finite() || end < 0.0 {
            return None;
        }
        Some(end.round().min(u32::MAX as f64) as u32)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    /// Markdown.
    pub content: String,
    pub key_concepts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("correct_index {0} is outside the four options")]
pub struct InvalidMcq(pub u8);

/// A four-option multiple-choice question whose answer index always points
/// at one of its own options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "McqRepr")]
pub struct Mcq {
    pub question: String,
    pub options: [String; 4],
    correct_index: u8,
    pub explanation: String,
}

#[derive(Deserialize)]
struct McqRepr {
    question: String,
    options: [String; 4],
    correct_index: u8,
    explanation: String,
}

impl TryFrom<McqRepr> for Mcq {
    type Error = InvalidMcq;

    fn try_from(repr: McqRepr) -> Result<Self, Self::Error> {
        Mcq::new(
            repr.question,
            repr.options,
            repr.correct_index,
            repr.explanation,
        )
    }
}

impl Mcq {
    /// A question whose last option is the correct one.
    pub(crate) fn last_option_correct(
        question: String,
        options: [String; 4],
        explanation: String,
    ) -> Self {
        Self {
            question,
            options,
            correct_index: 3,
            explanation,
        }
    }

    pub fn new(
        question: String,
        options: [String; 4],
        correct_index: u8,
        explanation: String,
    ) -> Result<Self, InvalidMcq> {
        if correct_index > 3 {
            return Err(InvalidMcq(correct_index));
        }
        Ok(Self {
            question,
            options,
            correct_index,
            explanation,
        })
    }

    pub fn correct_index(&self) -> u8 {
        self.correct_index
    }

    pub fn correct_option(&self) -> &str {
        &self.options[self.correct_index as usize]
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Youtube,
    Documentation,
    Practice,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Youtube => "youtube",
            ResourceKind::Documentation => "documentation",
            ResourceKind::Practice => "practice",
        }
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "youtube" => Ok(ResourceKind::Youtube),
            "documentation" => Ok(ResourceKind::Documentation),
            "practice" => Ok(ResourceKind::Practice),
            other => Err(format!("unknown resource kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    pub kind: ResourceKind,
    pub title: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub topic: Option<String>,
    pub relevance_score: f64,
}
