use std::path::Path;
use std::process::{Command, Output};

use serde::Deserialize;

use crate::config::TranscriptionConfig;
use crate::lecture::artifacts::{Segment, Transcript};
use crate::sanitize::redact_path;
use crate::services::ServiceError;

pub trait Transcriber: Send + Sync {
    /// Transcribes a local audio file. `model_hint` names the speech model
    /// size (`tiny`, `base`, ...); implementations may ignore it.
    fn transcribe(&self, audio: &Path, model_hint: &str) -> Result<Transcript, ServiceError>;
}

/// Runs the `whisper` CLI and reads back its JSON output.
pub struct WhisperCommand {
    command: String,
}

impl WhisperCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn from_config(config: &TranscriptionConfig) -> Self {
        Self::new(config.command.clone())
    }
}

fn format_command_error(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        format!(
            "whisper exited with code {}",
            output.status.code().unwrap_or(-1)
        )
    } else {
        // Whisper prints a full Python traceback; the last line carries the cause.
        stderr.lines().last().unwrap_or_default().to_string()
    }
}

impl Transcriber for WhisperCommand {
    fn transcribe(&self, audio: &Path, model_hint: &str) -> Result<Transcript, ServiceError> {
        if !audio.is_file() {
            return Err(ServiceError::AudioNotFound(audio.to_path_buf()));
        }

        let output_dir = tempfile::tempdir()
            .map_err(|e| ServiceError::Transcription(format!("temp dir: {}", e)))?;

        tracing::debug!(
            audio = %redact_path(audio),
            model = model_hint,
            "Running whisper"
        );

        let output = Command::new(&self.command)
            .arg(audio)
            .args(["--model", model_hint])
            .args(["--task", "transcribe"])
            .args(["--output_format", "json"])
            .arg("--output_dir")
            .arg(output_dir.path())
            .args(["--fp16", "False"])
            .args(["--verbose", "False"])
            .output()
            .map_err(|e| ServiceError::Transcription(format!("failed to run {}: {}", self.command, e)))?;

        if !output.status.success() {
            return Err(ServiceError::Transcription(format_command_error(&output)));
        }

        let stem = audio
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("audio");
        let json_path = output_dir.path().join(format!("{}.json", stem));
        let json = std::fs::read_to_string(&json_path).map_err(|e| {
            ServiceError::Transcription(format!("missing whisper output: {}", e))
        })?;

        let transcript = parse_whisper_json(&json)?;
        tracing::info!(
            segments = transcript.segments.len(),
            language = %transcript.language,
            "Transcription complete"
        );
        Ok(transcript)
    }
}

#[derive(Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

fn round_centis(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}

/// Parses whisper's JSON output format.
pub fn parse_whisper_json(json: &str) -> Result<Transcript, ServiceError> {
    let output: WhisperOutput = serde_json::from_str(json)
        .map_err(|e| ServiceError::Transcription(format!("unreadable whisper output: {}", e)))?;

    let segments: Vec<Segment> = output
        .segments
        .into_iter()
        .map(|s| Segment {
            start: round_centis(s.start),
            end: round_centis(s.end),
            text: s.text.trim().to_string(),
        })
        .collect();

    let mut full_text = output.text.trim().to_string();
    if full_text.is_empty() {
        full_text = segments
            .iter()
            .map(|s| s.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
    }

    Ok(Transcript {
        full_text,
        segments,
        language: output
            .language
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| "unknown".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whisper_json() {
        let json = r#"{
            "text": " Today we cover heaps. ",
            "segments": [
                {"id": 0, "start": 0.0, "end": 2.456, "text": " Today we cover", "tokens": [1, 2]},
                {"id": 1, "start": 2.456, "end": 4.0, "text": " heaps. "}
            ],
            "language": "en"
        }"#;

        let transcript = parse_whisper_json(json).unwrap();
        assert_eq!(transcript.full_text, "Today we cover heaps.");
        assert_eq!(transcript.language, "en");
        assert_eq!(transcript.segments.len(), 2);
        assert_eq!(transcript.segments[0].end, 2.46);
        assert_eq!(transcript.segments[1].text, "heaps.");
    }

    #[test]
    fn test_parse_without_language_or_text() {
        let json = r#"{"segments": [{"start": 0, "end": 1, "text": " hello "}, {"start": 1, "end": 2, "text": "world"}]}"#;
        let transcript = parse_whisper_json(json).unwrap();
        assert_eq!(transcript.language, "unknown");
        assert_eq!(transcript.full_text, "hello world");
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_whisper_json("not json"),
            Err(ServiceError::Transcription(_))
        ));
    }

    #[test]
    fn test_missing_audio() {
        let whisper = WhisperCommand::new("whisper");
        let result = whisper.transcribe(Path::new("/nonexistent/lecture.mp3"), "base");
        assert!(matches!(result, Err(ServiceError::AudioNotFound(_))));
    }

    #[test]
    fn test_missing_binary() {
        let audio = tempfile::Builder::new().suffix(".mp3").tempfile().unwrap();
        let whisper = WhisperCommand::new("lectureiq-no-such-whisper-binary");
        let result = whisper.transcribe(audio.path(), "base");
        assert!(matches!(result, Err(ServiceError::Transcription(_))));
    }
}
