use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::lecture_repo::LectureRow;
use crate::db::DatabaseError;

/// Lifecycle of a lecture. Persisted lowercase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LectureStatus {
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl LectureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LectureStatus::Uploading => "uploading",
            LectureStatus::Processing => "processing",
            LectureStatus::Completed => "completed",
            LectureStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LectureStatus::Completed | LectureStatus::Failed)
    }
}

impl std::fmt::Display for LectureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LectureStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploading" => Ok(LectureStatus::Uploading),
            "processing" => Ok(LectureStatus::Processing),
            "completed" => Ok(LectureStatus::Completed),
            "failed" => Ok(LectureStatus::Failed),
            other => Err(format!("unknown lecture status '{}'", other)),
        }
    }
}

/// A lecture record: the unit of pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lecture {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub storage_key: String,
    pub status: LectureStatus,
    pub progress: u8,
    /// Whole seconds, known once transcription has finished.
    pub duration: Option<u32>,
    pub error_message: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    /// Run-generation token. Bumped on every reprocess.
    pub generation: u32,
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::CorruptRow {
            table: "lectures",
            reason: format!("bad timestamp '{}': {}", value, e),
        })
}

impl TryFrom<LectureRow> for Lecture {
    type Error = DatabaseError;

    fn try_from(row: LectureRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<LectureStatus>()
            .map_err(|reason| DatabaseError::CorruptRow {
                table: "lectures",
                reason,
            })?;
        let progress = u8::try_from(row.progress)
            .ok()
            .filter(|p| *p <= 100)
            .ok_or_else(|| DatabaseError::CorruptRow {
                table: "lectures",
                reason: format!("progress {} out of range", row.progress),
            })?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            storage_key: row.storage_key,
            status,
            progress,
            duration: row.duration,
            error_message: row.error_message,
            uploaded_at: parse_timestamp(&row.uploaded_at)?,
            processed_at: row
                .processed_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            generation: row.generation,
        })
    }
}

/// What a polling client sees while a lecture is being processed.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LectureStatusView {
    pub id: String,
    pub status: LectureStatus,
    pub progress: u8,
    pub error_message: Option<String>,
}

impl From<&Lecture> for LectureStatusView {
    fn from(lecture: &Lecture) -> Self {
        Self {
            id: lecture.id.clone(),
            status: lecture.status,
            progress: lecture.progress,
            error_message: lecture.error_message.clone(),
        }
    }
}
