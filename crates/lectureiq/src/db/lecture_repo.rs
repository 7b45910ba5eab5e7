//! Lecture repository: CRUD for the `lectures` table plus the
//! generation-guarded state writes used by the progress tracker.
//!
//! Guarded writes take a `&Connection` so they can run inside the
//! checkpoint transaction together with the stage's artifact rows, and
//! return the number of rows touched. Zero means the lecture vanished or
//! the caller's generation is stale; [`generation_of`] tells the two apart.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw lecture row from the database.
#[derive(Debug, Clone)]
pub struct LectureRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub storage_key: String,
    pub status: String,
    pub progress: i64,
    pub duration: Option<u32>,
    pub error_message: Option<String>,
    pub uploaded_at: String,
    pub processed_at: Option<String>,
    pub generation: u32,
}

impl LectureRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            title: row.get("title")?,
            storage_key: row.get("storage_key")?,
            status: row.get("status")?,
            progress: row.get("progress")?,
            duration: row.get("duration")?,
            error_message: row.get("error_message")?,
            uploaded_at: row.get("uploaded_at")?,
            processed_at: row.get("processed_at")?,
            generation: row.get("generation")?,
        })
    }
}

pub fn insert(db: &Database, lecture: &LectureRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO lectures (id, user_id, title, storage_key, status, progress, duration,
             error_message, uploaded_at, processed_at, generation)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                lecture.id,
                lecture.user_id,
                lecture.title,
                lecture.storage_key,
                lecture.status,
                lecture.progress,
                lecture.duration,
                lecture.error_message,
                lecture.uploaded_at,
                lecture.processed_at,
                lecture.generation,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<LectureRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM lectures WHERE id = ?1",
                params![id],
                LectureRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Finds a lecture only if it belongs to `user_id`.
pub fn find_owned(
    db: &Database,
    id: &str,
    user_id: &str,
) -> Result<Option<LectureRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM lectures WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                LectureRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Lists a user's lectures, newest first.
pub fn list_by_user(
    db: &Database,
    user_id: &str,
    limit: u32,
    offset: u32,
) -> Result<Vec<LectureRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM lectures WHERE user_id = ?1
             ORDER BY uploaded_at DESC, id DESC LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt
            .query_map(params![user_id, limit, offset], LectureRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Lectures that never reached a terminal state, oldest first.
pub fn find_unfinished(db: &Database) -> Result<Vec<LectureRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM lectures WHERE status IN ('uploading', 'processing')
             ORDER BY uploaded_at ASC",
        )?;
        let rows = stmt
            .query_map([], LectureRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Deletes a lecture; artifacts go with it through the foreign-key cascade.
pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let deleted = conn.execute("DELETE FROM lectures WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    })
}

/// Starts a new generation: the lecture goes back to the queued state and
/// any run still holding the old generation loses its write access.
/// Returns the new generation, or `None` if the lecture does not exist.
pub fn bump_generation(db: &Database, id: &str) -> Result<Option<u32>, DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        let updated = tx.execute(
            "UPDATE lectures SET generation = generation + 1, status = 'uploading',
             progress = 0, error_message = NULL, processed_at = NULL
             WHERE id = ?1",
            params![id],
        )?;
        if updated == 0 {
            return Ok(None);
        }
        let generation = generation_of(&tx, id)?;
        tx.commit()?;
        Ok(generation)
    })
}

pub fn generation_of(conn: &Connection, id: &str) -> Result<Option<u32>, DatabaseError> {
    let generation = conn
        .query_row(
            "SELECT generation FROM lectures WHERE id = ?1",
            params![id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(generation)
}

pub fn begin_run(
    conn: &Connection,
    id: &str,
    generation: u32,
    progress: u8,
) -> Result<usize, DatabaseError> {
    let updated = conn.execute(
        "UPDATE lectures SET status = 'processing', progress = ?3,
         error_message = NULL, processed_at = NULL
         WHERE id = ?1 AND generation = ?2",
        params![id, generation, progress],
    )?;
    Ok(updated)
}

pub fn set_progress(
    conn: &Connection,
    id: &str,
    generation: u32,
    progress: u8,
) -> Result<usize, DatabaseError> {
    let updated = conn.execute(
        "UPDATE lectures SET progress = ?3 WHERE id = ?1 AND generation = ?2",
        params![id, generation, progress],
    )?;
    Ok(updated)
}

pub fn set_duration(
    conn: &Connection,
    id: &str,
    generation: u32,
    duration: u32,
) -> Result<usize, DatabaseError> {
    let updated = conn.execute(
        "UPDATE lectures SET duration = ?3 WHERE id = ?1 AND generation = ?2",
        params![id, generation, duration],
    )?;
    Ok(updated)
}

pub fn mark_completed(
    conn: &Connection,
    id: &str,
    generation: u32,
    processed_at: &str,
) -> Result<usize, DatabaseError> {
    let updated = conn.execute(
        "UPDATE lectures SET status = 'completed', progress = 100, processed_at = ?3,
         error_message = NULL
         WHERE id = ?1 AND generation = ?2",
        params![id, generation, processed_at],
    )?;
    Ok(updated)
}

/// Marks the run failed. Progress keeps its last checkpoint.
pub fn mark_failed(
    conn: &Connection,
    id: &str,
    generation: u32,
    error_message: &str,
) -> Result<usize, DatabaseError> {
    let updated = conn.execute(
        "UPDATE lectures SET status = 'failed', error_message = ?3
         WHERE id = ?1 AND generation = ?2",
        params![id, generation, error_message],
    )?;
    Ok(updated)
}
