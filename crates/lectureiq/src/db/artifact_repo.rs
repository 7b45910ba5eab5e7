//! Artifact repository: transcripts, notes, flashcards, MCQs and resources.
//!
//! Writers take a `&Connection` and replace the lecture's rows for that
//! artifact wholesale, so they compose into a checkpoint transaction and a
//! retried stage never leaves rows from an earlier attempt behind.

use rusqlite::{params, Connection, OptionalExtension};

use super::{Database, DatabaseError};
use crate::lecture::artifacts::{Flashcard, Mcq, Note, Resource, ResourceKind, Transcript};

pub fn replace_transcript(
    conn: &Connection,
    lecture_id: &str,
    transcript: &Transcript,
) -> Result<(), DatabaseError> {
    let segments = serde_json::to_string(&transcript.segments)?;
    conn.execute(
        "INSERT INTO transcripts (lecture_id, full_text, segments, language)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (lecture_id) DO UPDATE SET
            full_text = excluded.full_text,
            segments = excluded.segments,
            language = excluded.language",
        params![lecture_id, transcript.full_text, segments, transcript.language],
    )?;
    Ok(())
}

pub fn replace_note(conn: &Connection, lecture_id: &str, note: &Note) -> Result<(), DatabaseError> {
    let key_concepts = serde_json::to_string(&note.key_concepts)?;
    conn.execute(
        "INSERT INTO notes (lecture_id, content, key_concepts)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (lecture_id) DO UPDATE SET
            content = excluded.content,
            key_concepts = excluded.key_concepts",
        params![lecture_id, note.content, key_concepts],
    )?;
    Ok(())
}

pub fn replace_flashcards(
    conn: &Connection,
    lecture_id: &str,
    cards: &[Flashcard],
) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM flashcards WHERE lecture_id = ?1",
        params![lecture_id],
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO flashcards (lecture_id, position, question, answer) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (position, card) in cards.iter().enumerate() {
        stmt.execute(params![lecture_id, position as i64, card.question, card.answer])?;
    }
    Ok(())
}

pub fn replace_mcqs(conn: &Connection, lecture_id: &str, mcqs: &[Mcq]) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM mcqs WHERE lecture_id = ?1", params![lecture_id])?;
    let mut stmt = conn.prepare(
        "INSERT INTO mcqs (lecture_id, position, question, options, correct_index, explanation)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for (position, mcq) in mcqs.iter().enumerate() {
        let options = serde_json::to_string(&mcq.options)?;
        stmt.execute(params![
            lecture_id,
            position as i64,
            mcq.question,
            options,
            mcq.correct_index(),
            mcq.explanation,
        ])?;
    }
    Ok(())
}

pub fn replace_resources(
    conn: &Connection,
    lecture_id: &str,
    resources: &[Resource],
) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM resources WHERE lecture_id = ?1",
        params![lecture_id],
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO resources (lecture_id, position, kind, title, url, thumbnail_url, topic,
         relevance_score)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for (position, resource) in resources.iter().enumerate() {
        stmt.execute(params![
            lecture_id,
            position as i64,
            resource.kind.as_str(),
            resource.title,
            resource.url,
            resource.thumbnail_url,
            resource.topic,
            resource.relevance_score,
        ])?;
    }
    Ok(())
}

pub fn transcript_for(db: &Database, lecture_id: &str) -> Result<Option<Transcript>, DatabaseError> {
    db.with_conn(|conn| {
        let row: Option<(String, String, String)> = conn
            .query_row(
                "SELECT full_text, segments, language FROM transcripts WHERE lecture_id = ?1",
                params![lecture_id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?;

        row.map(|(full_text, segments, language)| -> Result<Transcript, DatabaseError> {
            Ok(Transcript {
                full_text,
                segments: serde_json::from_str(&segments)?,
                language,
            })
        })
        .transpose()
    })
}

pub fn note_for(db: &Database, lecture_id: &str) -> Result<Option<Note>, DatabaseError> {
    db.with_conn(|conn| {
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT content, key_concepts FROM notes WHERE lecture_id = ?1",
                params![lecture_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;

        row.map(|(content, key_concepts)| -> Result<Note, DatabaseError> {
            Ok(Note {
                content,
                key_concepts: serde_json::from_str(&key_concepts)?,
            })
        })
        .transpose()
    })
}

pub fn flashcards_for(db: &Database, lecture_id: &str) -> Result<Vec<Flashcard>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT question, answer FROM flashcards WHERE lecture_id = ?1 ORDER BY position",
        )?;
        let cards = stmt
            .query_map(params![lecture_id], |r| {
                Ok(Flashcard {
                    question: r.get(0)?,
                    answer: r.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cards)
    })
}

pub fn mcqs_for(db: &Database, lecture_id: &str) -> Result<Vec<Mcq>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT question, options, correct_index, explanation FROM mcqs
             WHERE lecture_id = ?1 ORDER BY position",
        )?;
        let rows = stmt
            .query_map(params![lecture_id], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, u8>(2)?,
                    r.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(question, options, correct_index, explanation)| -> Result<Mcq, DatabaseError> {
                let options: [String; 4] = serde_json::from_str(&options)?;
                Mcq::new(question, options, correct_index, explanation).map_err(|e| {
                    DatabaseError::CorruptRow {
                        table: "mcqs",
                        reason: e.to_string(),
                    }
                })
            })
            .collect()
    })
}

pub fn resources_for(db: &Database, lecture_id: &str) -> Result<Vec<Resource>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT kind, title, url, thumbnail_url, topic, relevance_score FROM resources
             WHERE lecture_id = ?1 ORDER BY position",
        )?;
        let rows = stmt
            .query_map(params![lecture_id], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, Option<String>>(3)?,
                    r.get::<_, Option<String>>(4)?,
                    r.get::<_, f64>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut resources = Vec::with_capacity(rows.len());
        for (kind, title, url, thumbnail_url, topic, relevance_score) in rows {
            let kind = kind
                .parse::<ResourceKind>()
                .map_err(|reason| DatabaseError::CorruptRow {
                    table: "resources",
                    reason,
                })?;
            resources.push(Resource {
                kind,
                title,
                url,
                thumbnail_url,
                topic,
                relevance_score,
            });
        }
        Ok(resources)
    })
}
