use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::text_uuid;
use crate::db::DatabaseError;
use crate::models::Summary;

pub fn insert_summary(conn: &Connection, summary: &Summary) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO summaries (id, intake_id, content, model_id, tokens_used, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            summary.id.to_string(),
            summary.intake_id.to_string(),
            summary.content,
            summary.model_id,
            summary.tokens_used,
            summary.created_at,
        ],
    )?;
    Ok(())
}

/// The most recent summary for an intake, if any. Regeneration appends
/// rather than overwrites, so history stays queryable.
pub fn get_latest_summary(
    conn: &Connection,
    intake_id: &Uuid,
) -> Result<Option<Summary>, DatabaseError> {
    conn.query_row(
        "SELECT id, intake_id, content, model_id, tokens_used, created_at
         FROM summaries
         WHERE intake_id = ?1
         ORDER BY created_at DESC, rowid DESC
         LIMIT 1",
        params![intake_id.to_string()],
        summary_from_row,
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn count_summaries(conn: &Connection, intake_id: &Uuid) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM summaries WHERE intake_id = ?1",
        params![intake_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn summary_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Summary> {
    let id: String = row.get(0)?;
    let intake_id: String = row.get(1)?;
    Ok(Summary {
        id: text_uuid(0, &id)?,
        intake_id: text_uuid(1, &intake_id)?,
        content: row.get(2)?,
        model_id: row.get(3)?,
        tokens_used: row.get(4)?,
        created_at: row.get(5)?,
    })
}
