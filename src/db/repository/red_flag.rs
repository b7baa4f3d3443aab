use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{text_enum, text_uuid};
use crate::db::DatabaseError;
use crate::models::RedFlag;

pub fn insert_red_flag(conn: &Connection, flag: &RedFlag) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO red_flags
         (id, intake_id, category, description, severity, detected_at, acknowledged)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            flag.id.to_string(),
            flag.intake_id.to_string(),
            flag.category.as_str(),
            flag.description,
            flag.severity.as_str(),
            flag.detected_at,
            flag.acknowledged,
        ],
    )?;
    Ok(())
}

/// Flags for an intake, most severe first. The CASE ranking mirrors the
/// severity order of `FlagSeverity`; rowid breaks ties so the order is
/// stable across reads.
pub fn list_red_flags(conn: &Connection, intake_id: &Uuid) -> Result<Vec<RedFlag>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, intake_id, category, description, severity, detected_at, acknowledged
         FROM red_flags
         WHERE intake_id = ?1
         ORDER BY CASE severity
             WHEN 'critical' THEN 0
             WHEN 'high' THEN 1
             WHEN 'medium' THEN 2
             ELSE 3
         END, rowid",
    )?;
    let rows = stmt.query_map(params![intake_id.to_string()], flag_from_row)?;
    let mut flags = Vec::new();
    for row in rows {
        flags.push(row?);
    }
    Ok(flags)
}

pub fn acknowledge_red_flag(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let affected = conn.execute(
        "UPDATE red_flags SET acknowledged = 1 WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(affected == 1)
}

fn flag_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RedFlag> {
    let id: String = row.get(0)?;
    let intake_id: String = row.get(1)?;
    let category: String = row.get(2)?;
    let severity: String = row.get(4)?;
    Ok(RedFlag {
        id: text_uuid(0, &id)?,
        intake_id: text_uuid(1, &intake_id)?,
        category: text_enum(2, &category)?,
        description: row.get(3)?,
        severity: text_enum(4, &severity)?,
        detected_at: row.get(5)?,
        acknowledged: row.get(6)?,
    })
}
