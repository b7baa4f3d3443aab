use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{text_enum, text_uuid};
use crate::db::DatabaseError;
use crate::models::enums::LinkStatus;
use crate::models::IntakeLink;
use crate::state;

const LINK_COLUMNS: &str = "id, patient_id, token_salt, token_hash, created_at, expires_at, \
     used_at, requires_dob_verification, dob_verified_at, verification_attempts, status";

pub fn insert_link(conn: &Connection, link: &IntakeLink) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO intake_links
         (id, patient_id, token_salt, token_hash, created_at, expires_at,
          used_at, requires_dob_verification, dob_verified_at, verification_attempts, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            link.id.to_string(),
            link.patient_id.to_string(),
            link.token_salt,
            link.token_hash,
            link.created_at,
            link.expires_at,
            link.used_at,
            link.requires_dob_verification,
            link.dob_verified_at,
            link.verification_attempts,
            link.status.as_str(),
        ],
    )?;
    Ok(())
}

pub fn get_link(conn: &Connection, id: &Uuid) -> Result<Option<IntakeLink>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {LINK_COLUMNS} FROM intake_links WHERE id = ?1"),
        params![id.to_string()],
        link_from_row,
    )
    .optional()
    .map_err(DatabaseError::from)
}

/// Every link, terminal ones included. Token validation scans these
/// because the per-link salt makes the stored hash unaddressable by
/// token alone, and a terminal match still matters (it distinguishes
/// an already-used link from an unknown token).
pub fn list_links(conn: &Connection) -> Result<Vec<IntakeLink>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("SELECT {LINK_COLUMNS} FROM intake_links"))?;
    let rows = stmt.query_map([], link_from_row)?;
    let mut links = Vec::new();
    for row in rows {
        links.push(row?);
    }
    Ok(links)
}

/// Compare-and-set status transition. The WHERE guard comes from the
/// central transition table, so an illegal transition can never reach
/// the database. Returns `true` if this call won the transition.
pub fn transition_link(
    conn: &Connection,
    id: &Uuid,
    to: LinkStatus,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let from = state::link_required_predecessor(to)
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;

    let used_at = (to == LinkStatus::Completed).then_some(now);
    let affected = conn.execute(
        "UPDATE intake_links
         SET status = ?1, used_at = COALESCE(?2, used_at)
         WHERE id = ?3 AND status = ?4",
        params![to.as_str(), used_at, id.to_string(), from.as_str()],
    )?;
    Ok(affected == 1)
}

/// Record a passed DOB challenge. CAS on pending so a terminal link can
/// never become verified.
pub fn mark_dob_verified(
    conn: &Connection,
    id: &Uuid,
    at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let affected = conn.execute(
        "UPDATE intake_links
         SET dob_verified_at = ?1
         WHERE id = ?2 AND status = 'pending' AND dob_verified_at IS NULL",
        params![at, id.to_string()],
    )?;
    Ok(affected == 1)
}

/// Atomically bump the failed-verification counter and return the new
/// value. Single statement, so concurrent failures each observe a
/// distinct count and exactly one sees the lockout ceiling.
pub fn increment_verification_attempts(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<u32>, DatabaseError> {
    conn.query_row(
        "UPDATE intake_links
         SET verification_attempts = verification_attempts + 1
         WHERE id = ?1 AND status = 'pending'
         RETURNING verification_attempts",
        params![id.to_string()],
        |row| row.get::<_, u32>(0),
    )
    .optional()
    .map_err(DatabaseError::from)
}

fn link_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<IntakeLink> {
    let id: String = row.get(0)?;
    let patient_id: String = row.get(1)?;
    let status: String = row.get(10)?;
    Ok(IntakeLink {
        id: text_uuid(0, &id)?,
        patient_id: text_uuid(1, &patient_id)?,
        token_salt: row.get(2)?,
        token_hash: row.get(3)?,
        created_at: row.get(4)?,
        expires_at: row.get(5)?,
        used_at: row.get(6)?,
        requires_dob_verification: row.get(7)?,
        dob_verified_at: row.get(8)?,
        verification_attempts: row.get(9)?,
        status: text_enum(10, &status)?,
    })
}
