use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;

/// A generation lease: at most one summary generation in flight per
/// intake. Expired leases are reclaimable so a crashed holder cannot
/// block regeneration forever.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryLease {
    pub intake_id: Uuid,
    pub holder: String,
    pub expires_at: DateTime<Utc>,
}

/// Try to take the lease. Sweeps any expired lease first, then relies
/// on the primary key so exactly one concurrent caller succeeds.
pub fn acquire_lease(
    conn: &Connection,
    intake_id: &Uuid,
    holder: &str,
    ttl_secs: i64,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    conn.execute(
        "DELETE FROM summary_leases WHERE intake_id = ?1 AND expires_at <= ?2",
        params![intake_id.to_string(), now],
    )?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO summary_leases (intake_id, holder, expires_at)
         VALUES (?1, ?2, ?3)",
        params![
            intake_id.to_string(),
            holder,
            now + Duration::seconds(ttl_secs)
        ],
    )?;
    Ok(inserted == 1)
}

/// Release a lease, but only if we still hold it. A lease that expired
/// and was reclaimed by someone else must not be released out from
/// under the new holder.
pub fn release_lease(
    conn: &Connection,
    intake_id: &Uuid,
    holder: &str,
) -> Result<bool, DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM summary_leases WHERE intake_id = ?1 AND holder = ?2",
        params![intake_id.to_string(), holder],
    )?;
    Ok(affected == 1)
}

pub fn current_lease(
    conn: &Connection,
    intake_id: &Uuid,
) -> Result<Option<SummaryLease>, DatabaseError> {
    conn.query_row(
        "SELECT intake_id, holder, expires_at FROM summary_leases WHERE intake_id = ?1",
        params![intake_id.to_string()],
        |row| {
            let raw: String = row.get(0)?;
            Ok(SummaryLease {
                intake_id: super::text_uuid(0, &raw)?,
                holder: row.get(1)?,
                expires_at: row.get(2)?,
            })
        },
    )
    .optional()
    .map_err(DatabaseError::from)
}
