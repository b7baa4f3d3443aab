use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{text_enum, text_uuid};
use crate::db::DatabaseError;
use crate::models::enums::IntakeStatus;
use crate::models::Intake;
use crate::state;

const INTAKE_COLUMNS: &str = "id, patient_id, intake_link_id, demographics, chief_complaint, \
     medical_history, medications, allergies, created_at, status, reviewed_at";

pub fn insert_intake(conn: &Connection, intake: &Intake) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO intakes
         (id, patient_id, intake_link_id, demographics, chief_complaint,
          medical_history, medications, allergies, created_at, status, reviewed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            intake.id.to_string(),
            intake.patient_id.to_string(),
            intake.intake_link_id.to_string(),
            to_json("intake", &intake.id, &intake.demographics)?,
            intake.chief_complaint,
            to_json("intake", &intake.id, &intake.medical_history)?,
            to_json("intake", &intake.id, &intake.medications)?,
            to_json("intake", &intake.id, &intake.allergies)?,
            intake.created_at,
            intake.status.as_str(),
            intake.reviewed_at,
        ],
    )?;
    Ok(())
}

pub fn get_intake(conn: &Connection, id: &Uuid) -> Result<Option<Intake>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {INTAKE_COLUMNS} FROM intakes WHERE id = ?1"),
        params![id.to_string()],
        intake_from_row,
    )
    .optional()
    .map_err(DatabaseError::from)
}

/// Look up the intake a completed link produced. This is what makes
/// submission idempotent: a retried POST finds the existing row here.
pub fn get_intake_by_link(
    conn: &Connection,
    link_id: &Uuid,
) -> Result<Option<Intake>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {INTAKE_COLUMNS} FROM intakes WHERE intake_link_id = ?1"),
        params![link_id.to_string()],
        intake_from_row,
    )
    .optional()
    .map_err(DatabaseError::from)
}

/// CAS review transition, guarded by the central transition table.
/// Returns `true` if this call performed the transition.
pub fn transition_intake(
    conn: &Connection,
    id: &Uuid,
    to: IntakeStatus,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let from = state::intake_required_predecessor(to)
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;

    let reviewed_at = (to == IntakeStatus::Reviewed).then_some(now);
    let affected = conn.execute(
        "UPDATE intakes
         SET status = ?1, reviewed_at = COALESCE(?2, reviewed_at)
         WHERE id = ?3 AND status = ?4",
        params![to.as_str(), reviewed_at, id.to_string(), from.as_str()],
    )?;
    Ok(affected == 1)
}

fn to_json<T: serde::Serialize>(
    entity: &str,
    id: &Uuid,
    value: &T,
) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::MalformedPayload {
        entity_type: entity.to_string(),
        id: id.to_string(),
        reason: e.to_string(),
    })
}

fn from_json<T: serde::de::DeserializeOwned>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn intake_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Intake> {
    let id: String = row.get(0)?;
    let patient_id: String = row.get(1)?;
    let link_id: String = row.get(2)?;
    let demographics: String = row.get(3)?;
    let history: String = row.get(5)?;
    let medications: String = row.get(6)?;
    let allergies: String = row.get(7)?;
    let status: String = row.get(9)?;
    Ok(Intake {
        id: text_uuid(0, &id)?,
        patient_id: text_uuid(1, &patient_id)?,
        intake_link_id: text_uuid(2, &link_id)?,
        demographics: from_json(3, &demographics)?,
        chief_complaint: row.get(4)?,
        medical_history: from_json(5, &history)?,
        medications: from_json(6, &medications)?,
        allergies: from_json(7, &allergies)?,
        created_at: row.get(8)?,
        status: text_enum(9, &status)?,
        reviewed_at: row.get(10)?,
    })
}
