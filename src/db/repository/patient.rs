use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::Patient;

/// Insert a patient row. Patients are owned by the practice-management
/// collaborator; this exists for seeding and tests.
pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, name, date_of_birth, email, phone)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            patient.id.to_string(),
            patient.name,
            patient.date_of_birth.to_string(),
            patient.email,
            patient.phone,
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    conn.query_row(
        "SELECT id, name, date_of_birth, email, phone FROM patients WHERE id = ?1",
        params![id.to_string()],
        patient_from_row,
    )
    .optional()
    .map_err(DatabaseError::from)
}

fn patient_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Patient> {
    let id: String = row.get(0)?;
    let dob: String = row.get(2)?;
    Ok(Patient {
        id: super::text_uuid(0, &id)?,
        name: row.get(1)?,
        date_of_birth: NaiveDate::parse_from_str(&dob, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?,
        email: row.get(3)?,
        phone: row.get(4)?,
    })
}
