use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::IntakeStatus;
use super::ValidationError;

/// Bound on single-line fields (names, doses, allergy entries).
const MAX_SHORT_FIELD: usize = 200;
/// Bound on narrative fields (chief complaint, history entries).
const MAX_TEXT_FIELD: usize = 2_000;
/// Bound on list lengths (history/medications/allergies).
const MAX_LIST_ITEMS: usize = 50;

/// Patient-reported demographics, typed rather than a free-form blob
/// so the detection scanner and prompt builder see a fixed shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Demographics {
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub sex: Option<String>,
    pub phone: Option<String>,
}

/// One current medication as reported by the patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationEntry {
    pub name: String,
    pub dose: Option<String>,
    pub frequency: Option<String>,
}

/// One reported allergy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllergyEntry {
    pub substance: String,
    pub reaction: Option<String>,
}

/// The submission payload a patient posts against a link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakePayload {
    pub demographics: Demographics,
    pub chief_complaint: String,
    #[serde(default)]
    pub medical_history: Vec<String>,
    #[serde(default)]
    pub medications: Vec<MedicationEntry>,
    #[serde(default)]
    pub allergies: Vec<AllergyEntry>,
}

impl IntakePayload {
    /// Validate every field against its length bound. Returns the first
    /// violation so the caller gets a precise field path.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_short("demographics.full_name", &self.demographics.full_name)?;
        if let Some(sex) = &self.demographics.sex {
            bounded("demographics.sex", sex, MAX_SHORT_FIELD)?;
        }
        if let Some(phone) = &self.demographics.phone {
            bounded("demographics.phone", phone, MAX_SHORT_FIELD)?;
        }

        if self.chief_complaint.trim().is_empty() {
            return Err(ValidationError::new("chief_complaint", "must not be empty"));
        }
        bounded("chief_complaint", &self.chief_complaint, MAX_TEXT_FIELD)?;

        bounded_list("medical_history", self.medical_history.len())?;
        for (i, entry) in self.medical_history.iter().enumerate() {
            bounded(&format!("medical_history[{i}]"), entry, MAX_TEXT_FIELD)?;
        }

        bounded_list("medications", self.medications.len())?;
        for (i, med) in self.medications.iter().enumerate() {
            require_short(&format!("medications[{i}].name"), &med.name)?;
            if let Some(dose) = &med.dose {
                bounded(&format!("medications[{i}].dose"), dose, MAX_SHORT_FIELD)?;
            }
            if let Some(freq) = &med.frequency {
                bounded(&format!("medications[{i}].frequency"), freq, MAX_SHORT_FIELD)?;
            }
        }

        bounded_list("allergies", self.allergies.len())?;
        for (i, allergy) in self.allergies.iter().enumerate() {
            require_short(&format!("allergies[{i}].substance"), &allergy.substance)?;
            if let Some(reaction) = &allergy.reaction {
                bounded(&format!("allergies[{i}].reaction"), reaction, MAX_SHORT_FIELD)?;
            }
        }

        Ok(())
    }
}

fn require_short(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    bounded(field, value, MAX_SHORT_FIELD)
}

fn bounded(field: &str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::new(
            field,
            format!("exceeds maximum length of {max} characters"),
        ));
    }
    Ok(())
}

fn bounded_list(field: &str, len: usize) -> Result<(), ValidationError> {
    if len > MAX_LIST_ITEMS {
        return Err(ValidationError::new(
            field,
            format!("exceeds maximum of {MAX_LIST_ITEMS} entries"),
        ));
    }
    Ok(())
}

/// The persisted record of one patient submission. Created exactly once
/// per completed link; immutable afterwards except status/review fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intake {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub intake_link_id: Uuid,
    pub demographics: Demographics,
    pub chief_complaint: String,
    pub medical_history: Vec<String>,
    pub medications: Vec<MedicationEntry>,
    pub allergies: Vec<AllergyEntry>,
    pub created_at: DateTime<Utc>,
    pub status: IntakeStatus,
    pub reviewed_at: Option<DateTime<Utc>>,
}
