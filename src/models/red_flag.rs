use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{FlagCategory, FlagSeverity};

/// A detected clinical-signal finding attached to one intake.
///
/// Produced once per intake by the detection engine, deduplicated by
/// category. Never mutated afterwards except acknowledgment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedFlag {
    pub id: Uuid,
    pub intake_id: Uuid,
    pub category: FlagCategory,
    pub description: String,
    pub severity: FlagSeverity,
    pub detected_at: DateTime<Utc>,
    pub acknowledged: bool,
}
