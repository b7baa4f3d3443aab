use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One AI-generated clinical narrative for an intake.
///
/// Append-only history: each successful generation inserts a new row and
/// the most recent row is "current". Failed generations persist nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub id: Uuid,
    pub intake_id: Uuid,
    pub content: String,
    pub model_id: String,
    pub tokens_used: u32,
    pub created_at: DateTime<Utc>,
}
