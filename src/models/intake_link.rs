use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::LinkStatus;

/// A single-use, time-bounded intake link.
///
/// The raw token is returned to the issuer exactly once and never stored;
/// only `token_salt` + `token_hash` (SHA-256 of salt ‖ token) persist.
/// Status moves one way: pending → completed, or pending → expired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeLink {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// Per-link random salt, base64url.
    pub token_salt: String,
    /// Salted token hash, base64url. Unique across all links.
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Set when the link transitions to completed.
    pub used_at: Option<DateTime<Utc>>,
    pub requires_dob_verification: bool,
    /// Set once the DOB challenge has been passed; access then holds
    /// for the remaining TTL without re-challenge.
    pub dob_verified_at: Option<DateTime<Utc>>,
    pub verification_attempts: u32,
    pub status: LinkStatus,
}

impl IntakeLink {
    /// Whether the wall clock has passed this link's expiry.
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether form access is currently granted: pending, in TTL, and
    /// DOB-verified if the link demands it.
    pub fn access_granted(&self, now: DateTime<Utc>) -> bool {
        self.status == LinkStatus::Pending
            && !self.is_past_expiry(now)
            && (!self.requires_dob_verification || self.dob_verified_at.is_some())
    }
}

/// What the issuer hands back: the one-time raw token plus the stored row.
#[derive(Debug, Clone)]
pub struct IssuedLink {
    /// Opaque base64url token. Shown once, never persisted.
    pub token: String,
    pub link: IntakeLink,
}
