//! DOB identity gate for intake links.
//!
//! A link flagged `requires_dob_verification` grants form access only
//! after the patient's date of birth is matched. Failed attempts are
//! counted atomically; hitting the ceiling force-expires the link.
//! The caller never learns how many attempts remain.

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::db::repository;
use crate::db::DatabaseError;
use crate::links::{self, LinkError};
use crate::models::enums::LinkStatus;
use crate::models::IntakeLink;

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error(transparent)]
    Link(#[from] LinkError),

    /// DOB mismatch, or the link reached a terminal state mid-attempt.
    /// Deliberately carries no attempt count.
    #[error("Identity verification failed")]
    Failed,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Attempt the DOB challenge for the link behind `token`.
///
/// Success marks the link verified for its remaining TTL; there is no
/// re-challenge on later requests. A mismatch bumps the attempt counter,
/// and the attempt that reaches the ceiling expires the link in the same
/// pass, so the next presentation of the token reads as expired.
pub fn verify_identity(
    conn: &Connection,
    cfg: &PipelineConfig,
    token: &str,
    submitted_dob: NaiveDate,
) -> Result<IntakeLink, VerificationError> {
    let link = links::validate_token(conn, token)?;

    if !link.requires_dob_verification || link.dob_verified_at.is_some() {
        return Ok(link);
    }

    let patient = repository::get_patient(conn, &link.patient_id)?.ok_or_else(|| {
        DatabaseError::NotFound {
            entity_type: "patient".into(),
            id: link.patient_id.to_string(),
        }
    })?;

    let now = Utc::now();
    if submitted_dob == patient.date_of_birth {
        repository::mark_dob_verified(conn, &link.id, now)?;
        tracing::info!(link_id = %link.id, "DOB verification passed");
        return repository::get_link(conn, &link.id)?
            .ok_or_else(|| {
                DatabaseError::NotFound {
                    entity_type: "intake_link".into(),
                    id: link.id.to_string(),
                }
                .into()
            });
    }

    // Atomic bump; None means the link went terminal under us.
    let attempts = match repository::increment_verification_attempts(conn, &link.id)? {
        Some(n) => n,
        None => return Err(VerificationError::Failed),
    };

    if attempts >= cfg.max_verification_attempts {
        let expired = repository::transition_link(conn, &link.id, LinkStatus::Expired, now)?;
        if expired {
            tracing::warn!(link_id = %link.id, "Verification lockout, link expired");
        }
    } else {
        tracing::info!(link_id = %link.id, "DOB verification mismatch");
    }

    Err(VerificationError::Failed)
}
