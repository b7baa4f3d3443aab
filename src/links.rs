//! Intake link issuance and token validation.
//!
//! A link token is 32 random bytes, base64url, shown to the issuer once
//! and never stored. We keep a per-link salt plus SHA-256(salt ‖ token),
//! so a database leak exposes no usable tokens. Validation scans
//! candidate rows and compares hashes in constant time.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::enums::LinkStatus;
use crate::models::{IntakeLink, IssuedLink, ValidationError};

const TOKEN_BYTES: usize = 32;
const SALT_BYTES: usize = 16;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Patient not found: {0}")]
    PatientNotFound(Uuid),

    /// Token matched nothing. Callers must present this identically to
    /// `Expired` and `AlreadyUsed`.
    #[error("No link matches the presented token")]
    NotFound,

    #[error("Link {link_id} is expired")]
    Expired { link_id: Uuid },

    /// The link already produced an intake. Carries the link id so
    /// ingestion can answer a retried submission with the existing row.
    #[error("Link {link_id} has already been used")]
    AlreadyUsed { link_id: Uuid },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Parameters for issuing a link.
#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub patient_id: Uuid,
    pub ttl_hours: i64,
    pub requires_dob_verification: bool,
}

/// Issue a fresh single-use link for a patient.
///
/// The returned [`IssuedLink`] carries the only copy of the raw token
/// that will ever exist.
pub fn issue_link(
    conn: &Connection,
    cfg: &PipelineConfig,
    req: &IssueRequest,
) -> Result<IssuedLink, LinkError> {
    if req.ttl_hours < cfg.ttl_min_hours || req.ttl_hours > cfg.ttl_max_hours {
        return Err(ValidationError::new(
            "ttl_hours",
            format!(
                "must be between {} and {} hours",
                cfg.ttl_min_hours, cfg.ttl_max_hours
            ),
        )
        .into());
    }

    if repository::get_patient(conn, &req.patient_id)?.is_none() {
        return Err(LinkError::PatientNotFound(req.patient_id));
    }

    let token = random_b64(TOKEN_BYTES);
    let salt = random_b64(SALT_BYTES);
    let now = Utc::now();

    let link = IntakeLink {
        id: Uuid::new_v4(),
        patient_id: req.patient_id,
        token_hash: hash_token(&salt, &token),
        token_salt: salt,
        created_at: now,
        expires_at: now + Duration::hours(req.ttl_hours),
        used_at: None,
        requires_dob_verification: req.requires_dob_verification,
        dob_verified_at: None,
        verification_attempts: 0,
        status: LinkStatus::Pending,
    };
    repository::insert_link(conn, &link)?;

    tracing::info!(link_id = %link.id, expires_at = %link.expires_at, "Issued intake link");
    Ok(IssuedLink { token, link })
}

/// Resolve a presented token to its link, enforcing single-use and TTL.
///
/// A pending link whose wall-clock expiry has passed is expired lazily
/// here, on first touch after the deadline. The three failure shapes
/// (`NotFound`, `Expired`, `AlreadyUsed`) exist for internal callers;
/// anything shown to the patient must not distinguish them.
pub fn validate_token(conn: &Connection, token: &str) -> Result<IntakeLink, LinkError> {
    let now = Utc::now();
    for link in repository::list_links(conn)? {
        let candidate = hash_token(&link.token_salt, token);
        if !bool::from(candidate.as_bytes().ct_eq(link.token_hash.as_bytes())) {
            continue;
        }
        return match link.status {
            LinkStatus::Completed => Err(LinkError::AlreadyUsed { link_id: link.id }),
            LinkStatus::Expired => Err(LinkError::Expired { link_id: link.id }),
            LinkStatus::Pending if link.is_past_expiry(now) => {
                repository::transition_link(conn, &link.id, LinkStatus::Expired, now)?;
                tracing::info!(link_id = %link.id, "Lazily expired intake link");
                Err(LinkError::Expired { link_id: link.id })
            }
            LinkStatus::Pending => Ok(link),
        };
    }
    Err(LinkError::NotFound)
}

/// SHA-256(salt ‖ token), base64url.
pub(crate) fn hash_token(salt: &str, token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(token.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

fn random_b64(len: usize) -> String {
    let mut buf = vec![0u8; len];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}
