//! Intake link endpoints.
//!
//! - `POST /api/intake-links` (provider) — issue a link.
//! - `GET /api/intake-links/{token}` (public) — resolve a token.
//! - `POST /api/intake-links/{token}/verify` (public) — DOB challenge.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::links::{self, IssueRequest};
use crate::verification;

#[derive(Deserialize)]
pub struct IssueLinkBody {
    pub patient_id: Uuid,
    pub ttl_hours: i64,
    #[serde(default = "default_requires_dob")]
    pub requires_dob_verification: bool,
}

fn default_requires_dob() -> bool {
    true
}

#[derive(Serialize)]
pub struct IssuedLinkResponse {
    pub link_id: Uuid,
    /// The raw token. This is its only appearance; store it or lose it.
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub requires_dob_verification: bool,
}

/// `POST /api/intake-links`
pub async fn issue(
    State(ctx): State<ApiContext>,
    Json(body): Json<IssueLinkBody>,
) -> Result<(StatusCode, Json<IssuedLinkResponse>), ApiError> {
    let conn = ctx
        .db
        .lock()
        .map_err(|_| ApiError::Internal("lock poisoned".into()))?;
    let issued = links::issue_link(
        &conn,
        &ctx.cfg,
        &IssueRequest {
            patient_id: body.patient_id,
            ttl_hours: body.ttl_hours,
            requires_dob_verification: body.requires_dob_verification,
        },
    )?;

    Ok((
        StatusCode::CREATED,
        Json(IssuedLinkResponse {
            link_id: issued.link.id,
            token: issued.token,
            expires_at: issued.link.expires_at,
            requires_dob_verification: issued.link.requires_dob_verification,
        }),
    ))
}

#[derive(Serialize)]
pub struct LinkStatusResponse {
    pub requires_dob_verification: bool,
    pub dob_verified: bool,
    /// Whether the intake form may be submitted right now.
    pub access_granted: bool,
    pub expires_at: DateTime<Utc>,
}

/// `GET /api/intake-links/{token}`
pub async fn resolve(
    State(ctx): State<ApiContext>,
    Path(token): Path<String>,
) -> Result<Json<LinkStatusResponse>, ApiError> {
    let conn = ctx
        .db
        .lock()
        .map_err(|_| ApiError::Internal("lock poisoned".into()))?;
    let link = links::validate_token(&conn, &token)?;

    Ok(Json(LinkStatusResponse {
        requires_dob_verification: link.requires_dob_verification,
        dob_verified: link.dob_verified_at.is_some(),
        access_granted: link.access_granted(Utc::now()),
        expires_at: link.expires_at,
    }))
}

#[derive(Deserialize)]
pub struct VerifyBody {
    pub date_of_birth: NaiveDate,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    pub verified: bool,
}

/// `POST /api/intake-links/{token}/verify`
pub async fn verify(
    State(ctx): State<ApiContext>,
    Path(token): Path<String>,
    Json(body): Json<VerifyBody>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let conn = ctx
        .db
        .lock()
        .map_err(|_| ApiError::Internal("lock poisoned".into()))?;
    verification::verify_identity(&conn, &ctx.cfg, &token, body.date_of_birth)?;
    Ok(Json(VerifyResponse { verified: true }))
}
