//! Intake submission and review endpoints.
//!
//! - `POST /api/intake-links/{token}/submit` (public) — ingest payload.
//! - `POST /api/intakes/{id}/review` (provider) — mark reviewed.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository;
use crate::ingest;
use crate::models::enums::{FlagCategory, FlagSeverity, IntakeStatus};
use crate::models::IntakePayload;

#[derive(Serialize)]
pub struct FlagView {
    pub category: FlagCategory,
    pub severity: FlagSeverity,
    pub description: String,
}

#[derive(Serialize)]
pub struct SubmissionResponse {
    pub intake_id: Uuid,
    pub status: IntakeStatus,
    pub red_flags: Vec<FlagView>,
}

/// `POST /api/intake-links/{token}/submit`
///
/// 201 on first submission, 200 when a retry resolves to the intake an
/// earlier request already created.
pub async fn submit(
    State(ctx): State<ApiContext>,
    Path(token): Path<String>,
    Json(payload): Json<IntakePayload>,
) -> Result<(StatusCode, Json<SubmissionResponse>), ApiError> {
    let mut conn = ctx
        .db
        .lock()
        .map_err(|_| ApiError::Internal("lock poisoned".into()))?;
    let outcome = ingest::submit_intake(&mut conn, ctx.notifier.as_ref(), &token, &payload)?;

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(SubmissionResponse {
            intake_id: outcome.intake.id,
            status: outcome.intake.status,
            red_flags: outcome
                .flags
                .into_iter()
                .map(|f| FlagView {
                    category: f.category,
                    severity: f.severity,
                    description: f.description,
                })
                .collect(),
        }),
    ))
}

#[derive(Serialize)]
pub struct ReviewResponse {
    pub intake_id: Uuid,
    pub status: IntakeStatus,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// `POST /api/intakes/{id}/review`
///
/// Idempotent: reviewing an already-reviewed intake answers with the
/// existing review timestamp.
pub async fn review(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let conn = ctx
        .db
        .lock()
        .map_err(|_| ApiError::Internal("lock poisoned".into()))?;

    let intake = repository::get_intake(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("Intake {id}")))?;

    if intake.status != IntakeStatus::Reviewed {
        repository::transition_intake(&conn, &id, IntakeStatus::Reviewed, Utc::now())?;
    }
    let intake = repository::get_intake(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("Intake {id}")))?;

    Ok(Json(ReviewResponse {
        intake_id: intake.id,
        status: intake.status,
        reviewed_at: intake.reviewed_at,
    }))
}
