//! Intake submission: validate, gate, persist, notify.
//!
//! Submission is atomic. The intake row, its red flags, and the link's
//! pending → completed transition commit together or not at all, so a
//! completed link always has exactly one intake behind it. A retried
//! POST for an already-completed link answers with the existing intake
//! instead of an error.

use chrono::Utc;
use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::db::repository;
use crate::db::DatabaseError;
use crate::detection;
use crate::links::{self, LinkError};
use crate::models::enums::{IntakeStatus, LinkStatus};
use crate::models::{Intake, IntakePayload, RedFlag, ValidationError};
use crate::notify::{warrants_notification, Notifier};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Link(#[from] LinkError),

    /// The link demands DOB verification and it has not been passed.
    #[error("Link requires identity verification before submission")]
    NotVerified,

    /// A concurrent submission on the same link won the completion race.
    #[error("Link was completed concurrently; intake {winner_intake_id} exists")]
    Conflict { winner_intake_id: Uuid },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// What a submission produced. `created` is false when an idempotent
/// retry resolved to the intake a previous request already persisted.
#[derive(Debug)]
pub struct SubmissionOutcome {
    pub intake: Intake,
    pub flags: Vec<RedFlag>,
    pub created: bool,
}

pub fn submit_intake(
    conn: &mut Connection,
    notifier: &dyn Notifier,
    token: &str,
    payload: &IntakePayload,
) -> Result<SubmissionOutcome, IngestError> {
    payload.validate()?;

    let link = match links::validate_token(conn, token) {
        Ok(link) => link,
        Err(LinkError::AlreadyUsed { link_id }) => {
            return existing_submission(conn, &link_id);
        }
        Err(e) => return Err(e.into()),
    };

    if link.requires_dob_verification && link.dob_verified_at.is_none() {
        return Err(IngestError::NotVerified);
    }

    let now = Utc::now();
    let intake = Intake {
        id: Uuid::new_v4(),
        patient_id: link.patient_id,
        intake_link_id: link.id,
        demographics: payload.demographics.clone(),
        chief_complaint: payload.chief_complaint.clone(),
        medical_history: payload.medical_history.clone(),
        medications: payload.medications.clone(),
        allergies: payload.allergies.clone(),
        created_at: now,
        status: IntakeStatus::ReadyForReview,
        reviewed_at: None,
    };
    let flags = detection::detect(&intake, now);

    let tx = conn.transaction().map_err(DatabaseError::from)?;
    repository::insert_intake(&tx, &intake)?;
    for flag in &flags {
        repository::insert_red_flag(&tx, flag)?;
    }
    let won = repository::transition_link(&tx, &link.id, LinkStatus::Completed, now)?;
    if !won {
        // Someone else completed the link between our validation and
        // here. Drop our rows and point at the winner's intake.
        drop(tx);
        let winner = repository::get_intake_by_link(conn, &link.id)?;
        return match winner {
            Some(w) => Err(IngestError::Conflict {
                winner_intake_id: w.id,
            }),
            None => Err(LinkError::Expired { link_id: link.id }.into()),
        };
    }
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(
        intake_id = %intake.id,
        link_id = %link.id,
        flag_count = flags.len(),
        "Intake submitted",
    );

    for flag in flags.iter().filter(|f| warrants_notification(f)) {
        notifier.notify(flag);
    }

    Ok(SubmissionOutcome {
        intake,
        flags,
        created: true,
    })
}

/// Idempotent retry path: the link already completed, so answer with
/// whatever that completion persisted.
fn existing_submission(
    conn: &Connection,
    link_id: &Uuid,
) -> Result<SubmissionOutcome, IngestError> {
    let intake = repository::get_intake_by_link(conn, link_id)?
        .ok_or(LinkError::AlreadyUsed { link_id: *link_id })?;
    let flags = repository::list_red_flags(conn, &intake.id)?;
    tracing::info!(intake_id = %intake.id, "Replayed submission resolved to existing intake");
    Ok(SubmissionOutcome {
        intake,
        flags,
        created: false,
    })
}
