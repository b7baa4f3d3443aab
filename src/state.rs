//! Central transition table for link and intake status.
//!
//! Every component consults this module instead of encoding its own idea
//! of what a legal transition is. Repository CAS updates derive their
//! `WHERE status = ?` guard from `required_predecessor`, so the table here
//! is the single authority and the database enforces it under concurrency.

use thiserror::Error;

use crate::models::enums::{IntakeStatus, LinkStatus};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("Illegal link transition: {from:?} -> {to:?}")]
    IllegalLinkTransition { from: LinkStatus, to: LinkStatus },
    #[error("Illegal intake transition: {from:?} -> {to:?}")]
    IllegalIntakeTransition {
        from: IntakeStatus,
        to: IntakeStatus,
    },
}

/// Legal link transitions: pending → completed, pending → expired.
/// Completed and expired are terminal.
pub fn link_transition_allowed(from: LinkStatus, to: LinkStatus) -> bool {
    matches!(
        (from, to),
        (LinkStatus::Pending, LinkStatus::Completed) | (LinkStatus::Pending, LinkStatus::Expired)
    )
}

/// Legal intake transitions: ready_for_review → reviewed. Reviewed is
/// terminal; re-opening is out of scope.
pub fn intake_transition_allowed(from: IntakeStatus, to: IntakeStatus) -> bool {
    matches!(
        (from, to),
        (IntakeStatus::ReadyForReview, IntakeStatus::Reviewed)
    )
}

/// The only status a link may hold immediately before reaching `to`.
/// CAS updates use this as their conditional guard.
pub fn link_required_predecessor(to: LinkStatus) -> Result<LinkStatus, StateError> {
    match to {
        LinkStatus::Completed | LinkStatus::Expired => Ok(LinkStatus::Pending),
        LinkStatus::Pending => Err(StateError::IllegalLinkTransition {
            from: LinkStatus::Pending,
            to,
        }),
    }
}

/// The only status an intake may hold immediately before reaching `to`.
pub fn intake_required_predecessor(to: IntakeStatus) -> Result<IntakeStatus, StateError> {
    match to {
        IntakeStatus::Reviewed => Ok(IntakeStatus::ReadyForReview),
        IntakeStatus::ReadyForReview => Err(StateError::IllegalIntakeTransition {
            from: IntakeStatus::ReadyForReview,
            to,
        }),
    }
}

/// Summary generation is permitted for both reviewable intake states.
pub fn generation_allowed(status: IntakeStatus) -> bool {
    matches!(
        status,
        IntakeStatus::ReadyForReview | IntakeStatus::Reviewed
    )
}
