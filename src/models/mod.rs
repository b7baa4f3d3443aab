pub mod enums;
pub mod intake;
pub mod intake_link;
pub mod patient;
pub mod red_flag;
pub mod summary;

pub use intake::*;
pub use intake_link::*;
pub use patient::*;
pub use red_flag::*;
pub use summary::*;

use serde::Serialize;

/// Field-level validation failure. Safe to expose to callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
