//! API error types with structured JSON responses.
//!
//! Every failure renders as `{"error": {"code", "message", ...}}`. Two
//! deliberate opacities: all link-token failures share one body so a
//! caller cannot probe whether a token exists, is expired, or was used;
//! and internal errors log their detail server-side but never send it.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::ingest::IngestError;
use crate::links::LinkError;
use crate::summary::SummaryError;
use crate::verification::VerificationError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    /// Set on submission conflicts so the caller can fetch the intake
    /// that won the race.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intake_id: Option<Uuid>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unknown, expired, or already-used token. One message for all
    /// three; the internal cause is logged at conversion time.
    #[error("Link not available")]
    LinkInvalid,
    #[error("Identity verification failed")]
    VerificationFailed,
    #[error("Validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },
    #[error("Identity verification required")]
    NotVerified,
    #[error("Submission conflict")]
    SubmissionConflict { winner_intake_id: Uuid },
    #[error("Summary generation already in progress")]
    GenerationInProgress,
    #[error("Summary generation timed out")]
    AiTimeout,
    #[error("Generative service unavailable")]
    AiUnavailable,
    #[error("Generative service rejected the request")]
    AiContentRejected,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut intake_id = None;
        let (status, code, message) = match &self {
            ApiError::LinkInvalid => (
                StatusCode::NOT_FOUND,
                "LINK_INVALID",
                "This intake link is not available".to_string(),
            ),
            ApiError::VerificationFailed => (
                StatusCode::FORBIDDEN,
                "VERIFICATION_FAILED",
                "Identity verification failed".to_string(),
            ),
            ApiError::Validation { field, reason } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION",
                format!("{field}: {reason}"),
            ),
            ApiError::NotVerified => (
                StatusCode::FORBIDDEN,
                "NOT_VERIFIED",
                "Identity verification required before submission".to_string(),
            ),
            ApiError::SubmissionConflict { winner_intake_id } => {
                intake_id = Some(*winner_intake_id);
                (
                    StatusCode::CONFLICT,
                    "SUBMISSION_CONFLICT",
                    "A concurrent submission completed this link".to_string(),
                )
            }
            ApiError::GenerationInProgress => (
                StatusCode::CONFLICT,
                "GENERATION_IN_PROGRESS",
                "A summary generation is already in progress for this intake".to_string(),
            ),
            ApiError::AiTimeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "AI_TIMEOUT",
                "Summary generation timed out".to_string(),
            ),
            ApiError::AiUnavailable => (
                StatusCode::BAD_GATEWAY,
                "AI_UNAVAILABLE",
                "Generative service is unavailable".to_string(),
            ),
            ApiError::AiContentRejected => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "AI_CONTENT_REJECTED",
                "Generative service rejected the request".to_string(),
            ),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message,
                intake_id,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<LinkError> for ApiError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::Validation(v) => ApiError::Validation {
                field: v.field,
                reason: v.reason,
            },
            LinkError::PatientNotFound(id) => ApiError::NotFound(format!("Patient {id}")),
            LinkError::NotFound | LinkError::Expired { .. } | LinkError::AlreadyUsed { .. } => {
                // Log the real cause; the response stays uniform.
                tracing::debug!("Link rejected: {err}");
                ApiError::LinkInvalid
            }
            LinkError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<VerificationError> for ApiError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::Link(e) => e.into(),
            VerificationError::Failed => ApiError::VerificationFailed,
            VerificationError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Validation(v) => ApiError::Validation {
                field: v.field,
                reason: v.reason,
            },
            IngestError::Link(e) => e.into(),
            IngestError::NotVerified => ApiError::NotVerified,
            IngestError::Conflict { winner_intake_id } => {
                ApiError::SubmissionConflict { winner_intake_id }
            }
            IngestError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<SummaryError> for ApiError {
    fn from(err: SummaryError) -> Self {
        match err {
            SummaryError::IntakeNotFound(id) => ApiError::NotFound(format!("Intake {id}")),
            SummaryError::NotSummarizable(id) => ApiError::Validation {
                field: "intake_id".into(),
                reason: format!("intake {id} is not in a summarizable state"),
            },
            SummaryError::GenerationInProgress => ApiError::GenerationInProgress,
            SummaryError::Timeout => ApiError::AiTimeout,
            SummaryError::Unavailable(detail) => {
                tracing::warn!(detail, "Generative service unavailable");
                ApiError::AiUnavailable
            }
            SummaryError::ContentRejected(detail) => {
                tracing::warn!(detail, "Generative service rejected request");
                ApiError::AiContentRejected
            }
            SummaryError::Database(e) => ApiError::Internal(e.to_string()),
            SummaryError::LockPoisoned => ApiError::Internal("lock poisoned".into()),
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn link_invalid_returns_404_with_uniform_message() {
        for err in [
            LinkError::NotFound,
            LinkError::Expired {
                link_id: Uuid::new_v4(),
            },
            LinkError::AlreadyUsed {
                link_id: Uuid::new_v4(),
            },
        ] {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            let body = to_bytes(response.into_body(), 1024).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(json["error"]["code"], "LINK_INVALID");
            assert_eq!(json["error"]["message"], "This intake link is not available");
        }
    }

    #[tokio::test]
    async fn verification_failed_returns_403_without_attempt_count() {
        let response = ApiError::VerificationFailed.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "VERIFICATION_FAILED");
        assert!(!json["error"]["message"].as_str().unwrap().contains(char::is_numeric));
    }

    #[tokio::test]
    async fn conflict_carries_winner_intake_id() {
        let winner = Uuid::new_v4();
        let response = ApiError::SubmissionConflict {
            winner_intake_id: winner,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["intake_id"], winner.to_string());
    }

    #[tokio::test]
    async fn ai_failures_map_to_gateway_statuses() {
        assert_eq!(
            ApiError::AiTimeout.into_response().status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ApiError::AiUnavailable.into_response().status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::AiContentRejected.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[tokio::test]
    async fn internal_hides_detail() {
        let response = ApiError::Internal("sqlite disk I/O error".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["message"], "An internal error occurred");
        assert!(json["error"].get("intake_id").is_none());
    }

    #[tokio::test]
    async fn validation_returns_422_with_field_path() {
        let response = ApiError::Validation {
            field: "medications[1].name".into(),
            reason: "must not be empty".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json["error"]["message"],
            "medications[1].name: must not be empty"
        );
    }
}
