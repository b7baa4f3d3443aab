//! Summary generation endpoints.
//!
//! - `POST /api/summaries/generate` (provider) — synchronous generation.
//! - `POST /api/summaries/generate/stream` (provider) — NDJSON stream,
//!   one event object per line. Closing the connection cancels the
//!   generation and nothing is persisted.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::summary::StreamEvent;

#[derive(Deserialize)]
pub struct GenerateBody {
    pub intake_id: Uuid,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub summary_id: Uuid,
    pub intake_id: Uuid,
    pub content: String,
    pub model_id: String,
    pub tokens_used: u32,
    pub created_at: DateTime<Utc>,
}

/// `POST /api/summaries/generate`
pub async fn generate(
    State(ctx): State<ApiContext>,
    Json(body): Json<GenerateBody>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let summary = ctx.orchestrator.generate(body.intake_id).await?;
    Ok(Json(SummaryResponse {
        summary_id: summary.id,
        intake_id: summary.intake_id,
        content: summary.content,
        model_id: summary.model_id,
        tokens_used: summary.tokens_used,
        created_at: summary.created_at,
    }))
}

/// `POST /api/summaries/generate/stream`
///
/// Precondition failures (missing intake, held lease) fail the request
/// before any bytes stream; after that, errors arrive as a terminal
/// `failed` event on the stream itself.
pub async fn generate_stream(
    State(ctx): State<ApiContext>,
    Json(body): Json<GenerateBody>,
) -> Result<Response, ApiError> {
    let rx = ctx.orchestrator.generate_stream(body.intake_id).await?;

    let lines = futures_util::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((encode_event(&event), rx))
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(Body::from_stream(lines))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

fn encode_event(event: &StreamEvent) -> Result<Vec<u8>, std::convert::Infallible> {
    let mut line = serde_json::to_vec(event).unwrap_or_else(|_| b"{}".to_vec());
    line.push(b'\n');
    Ok(line)
}
