//! Static bearer-key authentication for provider-facing routes.
//!
//! Patients authenticate implicitly through their link token; clinic
//! staff and integrations present `Authorization: Bearer <key>` where
//! the key comes from configuration. The comparison is constant time,
//! and an unconfigured (empty) key rejects every request rather than
//! waving them all through.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

pub async fn require_provider_key(req: Request<axum::body::Body>, next: Next) -> Response {
    match check_key(&req) {
        Ok(()) => next.run(req).await,
        Err(err) => err.into_response(),
    }
}

fn check_key(req: &Request<axum::body::Body>) -> Result<(), ApiError> {
    let ctx = req
        .extensions()
        .get::<ApiContext>()
        .ok_or_else(|| ApiError::Internal("missing API context".into()))?;

    let expected = ctx.cfg.provider_api_key.as_bytes();
    if expected.is_empty() {
        tracing::warn!("Provider API key not configured; rejecting request");
        return Err(ApiError::Unauthorized);
    }

    let presented = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    if bool::from(presented.as_bytes().ct_eq(expected)) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}
