//! Liveness endpoint.

use axum::Json;
use serde::Serialize;

use crate::config::{APP_NAME, APP_VERSION};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub name: &'static str,
    pub version: &'static str,
}

/// `GET /api/health`
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        name: APP_NAME,
        version: APP_VERSION,
    })
}
