//! HTTP router.
//!
//! Two route groups under `/api`: public routes where the link token in
//! the path is the only credential, and provider routes behind the
//! static bearer key. Handlers use `State<ApiContext>`; the auth
//! middleware reads the same context from an `Extension` layer.

use axum::routing::{get, post};
use axum::Router;

use crate::api::endpoints::{health, intakes, links, summaries};
use crate::api::middleware;
use crate::api::types::ApiContext;

pub fn api_router(ctx: ApiContext) -> Router {
    let public = Router::new()
        .route("/health", get(health::check))
        .route("/intake-links/:token", get(links::resolve))
        .route("/intake-links/:token/verify", post(links::verify))
        .route("/intake-links/:token/submit", post(intakes::submit))
        .with_state(ctx.clone());

    let provider = Router::new()
        .route("/intake-links", post(links::issue))
        .route("/intakes/:id/review", post(intakes::review))
        .route("/summaries/generate", post(summaries::generate))
        .route(
            "/summaries/generate/stream",
            post(summaries::generate_stream),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(
            middleware::require_provider_key,
        ))
        .layer(axum::Extension(ctx.clone()));

    Router::new().nest("/api", public.merge(provider))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::db::repository::insert_patient;
    use crate::db::sqlite::open_memory_database;
    use crate::models::Patient;
    use crate::notify::TracingNotifier;
    use crate::summary::MockProvider;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use chrono::NaiveDate;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;
    use uuid::Uuid;

    const KEY: &str = "test-provider-key";

    fn test_app() -> (Router, Uuid) {
        let conn = open_memory_database().unwrap();
        let patient = Patient {
            id: Uuid::new_v4(),
            name: "Ana Morales".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1984, 3, 2).unwrap(),
            email: None,
            phone: None,
        };
        insert_patient(&conn, &patient).unwrap();

        let mut cfg = PipelineConfig::default();
        cfg.provider_api_key = KEY.into();
        cfg.ai.deadline = std::time::Duration::from_secs(2);

        let ctx = ApiContext::new(
            Arc::new(Mutex::new(conn)),
            cfg,
            Arc::new(MockProvider::new("Concise clinical summary.")),
            Arc::new(TracingNotifier),
        );
        (api_router(ctx), patient.id)
    }

    fn req(method: &str, uri: &str, auth: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = auth {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
        }
        match body {
            Some(v) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn payload(chief_complaint: &str) -> Value {
        json!({
            "demographics": {
                "full_name": "Ana Morales",
                "date_of_birth": "1984-03-02",
                "sex": "F"
            },
            "chief_complaint": chief_complaint,
            "medical_history": ["hypertension"],
            "medications": [],
            "allergies": []
        })
    }

    #[tokio::test]
    async fn health_is_public() {
        let (app, _) = test_app();
        let response = app.oneshot(req("GET", "/api/health", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn provider_routes_require_bearer_key() {
        let (app, patient_id) = test_app();
        let issue = json!({"patient_id": patient_id, "ttl_hours": 24});

        let no_auth = app
            .clone()
            .oneshot(req("POST", "/api/intake-links", None, Some(issue.clone())))
            .await
            .unwrap();
        assert_eq!(no_auth.status(), StatusCode::UNAUTHORIZED);

        let wrong = app
            .clone()
            .oneshot(req(
                "POST",
                "/api/intake-links",
                Some("wrong-key"),
                Some(issue.clone()),
            ))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let right = app
            .oneshot(req("POST", "/api/intake-links", Some(KEY), Some(issue)))
            .await
            .unwrap();
        assert_eq!(right.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn unknown_token_resolves_to_uniform_404() {
        let (app, _) = test_app();
        let response = app
            .oneshot(req("GET", "/api/intake-links/bm90LWEtdG9rZW4", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "LINK_INVALID");
    }

    #[tokio::test]
    async fn full_intake_flow_end_to_end() {
        let (app, patient_id) = test_app();

        // Issue a link (DOB verification on by default).
        let response = app
            .clone()
            .oneshot(req(
                "POST",
                "/api/intake-links",
                Some(KEY),
                Some(json!({"patient_id": patient_id, "ttl_hours": 24})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let issued = body_json(response).await;
        let token = issued["token"].as_str().unwrap().to_string();
        assert_eq!(issued["requires_dob_verification"], true);

        // Resolving shows the gate is still closed.
        let response = app
            .clone()
            .oneshot(req("GET", &format!("/api/intake-links/{token}"), None, None))
            .await
            .unwrap();
        let status = body_json(response).await;
        assert_eq!(status["access_granted"], false);

        // Submitting before verification is refused.
        let response = app
            .clone()
            .oneshot(req(
                "POST",
                &format!("/api/intake-links/{token}/submit"),
                None,
                Some(payload("chest pain")),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        // Wrong DOB fails without leaking anything.
        let response = app
            .clone()
            .oneshot(req(
                "POST",
                &format!("/api/intake-links/{token}/verify"),
                None,
                Some(json!({"date_of_birth": "1990-01-01"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VERIFICATION_FAILED");

        // Correct DOB opens the gate.
        let response = app
            .clone()
            .oneshot(req(
                "POST",
                &format!("/api/intake-links/{token}/verify"),
                None,
                Some(json!({"date_of_birth": "1984-03-02"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Submission creates the intake and flags chest pain.
        let response = app
            .clone()
            .oneshot(req(
                "POST",
                &format!("/api/intake-links/{token}/submit"),
                None,
                Some(payload("chest pain since this morning")),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let submitted = body_json(response).await;
        let intake_id = submitted["intake_id"].as_str().unwrap().to_string();
        assert_eq!(submitted["red_flags"][0]["category"], "cardiac");
        assert_eq!(submitted["red_flags"][0]["severity"], "high");

        // A retried submission replays the same intake with 200.
        let response = app
            .clone()
            .oneshot(req(
                "POST",
                &format!("/api/intake-links/{token}/submit"),
                None,
                Some(payload("chest pain since this morning")),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let replayed = body_json(response).await;
        assert_eq!(replayed["intake_id"], intake_id.as_str());

        // Review, idempotently.
        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(req(
                    "POST",
                    &format!("/api/intakes/{intake_id}/review"),
                    Some(KEY),
                    None,
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = body_json(response).await;
            assert_eq!(body["status"], "reviewed");
        }

        // Generate a summary against the mock provider.
        let response = app
            .clone()
            .oneshot(req(
                "POST",
                "/api/summaries/generate",
                Some(KEY),
                Some(json!({"intake_id": intake_id})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let summary = body_json(response).await;
        assert_eq!(summary["content"], "Concise clinical summary.");
        assert_eq!(summary["tokens_used"], 42);
    }

    #[tokio::test]
    async fn streaming_generation_emits_ndjson_events() {
        let (app, patient_id) = test_app();

        // Shortest path to an intake: link without the DOB gate.
        let response = app
            .clone()
            .oneshot(req(
                "POST",
                "/api/intake-links",
                Some(KEY),
                Some(json!({
                    "patient_id": patient_id,
                    "ttl_hours": 24,
                    "requires_dob_verification": false
                })),
            ))
            .await
            .unwrap();
        let issued = body_json(response).await;
        let token = issued["token"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(req(
                "POST",
                &format!("/api/intake-links/{token}/submit"),
                None,
                Some(payload("mild rash")),
            ))
            .await
            .unwrap();
        let intake_id = body_json(response).await["intake_id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .oneshot(req(
                "POST",
                "/api/summaries/generate/stream",
                Some(KEY),
                Some(json!({"intake_id": intake_id})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/x-ndjson"
        );

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let events: Vec<Value> = String::from_utf8(bytes.to_vec())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        let content: String = events
            .iter()
            .filter(|e| e["event"] == "chunk")
            .map(|e| e["text"].as_str().unwrap())
            .collect();
        assert_eq!(content, "Concise clinical summary.");

        let last = events.last().unwrap();
        assert_eq!(last["event"], "done");
        assert_eq!(last["tokens_used"], 42);
    }

    #[tokio::test]
    async fn generate_for_unknown_intake_is_404() {
        let (app, _) = test_app();
        let response = app
            .oneshot(req(
                "POST",
                "/api/summaries/generate",
                Some(KEY),
                Some(json!({"intake_id": Uuid::new_v4()})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
