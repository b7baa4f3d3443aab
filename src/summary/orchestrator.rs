//! Summary generation orchestration: lease, deadline, retry, persist.
//!
//! One generation per intake at a time, enforced by a database lease so
//! the guarantee holds across processes. Attempts run under a hard
//! deadline; transient failures retry with exponential backoff, terminal
//! ones do not. Nothing is persisted until a generation fully succeeds,
//! so the summaries table never holds partial output.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::Summary;
use crate::state;
use crate::summary::prompt::build_prompt;
use crate::summary::provider::{
    GenerationOutput, GenerationRequest, GenerativeProvider, ProviderError, StreamChunk,
};

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("Intake not found: {0}")]
    IntakeNotFound(Uuid),

    #[error("Intake {0} is not in a summarizable state")]
    NotSummarizable(Uuid),

    /// Another generation holds the lease for this intake.
    #[error("A summary generation is already in progress for this intake")]
    GenerationInProgress,

    /// Every attempt ran past the per-attempt deadline.
    #[error("Summary generation timed out")]
    Timeout,

    /// The provider stayed unreachable or kept failing transiently.
    #[error("Generative service unavailable: {0}")]
    Unavailable(String),

    /// The provider refused the content. Never retried.
    #[error("Generative service rejected the request: {0}")]
    ContentRejected(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Internal lock error")]
    LockPoisoned,
}

/// Events pushed over a streaming generation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    Chunk { text: String },
    Done { summary_id: Uuid, tokens_used: u32 },
    Failed { message: String },
}

#[derive(Clone)]
pub struct SummaryOrchestrator {
    db: Arc<Mutex<Connection>>,
    provider: Arc<dyn GenerativeProvider>,
    cfg: PipelineConfig,
    /// Lease holder identity, unique per orchestrator instance.
    holder: String,
}

impl SummaryOrchestrator {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        provider: Arc<dyn GenerativeProvider>,
        cfg: PipelineConfig,
    ) -> Self {
        Self {
            db,
            provider,
            cfg,
            holder: format!("orchestrator-{}", Uuid::new_v4()),
        }
    }

    /// Generate a summary and persist it. Returns the stored row.
    pub async fn generate(&self, intake_id: Uuid) -> Result<Summary, SummaryError> {
        let req = self.prepare(intake_id)?;

        let result = self.attempt_loop(&req).await;
        match result {
            Ok(out) => {
                let summary = self.persist(intake_id, out);
                self.release_lease(&intake_id);
                summary
            }
            Err(e) => {
                self.release_lease(&intake_id);
                Err(e)
            }
        }
    }

    /// Generate a summary, streaming increments to the returned channel.
    ///
    /// Precondition failures (missing intake, held lease) surface as an
    /// immediate `Err`; everything after that arrives as events. If the
    /// receiver is dropped mid-stream, the worker stops polling the
    /// provider within one chunk and persists nothing.
    pub async fn generate_stream(
        &self,
        intake_id: Uuid,
    ) -> Result<mpsc::Receiver<StreamEvent>, SummaryError> {
        let req = self.prepare(intake_id)?;
        let (tx, rx) = mpsc::channel(16);

        let this = self.clone();
        tokio::spawn(async move {
            this.run_stream(intake_id, req, tx).await;
            this.release_lease(&intake_id);
        });

        Ok(rx)
    }

    /// Load the intake and its flags, take the lease, build the request.
    fn prepare(&self, intake_id: Uuid) -> Result<GenerationRequest, SummaryError> {
        let conn = self.db.lock().map_err(|_| SummaryError::LockPoisoned)?;

        let intake = repository::get_intake(&conn, &intake_id)?
            .ok_or(SummaryError::IntakeNotFound(intake_id))?;
        if !state::generation_allowed(intake.status) {
            return Err(SummaryError::NotSummarizable(intake_id));
        }
        let flags = repository::list_red_flags(&conn, &intake_id)?;

        let acquired = repository::acquire_lease(
            &conn,
            &intake_id,
            &self.holder,
            self.cfg.lease_ttl_secs,
            Utc::now(),
        )?;
        if !acquired {
            return Err(SummaryError::GenerationInProgress);
        }

        Ok(GenerationRequest {
            model: self.cfg.ai.model.clone(),
            prompt: build_prompt(&intake, &flags),
        })
    }

    async fn attempt_loop(&self, req: &GenerationRequest) -> Result<GenerationOutput, SummaryError> {
        let mut attempt: u32 = 0;
        loop {
            let outcome =
                tokio::time::timeout(self.cfg.ai.deadline, self.provider.generate(req)).await;

            // Anything that falls through here is transient and worth
            // another attempt; terminal outcomes return directly.
            let err = match outcome {
                Ok(Ok(out)) => return Ok(out),
                Ok(Err(ProviderError::ContentRejected(m))) => {
                    return Err(SummaryError::ContentRejected(m))
                }
                Ok(Err(e)) if e.is_transient() => SummaryError::Unavailable(e.to_string()),
                Ok(Err(e)) => return Err(SummaryError::Unavailable(e.to_string())),
                Err(_) => SummaryError::Timeout,
            };

            if attempt >= self.cfg.ai.max_retries {
                return Err(err);
            }
            let delay = self.cfg.ai.backoff_base * 2u32.pow(attempt);
            tracing::warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Generation attempt failed, retrying: {err}",
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn run_stream(
        &self,
        intake_id: Uuid,
        req: GenerationRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) {
        use futures_util::StreamExt;

        // Opening the stream follows the same retry discipline as
        // non-streamed calls; once chunks flow, a failure is final.
        let mut attempt: u32 = 0;
        let mut stream = loop {
            let outcome =
                tokio::time::timeout(self.cfg.ai.deadline, self.provider.generate_stream(&req))
                    .await;
            let err = match outcome {
                Ok(Ok(stream)) => break stream,
                Ok(Err(ProviderError::ContentRejected(m))) => {
                    let _ = tx.send(StreamEvent::Failed { message: m }).await;
                    return;
                }
                Ok(Err(e)) if e.is_transient() && attempt < self.cfg.ai.max_retries => e.to_string(),
                Ok(Err(e)) => {
                    let _ = tx.send(StreamEvent::Failed { message: e.to_string() }).await;
                    return;
                }
                Err(_) if attempt < self.cfg.ai.max_retries => "deadline exceeded".to_string(),
                Err(_) => {
                    let _ = tx
                        .send(StreamEvent::Failed {
                            message: "summary generation timed out".into(),
                        })
                        .await;
                    return;
                }
            };
            let delay = self.cfg.ai.backoff_base * 2u32.pow(attempt);
            tracing::warn!(attempt, "Stream open failed, retrying: {err}");
            tokio::time::sleep(delay).await;
            attempt += 1;
        };

        let mut content = String::new();
        loop {
            let next = tokio::time::timeout(self.cfg.ai.deadline, stream.next()).await;
            match next {
                Ok(Some(Ok(StreamChunk::Delta(text)))) => {
                    content.push_str(&text);
                    if tx.send(StreamEvent::Chunk { text }).await.is_err() {
                        // Receiver gone: the client cancelled. Dropping
                        // the stream aborts the upstream request.
                        tracing::info!(%intake_id, "Stream cancelled by receiver");
                        return;
                    }
                }
                Ok(Some(Ok(StreamChunk::Done { tokens_used }))) => {
                    match self.persist(
                        intake_id,
                        GenerationOutput {
                            content,
                            tokens_used,
                        },
                    ) {
                        Ok(summary) => {
                            let _ = tx
                                .send(StreamEvent::Done {
                                    summary_id: summary.id,
                                    tokens_used,
                                })
                                .await;
                        }
                        Err(e) => {
                            tracing::error!(%intake_id, "Failed to persist streamed summary: {e}");
                            let _ = tx
                                .send(StreamEvent::Failed {
                                    message: "failed to persist summary".into(),
                                })
                                .await;
                        }
                    }
                    return;
                }
                Ok(Some(Err(e))) => {
                    let _ = tx.send(StreamEvent::Failed { message: e.to_string() }).await;
                    return;
                }
                Ok(None) => {
                    let _ = tx
                        .send(StreamEvent::Failed {
                            message: "stream ended before completion".into(),
                        })
                        .await;
                    return;
                }
                Err(_) => {
                    let _ = tx
                        .send(StreamEvent::Failed {
                            message: "summary generation timed out".into(),
                        })
                        .await;
                    return;
                }
            }
        }
    }

    fn persist(&self, intake_id: Uuid, out: GenerationOutput) -> Result<Summary, SummaryError> {
        let summary = Summary {
            id: Uuid::new_v4(),
            intake_id,
            content: out.content,
            model_id: self.cfg.ai.model.clone(),
            tokens_used: out.tokens_used,
            created_at: Utc::now(),
        };
        let conn = self.db.lock().map_err(|_| SummaryError::LockPoisoned)?;
        repository::insert_summary(&conn, &summary)?;
        tracing::info!(
            summary_id = %summary.id,
            %intake_id,
            tokens_used = summary.tokens_used,
            "Summary persisted",
        );
        Ok(summary)
    }

    /// Best-effort lease release on every exit path.
    fn release_lease(&self, intake_id: &Uuid) {
        let released = self
            .db
            .lock()
            .map_err(|_| SummaryError::LockPoisoned)
            .and_then(|conn| {
                repository::release_lease(&conn, intake_id, &self.holder).map_err(Into::into)
            });
        if let Err(e) = released {
            tracing::error!(%intake_id, "Failed to release generation lease: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::intake::tests_support::seeded_intake;
    use crate::db::sqlite::open_memory_database;
    use crate::summary::provider::MockProvider;
    use std::time::Duration;

    fn tight_cfg() -> PipelineConfig {
        let mut cfg = PipelineConfig::default();
        cfg.ai.deadline = Duration::from_millis(100);
        cfg.ai.backoff_base = Duration::from_millis(5);
        cfg
    }

    fn setup(
        provider: Arc<MockProvider>,
        cfg: PipelineConfig,
    ) -> (SummaryOrchestrator, Arc<Mutex<Connection>>, Uuid) {
        let conn = open_memory_database().unwrap();
        let intake = seeded_intake(&conn);
        let db = Arc::new(Mutex::new(conn));
        let orchestrator = SummaryOrchestrator::new(db.clone(), provider, cfg);
        (orchestrator, db, intake.id)
    }

    fn summary_count(db: &Arc<Mutex<Connection>>, intake_id: &Uuid) -> i64 {
        let conn = db.lock().unwrap();
        repository::count_summaries(&conn, intake_id).unwrap()
    }

    #[tokio::test]
    async fn success_persists_exactly_one_summary() {
        let provider = Arc::new(MockProvider::new("Concise clinical summary."));
        let (orch, db, intake_id) = setup(provider.clone(), tight_cfg());

        let summary = orch.generate(intake_id).await.unwrap();
        assert_eq!(summary.content, "Concise clinical summary.");
        assert_eq!(summary.tokens_used, 42);
        assert_eq!(provider.calls(), 1);
        assert_eq!(summary_count(&db, &intake_id), 1);

        // Lease released: a second generation may run.
        orch.generate(intake_id).await.unwrap();
        assert_eq!(summary_count(&db, &intake_id), 2);
    }

    #[tokio::test]
    async fn unknown_intake_is_rejected_before_any_call() {
        let provider = Arc::new(MockProvider::new("unused"));
        let (orch, _db, _intake_id) = setup(provider.clone(), tight_cfg());

        let err = orch.generate(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, SummaryError::IntakeNotFound(_)));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn held_lease_blocks_concurrent_generation() {
        let provider = Arc::new(MockProvider::new("summary"));
        let (orch, db, intake_id) = setup(provider.clone(), tight_cfg());

        {
            let conn = db.lock().unwrap();
            assert!(
                repository::acquire_lease(&conn, &intake_id, "other-worker", 120, Utc::now())
                    .unwrap()
            );
        }

        let err = orch.generate(intake_id).await.unwrap_err();
        assert!(matches!(err, SummaryError::GenerationInProgress));
        assert_eq!(provider.calls(), 0);
        assert_eq!(summary_count(&db, &intake_id), 0);
    }

    #[tokio::test]
    async fn transient_failures_retry_then_succeed() {
        let provider = Arc::new(MockProvider::new("recovered summary"));
        provider.push_failure(ProviderError::Connect("refused".into()));
        provider.push_failure(ProviderError::Upstream {
            status: 503,
            message: "busy".into(),
        });
        let (orch, db, intake_id) = setup(provider.clone(), tight_cfg());

        let summary = orch.generate(intake_id).await.unwrap();
        assert_eq!(summary.content, "recovered summary");
        assert_eq!(provider.calls(), 3);
        assert_eq!(summary_count(&db, &intake_id), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_yield_unavailable_and_no_rows() {
        let provider = Arc::new(MockProvider::new("unused"));
        for _ in 0..3 {
            provider.push_failure(ProviderError::Connect("refused".into()));
        }
        let (orch, db, intake_id) = setup(provider.clone(), tight_cfg());

        let err = orch.generate(intake_id).await.unwrap_err();
        assert!(matches!(err, SummaryError::Unavailable(_)));
        // First attempt + max_retries.
        assert_eq!(provider.calls(), 3);
        assert_eq!(summary_count(&db, &intake_id), 0);
    }

    #[tokio::test]
    async fn content_rejection_is_never_retried() {
        let provider = Arc::new(MockProvider::new("unused"));
        provider.push_failure(ProviderError::ContentRejected("policy".into()));
        let (orch, db, intake_id) = setup(provider.clone(), tight_cfg());

        let err = orch.generate(intake_id).await.unwrap_err();
        assert!(matches!(err, SummaryError::ContentRejected(_)));
        assert_eq!(provider.calls(), 1);
        assert_eq!(summary_count(&db, &intake_id), 0);
    }

    #[tokio::test]
    async fn timeout_leaves_no_rows_and_frees_the_lease() {
        let mut provider = MockProvider::new("too slow");
        provider.delay = Some(Duration::from_millis(300));
        let mut cfg = tight_cfg();
        cfg.ai.max_retries = 0;
        let (orch, db, intake_id) = setup(Arc::new(provider), cfg.clone());

        let err = orch.generate(intake_id).await.unwrap_err();
        assert!(matches!(err, SummaryError::Timeout));
        assert_eq!(summary_count(&db, &intake_id), 0);

        // A later attempt against a healthy provider succeeds.
        let healthy = Arc::new(MockProvider::new("second try"));
        let orch2 = SummaryOrchestrator::new(db.clone(), healthy, cfg);
        let summary = orch2.generate(intake_id).await.unwrap();
        assert_eq!(summary.content, "second try");
        assert_eq!(summary_count(&db, &intake_id), 1);
    }

    #[tokio::test]
    async fn stream_delivers_chunks_then_done_and_persists() {
        let provider = Arc::new(MockProvider::new("alpha beta gamma"));
        let (orch, db, intake_id) = setup(provider.clone(), tight_cfg());

        let mut rx = orch.generate_stream(intake_id).await.unwrap();
        let mut content = String::new();
        let mut done = None;
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::Chunk { text } => content.push_str(&text),
                StreamEvent::Done {
                    summary_id,
                    tokens_used,
                } => done = Some((summary_id, tokens_used)),
                StreamEvent::Failed { message } => panic!("unexpected failure: {message}"),
            }
        }
        assert_eq!(content, "alpha beta gamma");
        let (summary_id, tokens_used) = done.unwrap();
        assert_eq!(tokens_used, 42);

        let conn = db.lock().unwrap();
        let stored = repository::get_latest_summary(&conn, &intake_id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, summary_id);
        assert_eq!(stored.content, "alpha beta gamma");
    }

    #[tokio::test]
    async fn dropping_the_receiver_cancels_and_persists_nothing() {
        let mut mock = MockProvider::new("one two three four five six seven eight");
        mock.delay = Some(Duration::from_millis(20));
        let provider = Arc::new(mock);
        let mut cfg = tight_cfg();
        cfg.ai.deadline = Duration::from_secs(5);
        let (orch, db, intake_id) = setup(provider.clone(), cfg);

        let mut rx = orch.generate_stream(intake_id).await.unwrap();
        // Take a couple of chunks, then walk away.
        let first = rx.recv().await.unwrap();
        assert!(matches!(first, StreamEvent::Chunk { .. }));
        let _ = rx.recv().await;
        drop(rx);

        // Give the worker time to notice and wind down.
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(provider.chunks_streamed() < 8, "provider kept streaming");
        assert_eq!(summary_count(&db, &intake_id), 0);

        // Lease was released on the cancellation path.
        let conn = db.lock().unwrap();
        assert!(repository::current_lease(&conn, &intake_id)
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn stream_failure_event_on_terminal_error() {
        let provider = Arc::new(MockProvider::new("unused"));
        provider.push_failure(ProviderError::ContentRejected("policy".into()));
        let (orch, db, intake_id) = setup(provider.clone(), tight_cfg());

        let mut rx = orch.generate_stream(intake_id).await.unwrap();
        let mut saw_failure = false;
        while let Some(event) = rx.recv().await {
            if let StreamEvent::Failed { .. } = event {
                saw_failure = true;
            }
        }
        assert!(saw_failure);
        assert_eq!(summary_count(&db, &intake_id), 0);
    }
}
