//! The seam to the external generative service.
//!
//! `GenerativeProvider` is what the orchestrator retries against; the
//! production implementation speaks Ollama's HTTP API. `MockProvider`
//! is deliberately not cfg-gated so examples and integration tests can
//! script failures without a live model server.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AiConfig;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Could not reach the service at all.
    #[error("Provider unreachable: {0}")]
    Connect(String),

    /// The service answered with an error status.
    #[error("Provider returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// The service refused the request content. Never retried.
    #[error("Provider rejected the content: {0}")]
    ContentRejected(String),

    /// The service answered with something we could not parse.
    #[error("Malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Whether a retry has any chance of succeeding. Connection trouble
    /// and 5xx are transient; 4xx and content rejection are terminal.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connect(_) => true,
            Self::Upstream { status, .. } => *status >= 500,
            Self::ContentRejected(_) | Self::Malformed(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
}

/// A completed, non-streamed generation.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub content: String,
    pub tokens_used: u32,
}

/// One streaming increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    Delta(String),
    Done { tokens_used: u32 },
}

pub type ChunkStream = BoxStream<'static, Result<StreamChunk, ProviderError>>;

#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    async fn generate(&self, req: &GenerationRequest) -> Result<GenerationOutput, ProviderError>;

    /// Open a streaming generation. Dropping the returned stream aborts
    /// the upstream request.
    async fn generate_stream(&self, req: &GenerationRequest) -> Result<ChunkStream, ProviderError>;
}

// ═══════════════════════════════════════════════════════════
// Ollama
// ═══════════════════════════════════════════════════════════

/// Ollama `/api/generate` client. Non-streamed calls get one JSON
/// object back; streamed calls get NDJSON, one object per line, the
/// last carrying `done: true` and the token count.
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaProvider {
    pub fn new(cfg: &AiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post(
        &self,
        req: &GenerationRequest,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let resp = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&OllamaRequest {
                model: &req.model,
                prompt: &req.prompt,
                stream,
            })
            .send()
            .await
            .map_err(|e| ProviderError::Connect(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp)
    }
}

fn parse_chunk(line: &str) -> Result<OllamaChunk, ProviderError> {
    let chunk: OllamaChunk =
        serde_json::from_str(line).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    if let Some(error) = chunk.error {
        return Err(ProviderError::ContentRejected(error));
    }
    Ok(chunk)
}

#[async_trait]
impl GenerativeProvider for OllamaProvider {
    async fn generate(&self, req: &GenerationRequest) -> Result<GenerationOutput, ProviderError> {
        let resp = self.post(req, false).await?;
        let body = resp
            .text()
            .await
            .map_err(|e| ProviderError::Connect(e.to_string()))?;
        let chunk = parse_chunk(&body)?;
        Ok(GenerationOutput {
            content: chunk.response,
            tokens_used: chunk.eval_count.unwrap_or(0),
        })
    }

    async fn generate_stream(&self, req: &GenerationRequest) -> Result<ChunkStream, ProviderError> {
        let resp = self.post(req, true).await?;

        struct State {
            inner: BoxStream<'static, reqwest::Result<Vec<u8>>>,
            buf: String,
            pending: std::collections::VecDeque<Result<StreamChunk, ProviderError>>,
            finished: bool,
        }

        fn drain_lines(st: &mut State) {
            while let Some(pos) = st.buf.find('\n') {
                let line: String = st.buf.drain(..=pos).collect();
                push_line(st, line.trim());
            }
        }

        fn push_line(st: &mut State, line: &str) {
            if line.is_empty() {
                return;
            }
            match parse_chunk(line) {
                Ok(chunk) => {
                    if !chunk.response.is_empty() {
                        st.pending.push_back(Ok(StreamChunk::Delta(chunk.response)));
                    }
                    if chunk.done {
                        st.pending.push_back(Ok(StreamChunk::Done {
                            tokens_used: chunk.eval_count.unwrap_or(0),
                        }));
                        st.finished = true;
                    }
                }
                Err(e) => {
                    st.pending.push_back(Err(e));
                    st.finished = true;
                }
            }
        }

        let state = State {
            inner: resp.bytes_stream().map(|r| r.map(|b| b.to_vec())).boxed(),
            buf: String::new(),
            pending: std::collections::VecDeque::new(),
            finished: false,
        };

        let stream = futures_util::stream::unfold(state, |mut st| async move {
            loop {
                if let Some(item) = st.pending.pop_front() {
                    return Some((item, st));
                }
                if st.finished {
                    return None;
                }
                match st.inner.next().await {
                    Some(Ok(bytes)) => {
                        st.buf.push_str(&String::from_utf8_lossy(&bytes));
                        drain_lines(&mut st);
                    }
                    Some(Err(e)) => {
                        st.finished = true;
                        st.pending
                            .push_back(Err(ProviderError::Connect(e.to_string())));
                    }
                    None => {
                        st.finished = true;
                        let tail = std::mem::take(&mut st.buf);
                        push_line(&mut st, tail.trim());
                    }
                }
            }
        });

        Ok(stream.boxed())
    }
}

// ═══════════════════════════════════════════════════════════
// Mock
// ═══════════════════════════════════════════════════════════

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Scriptable provider for tests and offline development.
///
/// Queued failures are consumed one per call before `content` is
/// served. `delay` applies per call (non-streamed) or per chunk
/// (streamed), which lets tests observe mid-stream cancellation.
pub struct MockProvider {
    pub content: String,
    pub tokens_used: u32,
    pub delay: Option<Duration>,
    failures: Mutex<VecDeque<ProviderError>>,
    calls: AtomicUsize,
    chunks_streamed: std::sync::Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tokens_used: 42,
            delay: None,
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            chunks_streamed: std::sync::Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue an error to be returned before `content` is ever served.
    pub fn push_failure(&self, err: ProviderError) {
        if let Ok(mut q) = self.failures.lock() {
            q.push_back(err);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// How many deltas streamed calls have emitted in total.
    pub fn chunks_streamed(&self) -> usize {
        self.chunks_streamed.load(Ordering::SeqCst)
    }

    fn next_failure(&self) -> Option<ProviderError> {
        self.failures.lock().ok().and_then(|mut q| q.pop_front())
    }
}

#[async_trait]
impl GenerativeProvider for MockProvider {
    async fn generate(&self, _req: &GenerationRequest) -> Result<GenerationOutput, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.next_failure() {
            return Err(err);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(GenerationOutput {
            content: self.content.clone(),
            tokens_used: self.tokens_used,
        })
    }

    async fn generate_stream(&self, _req: &GenerationRequest) -> Result<ChunkStream, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.next_failure() {
            return Err(err);
        }

        let words: Vec<String> = self
            .content
            .split_inclusive(' ')
            .map(str::to_string)
            .collect();
        let tokens_used = self.tokens_used;
        let delay = self.delay;
        let counter = self.chunks_streamed.clone();

        let chunk_count = words.len();
        let stream = futures_util::stream::iter(
            words
                .into_iter()
                .map(|w| Ok(StreamChunk::Delta(w)))
                .chain(std::iter::once(Ok(StreamChunk::Done { tokens_used })))
                .enumerate()
                .collect::<Vec<_>>(),
        )
        .then(move |(i, item)| {
            let counter = counter.clone();
            async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                if i < chunk_count {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
                item
            }
        });

        Ok(stream.boxed())
    }
}
