//! Shared state for the HTTP layer.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::PipelineConfig;
use crate::notify::Notifier;
use crate::summary::{GenerativeProvider, SummaryOrchestrator};

/// Shared context for all routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub db: Arc<Mutex<Connection>>,
    pub cfg: Arc<PipelineConfig>,
    pub notifier: Arc<dyn Notifier>,
    pub orchestrator: Arc<SummaryOrchestrator>,
}

impl ApiContext {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        cfg: PipelineConfig,
        provider: Arc<dyn GenerativeProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let orchestrator = Arc::new(SummaryOrchestrator::new(
            db.clone(),
            provider,
            cfg.clone(),
        ));
        Self {
            db,
            cfg: Arc::new(cfg),
            notifier,
            orchestrator,
        }
    }
}
