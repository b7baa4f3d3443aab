use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use triagelink::api::{api_router, ApiContext};
use triagelink::config::{PipelineConfig, APP_NAME, APP_VERSION, DEFAULT_BIND_ADDR};
use triagelink::db::sqlite::open_database;
use triagelink::notify::TracingNotifier;
use triagelink::summary::OllamaProvider;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = PipelineConfig::from_env();

    let db_path = std::env::var("TRIAGELINK_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("triagelink.db"));
    let conn = open_database(&db_path)?;
    tracing::info!(path = %db_path.display(), "Database ready");

    let provider = Arc::new(OllamaProvider::new(&cfg.ai));
    let ctx = ApiContext::new(
        Arc::new(Mutex::new(conn)),
        cfg,
        provider,
        Arc::new(TracingNotifier),
    );
    let app = api_router(ctx);

    let bind_addr =
        std::env::var("TRIAGELINK_BIND").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("{APP_NAME} v{APP_VERSION} listening on {bind_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
