mod analysis;
mod config;
mod documents;
mod errors;
mod llm_client;
mod routes;
mod state;
mod storage;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::{http::HttpAnalysisEngine, llm::LlmAnalysisEngine, AnalysisEngine};
use crate::config::{Config, EngineConfig, StorageConfig};
use crate::documents::events::spawn_redis_forwarder;
use crate::documents::queue::AnalysisQueue;
use crate::documents::registry::DocumentRegistry;
use crate::documents::service::DocumentService;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::{BlobStore, FsBlobStore, MemoryBlobStore, S3BlobStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log,
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resume API v{}", env!("CARGO_PKG_VERSION"));

    let store = build_store(&config).await?;
    info!("Blob storage initialized (backend: {})", store.backend());

    let engine = build_engine(&config)?;
    info!("Analysis engine initialized ({})", engine.name());

    let registry = Arc::new(DocumentRegistry::new());

    let queue = Arc::new(AnalysisQueue::new(
        registry.clone(),
        store.clone(),
        engine,
        config.analysis_timeout,
    ));
    let workers = queue.spawn_workers(config.worker_pool_size);

    // Optional: mirror document events to Redis pub/sub
    if let Some(url) = &config.redis_url {
        let redis = redis::Client::open(url.as_str()).context("Invalid REDIS_URL")?;
        spawn_redis_forwarder(redis, registry.subscribe()).await?;
    }

    let documents = Arc::new(DocumentService::new(
        registry.clone(),
        store,
        config.transfer_chunk_bytes,
    ));

    let state = AppState {
        documents,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let in-flight analyses finish; queued documents stay queued.
    registry.close();
    for worker in workers {
        let _ = worker.await;
    }
    info!("Shutdown complete");

    Ok(())
}

async fn build_store(config: &Config) -> Result<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match &config.storage {
        StorageConfig::Memory => Arc::new(MemoryBlobStore::new()),
        StorageConfig::Fs { dir } => Arc::new(
            FsBlobStore::new(dir.clone())
                .await
                .with_context(|| format!("Cannot use storage directory {}", dir.display()))?,
        ),
        StorageConfig::S3(settings) => Arc::new(S3BlobStore::connect(settings).await),
    };
    Ok(store)
}

fn build_engine(config: &Config) -> Result<Arc<dyn AnalysisEngine>> {
    let engine: Arc<dyn AnalysisEngine> = match &config.engine {
        EngineConfig::Http { url } => Arc::new(HttpAnalysisEngine::new(url.clone())),
        EngineConfig::Llm { anthropic_api_key } => {
            let llm = LlmClient::new(anthropic_api_key.clone())
                .context("Failed to build LLM client")?;
            info!("LLM client initialized (model: {})", llm_client::MODEL);
            Arc::new(LlmAnalysisEngine::new(llm))
        }
    };
    Ok(engine)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
