use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{
    services::{check_eligibility, get_verification, health, latest_for_job, submit_verification},
    state::AppState,
};
use crate::config::Config;
use crate::erp::{ErpApi, ErpClient};
use crate::llm::{DocumentVerifier, LlmClient};
use crate::observability::Metrics;
use crate::queue::{QueueListener, QueueStore, VerifyBroker};
use crate::render::{HttpPageRenderer, PageRenderer};
use crate::state::StateStore;
use crate::verify::Orchestrator;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Composition root: construct every component once, wire the listener pool,
/// and serve the HTTP adapter until shutdown.
pub async fn run(address: Option<SocketAddr>, data_dir: Option<PathBuf>) -> Result<(), AnyError> {
    info!("Loading configuration");
    let mut config = Config::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(data_dir) = data_dir {
        config.server.data_dir = data_dir;
    }
    let address = address.unwrap_or(config.server.bind_addr);

    info!(path = %config.server.state_path().display(), "Opening state store");
    let store = StateStore::open(config.server.state_path())
        .map_err(|e| format!("Failed to open state store: {e}"))?;

    info!(path = %config.server.queue_path().display(), "Opening queue");
    let queue = Arc::new(
        QueueStore::open(config.server.queue_path())
            .map_err(|e| format!("Failed to open queue: {e}"))?,
    );

    let erp: Arc<dyn ErpApi> = Arc::new(
        ErpClient::new(&config.erp, config.verification.writeback_max_retries)
            .map_err(|e| format!("Failed to build ERP client: {e}"))?,
    );
    let verifier: Arc<dyn DocumentVerifier> = Arc::new(
        LlmClient::new(&config.llm).map_err(|e| format!("Failed to build LLM client: {e}"))?,
    );
    let renderer: Arc<dyn PageRenderer> = Arc::new(
        HttpPageRenderer::new(&config.render)
            .map_err(|e| format!("Failed to build page renderer: {e}"))?,
    );

    let metrics = Arc::new(Metrics::new());
    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        erp.clone(),
        verifier,
        renderer,
        metrics.clone(),
        config.verification.clone(),
    ));

    let (broker, receivers) = VerifyBroker::new(
        queue.clone(),
        config.queue.workers,
        config.queue.channel_capacity,
    );
    let broker = Arc::new(broker);

    let listener_pool = Arc::new(QueueListener::new(
        store.clone(),
        queue.clone(),
        orchestrator,
        metrics.clone(),
    ));
    let listener_handles = QueueListener::spawn(listener_pool, receivers);
    info!(workers = listener_handles.len(), "Listener pool running");

    let state = AppState::new(config, store, queue, broker, erp, metrics);
    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "Second-check API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for handle in listener_handles {
        handle.abort();
    }

    Ok(())
}

/// Route table, shared with the integration tests.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/verify", post(submit_verification))
        .route("/verify/{id}", get(get_verification))
        .route("/verify/job/{job_no}/latest", get(latest_for_job))
        .route("/verify/check-eligibility/{job_no}", get(check_eligibility))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
