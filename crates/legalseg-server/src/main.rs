//! LegalSeg — rhetorical-role analysis server for legal documents.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use legalseg_server::persist;
use legalseg_server::routes;
use legalseg_server::state::AppState;

fn resolve_data_dir() -> PathBuf {
    std::env::var("LEGALSEG_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = legalseg_core::LegalSegConfig::from_env(&data_dir)?;
    let port = config.port;

    let store = legalseg_store::CaseStore::open(&config.data_paths.casedb)
        .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?;

    let transport = Arc::new(legalseg_infer::HttpTransport::new(
        config.inference_base_url.clone(),
    ));
    let client = legalseg_infer::InferenceClient::new(transport);
    info!("Inference endpoint: {}", config.inference_base_url);

    let state = Arc::new(AppState::new(config, store, client));

    // Start the background persistence queue
    persist::start_persist_worker(state.clone());

    let app = routes::build_router(state.clone());

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("LegalSeg server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
