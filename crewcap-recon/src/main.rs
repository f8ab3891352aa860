//! crewcap-recon - Capacity Reconciliation Service
//!
//! Tracks how many hours each person is allocated to each project in the
//! current week and keeps that picture consistent as data arrives from
//! manual edits, spreadsheet imports and reviewed transcript extractions.

use anyhow::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crewcap_recon::AppState;

const LISTEN_ADDR: &str = "127.0.0.1:5810";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting crewcap-recon (Capacity Reconciliation) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Resolve and create the root folder, then open the database
    let cli_root = std::env::args().nth(1);
    let root_folder = crewcap_common::config::resolve_root_folder(cli_root.as_deref());
    let db_path = crewcap_common::config::ensure_root_folder(&root_folder)
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;
    info!("Database: {}", db_path.display());

    let db_pool = crewcap_recon::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    let state = AppState::new(db_pool);
    let app = crewcap_recon::build_router(state);

    let listener = tokio::net::TcpListener::bind(LISTEN_ADDR).await?;
    info!("Listening on http://{}", LISTEN_ADDR);
    info!("Health check: http://{}/health", LISTEN_ADDR);

    axum::serve(listener, app).await?;

    Ok(())
}
