//! Results/run backend: serves the exported results and runs the training
//! job on request.

pub mod routes;
pub mod runner;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;

pub use routes::create_router;
pub use runner::JobRunner;

pub async fn serve(config: ServerConfig) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.port);
    info!(
        results = %config.results_path.display(),
        script = %config.script.display(),
        "Results backend configured"
    );
    let app = create_router(config);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("🎯 Results backend listening on {}", addr);
    info!("  GET  /api/td3-results  - last results");
    info!("  POST /api/run-td3      - run model (body: {{ episodes?: number }})");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
