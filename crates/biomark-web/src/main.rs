//! BioMark Web Server
//!
//! Run with: cargo run -p biomark-web

use tracing::info;
use tracing_subscriber::EnvFilter;

use biomark_web::config::Config;
use biomark_web::router::build_router;
use biomark_web::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;
    let addr = config.socket_addr()?;
    info!(
        results_dir = %config.storage.results_dir.display(),
        strategy = %config.aggregation.strategy,
        top_n = config.aggregation.top_n,
        "Starting BioMark web server"
    );

    let app = build_router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
