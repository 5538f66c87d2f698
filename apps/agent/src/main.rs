//! Hisho desktop agent entry point.

mod app;
mod config;
mod display;
mod voice;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting Hisho agent"
    );

    // Load configuration.
    let config = config::Config::load()?;
    tracing::info!(
        ws_url = %config.backend.ws_url,
        ws_url_alt = %config.backend.ws_url_alt,
        "configuration loaded"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config))?;

    tracing::info!("agent shut down cleanly");
    Ok(())
}
