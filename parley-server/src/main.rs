//! Parley server entry point.

use anyhow::Result;
use parley_common::config::Config;
use parley_common::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("Parley Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        ollama = %config.ollama.base_url,
        model = %config.ollama.model,
        "Inference backend configured"
    );

    parley_server::start_server(&config).await
}
