//! parley-server - Conversational front-end for a locally hosted language model.
//!
//! An HTTP service that relays chat turns to an Ollama backend and keeps
//! per-session message history in memory:
//! - In-memory session store with bounded retention and idle expiry
//! - Context projection from stored turns to backend role/content pairs
//! - Ollama client with a fixed tutor persona and explicit failure kinds
//! - JSON API for starting, continuing, inspecting, and clearing conversations

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod context;
pub mod error;
pub mod provider;
pub mod routes;
pub mod session;
pub mod sweep;

pub use context::build_context;
pub use error::ServerError;
pub use provider::{ChatMessage, InferenceError, OllamaClient, FALLBACK_GREETING};
pub use routes::{build_router, AppState};
pub use session::{Role, Session, SessionStore, Turn};
pub use sweep::SweepTask;

use std::net::SocketAddr;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use parley_common::config::Config;

/// Wait for Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

/// Start the server: probe the backend, spawn the expiry sweep, and serve
/// the API until interrupted.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    start_server_with_shutdown(config, shutdown_signal()).await
}

/// Like [`start_server`], but shutting down when `shutdown` resolves
/// instead of on Ctrl+C. The expiry sweep is cancelled once the server
/// has drained.
pub async fn start_server_with_shutdown(
    config: &Config,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let ollama = OllamaClient::from_config(&config.ollama);

    let status = ollama.test_connection().await;
    if !status.connected {
        tracing::warn!(
            url = %ollama.base_url(),
            "Ollama is not reachable; chat requests will fail until it is running"
        );
    } else if !status.model_available {
        tracing::warn!(
            model = %ollama.model(),
            available = ?status.available_models,
            "Configured model not found on the backend"
        );
    } else {
        tracing::info!(model = %ollama.model(), "Ollama connection verified");
    }

    let store = SessionStore::new(config.session.max_messages);
    let sweep = SweepTask::spawn(
        store.clone(),
        Duration::from_secs(config.session.sweep_interval_secs),
        chrono::Duration::seconds(config.session.max_age_secs),
    );

    let state = AppState { store, ollama };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = build_router(state).layer(cors);

    let addr = SocketAddr::from((
        config.server.bind.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    tracing::info!("Starting Parley server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    // Clean up on shutdown
    tracing::info!("Server stopped, cancelling expiry sweep");
    sweep.shutdown();

    Ok(())
}
