//! Main Entrypoint for the Salescoach API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Constructing the practice backend and speech capability.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use salescoach_api::{
    config::{BackendKind, Config},
    router::create_router,
    state::AppState,
};
use salescoach_core::{
    backend::{HttpPracticeBackend, PracticeBackend, StubPracticeBackend},
    speech::{NoSpeechCapture, SpeechCapture},
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Shared Services ---
    let backend: Arc<dyn PracticeBackend> = match &config.backend {
        BackendKind::Stub => {
            info!("Using the in-memory stub backend.");
            Arc::new(StubPracticeBackend::new())
        }
        BackendKind::Http => {
            let url = config
                .practice_api_url
                .as_ref()
                .context("PRACTICE_API_URL is required for the http backend")?;
            info!(url = %url, "Using the HTTP practice backend.");
            Arc::new(HttpPracticeBackend::new(url.clone()))
        }
    };

    // This process has no recognizer of its own; hosts that embed one
    // supply their own `SpeechCapture` adapter. With none available the
    // gateway advertises no voice controls at all.
    let speech: Arc<dyn SpeechCapture> = Arc::new(NoSpeechCapture);

    let app_state = Arc::new(AppState {
        backend,
        speech,
        config: Arc::new(config.clone()),
    });

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        backend = ?config.backend,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
