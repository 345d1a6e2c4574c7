//! Main Entrypoint for the Vidya API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the persona prompts.
//! 3. Constructing the Gemini Live connector and the Axum router.
//! 4. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use gemini_realtime::GeminiLiveConnector;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use vidya_api::{config::Config, prompts::Prompts, router::create_router, state::AppState};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
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

    if !config.static_dir.is_dir() {
        warn!(static_dir = %config.static_dir.display(), "Static directory not found.");
    }

    // --- 3. Load Prompts ---
    let prompts = if config.prompts_path.is_dir() {
        Prompts::load(&config.prompts_path)?
    } else {
        info!(
            prompts_path = %config.prompts_path.display(),
            "No prompts directory. Using built-in persona."
        );
        Prompts::default()
    };

    // --- 4. Initialize Shared Services ---
    let connector = Arc::new(
        GeminiLiveConnector::new(config.api_version.clone(), config.setup_timeout)
            .with_base_url(config.base_url.clone()),
    );
    let app_state = Arc::new(AppState::new(config.clone(), connector, prompts));
    if !app_state.negotiator.has_credential() {
        warn!("GEMINI_API_KEY is not set. Every connection will be refused.");
    }

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        model = %config.model,
        api_version = %config.api_version,
        transcription = config.transcription,
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
