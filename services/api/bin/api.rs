//! Main Entrypoint for the Top-Down Learning API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Opening the SQLite store, running migrations and purging expired shares.
//! 3. Initializing shared services (text generator, curriculum engine, pipeline, analyzer).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use std::{net::SocketAddr, sync::Arc};
use topdown_api::{
    config::Config, db::Db, engine::CurriculumEngine, router::create_router, state::AppState,
};
use topdown_core::{
    code_analyzer::CodeAnalyzer,
    curriculum::LlmCurriculumGenerator,
    llm_client::{OpenAICompatibleClient, TextGenerator},
    pipeline::LearningPipeline,
    prompts::Prompts,
    session::SessionCoordinator,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", e);
        return;
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

    // --- 3. Initialize Database ---
    let db = Arc::new(
        Db::connect(&config.database_url)
            .await
            .context("Failed to open database")?,
    );
    db.run_migrations().await?;
    info!("Database connection established and migrations are up-to-date.");

    let purged = db
        .clean_expired_shared_sessions(config.shared_session_ttl_days)
        .await
        .context("Failed to purge expired shared sessions")?;
    info!(purged, "Shared sessions older than {} days removed.", config.shared_session_ttl_days);

    // --- 4. Initialize Shared Services ---
    let prompts = Arc::new(Prompts::load(&config.prompts_path)?);

    let api_key = config
        .api_key()
        .context("API key for the selected provider is not set")?;
    let openai_config = OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(config.provider.api_base());
    info!(provider = ?config.provider, "Text generation provider selected.");

    let llm: Arc<dyn TextGenerator> = Arc::new(OpenAICompatibleClient::new(
        openai_config,
        config.chat_model.clone(),
        config.generation_timeout,
    ));
    let generator = Arc::new(LlmCurriculumGenerator::new(llm.clone(), prompts.clone()));

    let app_state = Arc::new(AppState {
        engine: Arc::new(CurriculumEngine::new(db.clone(), generator)),
        pipeline: Arc::new(LearningPipeline::new(llm.clone(), prompts.clone())),
        analyzer: Arc::new(CodeAnalyzer::new(llm.clone(), prompts.clone())),
        db,
        llm,
        sessions: SessionCoordinator::in_memory(),
        prompts,
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
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
