use complaint_service::{
    build_router,
    config::ServiceConfig,
    services::{
        EmailService, GeminiSummarizer, MongoComplaintStore, MongoDb, MongoUserDirectory,
        Summarizer,
    },
    AppState,
};
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = ServiceConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting complaint service"
    );

    let db = MongoDb::connect(&config.mongodb.uri, &config.mongodb.database).await?;
    db.initialize_indexes().await?;
    tracing::info!("Database initialized successfully");

    let email = EmailService::new(&config.gmail)?;

    let summarizer: Option<Arc<dyn Summarizer>> = match GeminiSummarizer::from_config(&config.gemini)
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?
    {
        Some(gemini) => {
            tracing::info!(model = %config.gemini.model, "Gemini summarizer enabled");
            Some(Arc::new(gemini))
        }
        None => {
            tracing::warn!("GEMINI_API_KEY not set; AI analysis will use the local fallback");
            None
        }
    };

    let state = AppState::new(
        config.clone(),
        Arc::new(MongoUserDirectory::new(db.clone())),
        Arc::new(MongoComplaintStore::new(db)),
        Arc::new(email),
        summarizer,
    );

    if let Some(seed) = &config.super_admin {
        state.users.seed_super_admin(seed).await?;
    }

    let app = build_router(state).await?;

    let addr = config.common.socket_addr();

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
