mod business_logic;
mod errors;
mod handlers;
mod models;
mod services;
mod state;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use validator::Validate;

use crate::business_logic::config::TradingConfig;
use crate::services::book_state::{BookStateInner, SharedBookState};
use crate::services::engine_worker::EngineWorker;
use crate::services::store::MemoryStore;
use crate::state::AppState;

const DEFAULT_ADDR: &str = "0.0.0.0:3000";
const EVENT_QUEUE_CAPACITY: usize = 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::bars::post_bar,
        handlers::executions::post_execution,
        handlers::book::get_book,
        handlers::book::get_book_stream,
        handlers::audit::get_audit
    ),
    components(schemas(
        models::book::HealthResponse,
        models::book::BookSnapshot,
        models::book::PositionStatus,
        models::book::AuditResponse,
        models::requests::ClosedBarRequest,
        models::requests::ExecutionReport,
        models::requests::AcceptedResponse,
        models::position::ClosedTrade,
        models::audit::AuditEntry,
        errors::ErrorResponse
    ))
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Keep the file writer alive for the life of the process
    let _log_guard = init_tracing();

    let config = load_config()?;

    // Shared read state for the book and audit trail
    let (broadcaster, _receiver) = broadcast::channel(16);
    let book: SharedBookState = Arc::new(BookStateInner::new(config.audit_capacity, broadcaster));

    // Single writer: handlers only enqueue, the worker applies
    let (events, receiver) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let worker_state = book.clone();

    tokio::spawn(async move {
        let mut worker = EngineWorker::new(config, MemoryStore::new(), worker_state);

        tracing::info!("Restoring engine state...");
        if let Err(e) = worker.warmup().await {
            tracing::error!("Warmup failed: {}", e);
            return;
        }

        tracing::info!("Engine worker active");
        worker.run(receiver).await;
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/bars", post(handlers::bars::post_bar))
        .route("/executions", post(handlers::executions::post_execution))
        .route("/book", get(handlers::book::get_book))
        .route("/book/stream", get(handlers::book::get_book_stream))
        .route("/audit", get(handlers::audit::get_audit))
        .with_state(AppState { book, events })
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let addr = std::env::var("PERPTRADER_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Server running on http://{}", addr);
    tracing::info!("Swagger UI: http://{}/swagger-ui", addr);
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "perptrader=info".into());

    match std::env::var("PERPTRADER_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "perptrader.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            None
        }
    }
}

fn load_config() -> anyhow::Result<TradingConfig> {
    match std::env::var("PERPTRADER_CONFIG") {
        Ok(path) => {
            let config = TradingConfig::from_json_file(Path::new(&path))?;
            tracing::info!("Loaded trading config from {}", path);
            Ok(config)
        }
        Err(_) => {
            let config = TradingConfig::default();
            config
                .validate()
                .context("default trading config failed validation")?;
            Ok(config)
        }
    }
}
