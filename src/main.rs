//! Application entry point.

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use trade_export_gateway::api::create_router;
use trade_export_gateway::app::{AppState, ExportConfig};
use trade_export_gateway::infra::{PostgresConfig, PostgresRecordSource};

/// Application configuration
struct Config {
    database_url: String,
    host: String,
    port: u16,
    export: ExportConfig,
}

impl Config {
    fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL not set")?;
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let defaults = ExportConfig::default();
        let max_records = env::var("EXPORT_MAX_RECORDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_records);
        let stream_threshold = env::var("EXPORT_STREAM_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.stream_threshold);
        let batch_size = env::var("EXPORT_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.batch_size);

        Ok(Self {
            database_url,
            host,
            port,
            export: ExportConfig {
                max_records,
                stream_threshold,
                batch_size,
            },
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    info!("Trade Export Gateway v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let record_source =
        PostgresRecordSource::new(&config.database_url, PostgresConfig::default()).await?;
    record_source.run_migrations().await?;
    info!("Database connected and migrations applied");

    let state = AppState::new(Arc::new(record_source), config.export.clone());
    info!(
        max_records = config.export.max_records,
        stream_threshold = config.export.stream_threshold,
        "Export pipeline configured"
    );

    let router = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Server starting on http://{}", addr);
    info!("Swagger UI available at http://{}/swagger-ui", addr);
    info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
