use anyhow::{Context, Result};
use clap::Parser;
use todo_service::{app, logging, AppState, Args, Config};
use todo_store_sqlite::SqliteItemStore;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from(Args::parse());
    logging::init(&config.log_filter)?;

    let store = SqliteItemStore::open(&config.db_path, config.operation_timeout)?;
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!(
        addr = %config.bind,
        env = config.environment.as_str(),
        db = %config.db_path.display(),
        "starting server"
    );
    axum::serve(listener, app(AppState::new(config, store)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("stopped server");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutting down server"),
        Err(err) => tracing::error!(error = %err, "failed to listen for shutdown signal"),
    }
}
