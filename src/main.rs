use anyhow::{Context, Result};
use tracing::info;

use seminar_metrics::api::{self, AppState};
use seminar_metrics::config::AppConfig;
use seminar_metrics::logging;
use seminar_metrics::store::SqliteEventStore;

/// Seminar metrics HTTP API
/// Events live in SQLite; every metric is derived on read
#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let store = SqliteEventStore::open(&config.db_path)
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;
    info!(
        db = %config.db_path.display(),
        include_planning_fees = config.income.include_planning_fees,
        "event store ready"
    );

    let addr = config.bind_addr;
    let app = api::router(AppState::new(store, config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
