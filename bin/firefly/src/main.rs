//! # Firefly Binary
//!
//! Assembles the core: settings, logging, database, roles, and the
//! background worker that drains the task queue until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use ff_config::{LogFormat, LogSettings, Settings};
use ff_db_sqlite::{roles, Database};
use ff_service::{AppState, TaskRunner};
use ff_tasks_local::{ChannelQueue, LogTransport, RetryPolicy, Worker};
use tracing_subscriber::EnvFilter;

fn init_tracing(log: &LogSettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log.level))
        .context("invalid log level")?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load settings")?;
    init_tracing(&settings.log)?;

    // 1. Database: schema and role presets
    let db = Database::connect(&settings.database.url, settings.database.max_connections).await?;
    db.migrate().await?;
    let mut tx = db.begin().await?;
    roles::insert_roles(&mut tx).await?;
    ff_db_sqlite::commit(tx).await?;

    // 2. Task queue: the service enqueues, the worker drains
    let (queue, receiver) = ChannelQueue::new();
    let policy = RetryPolicy::new(settings.tasks.max_attempts, settings.tasks.base_backoff_ms);
    let runner = TaskRunner::new(db.clone(), Arc::new(LogTransport));

    // 3. Core state; holding it keeps the queue open
    let state = AppState::with_default_plugins(db.clone(), Box::new(queue), settings);
    tracing::info!(per_page = state.per_page(), "🔥 Firefly core ready");

    Worker::new(Arc::new(runner), policy)
        .run(receiver, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "cannot listen for shutdown signal");
            }
        })
        .await;

    drop(state);
    db.close().await;
    tracing::info!("Firefly stopped");
    Ok(())
}
