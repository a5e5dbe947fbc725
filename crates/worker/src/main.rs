use std::sync::Arc;

use anyhow::Context;
use lullaby_pipeline::store::PgGenerationStore;
use lullaby_pipeline::{Pipeline, PipelineConfig, Providers};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lullaby_worker::cancellation::CancellationRegistry;
use lullaby_worker::config::WorkerConfig;
use lullaby_worker::dispatcher::JobNotifier;
use lullaby_worker::shutdown::shutdown_signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lullaby_worker=debug,lullaby_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let worker_config = WorkerConfig::from_env();
    let pipeline_config = PipelineConfig::from_env();
    tracing::info!(
        concurrency = worker_config.concurrency,
        text_provider = ?pipeline_config.text_provider,
        "Loaded worker configuration",
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = lullaby_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    lullaby_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    lullaby_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database ready");

    // --- Pipeline ---
    let providers = Providers::from_config(&pipeline_config).context("Failed to build providers")?;
    let store = Arc::new(PgGenerationStore::new(pool.clone()));
    let pipeline = Arc::new(Pipeline::new(
        &providers,
        store,
        pipeline_config.stage_timeouts,
    ));

    // --- Worker ---
    let registry = Arc::new(CancellationRegistry::new());
    let worker = lullaby_worker::spawn(
        pool.clone(),
        pipeline,
        registry,
        JobNotifier::new(),
        &worker_config,
    );

    shutdown_signal().await;
    worker.shutdown().await;
    pool.close().await;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}
