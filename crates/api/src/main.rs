use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use lullaby_core::retry::RetryPolicy;
use lullaby_pipeline::config::StorageConfig;
use lullaby_pipeline::store::PgGenerationStore;
use lullaby_pipeline::{Pipeline, PipelineConfig, Providers};
use lullaby_worker::cancellation::CancellationRegistry;
use lullaby_worker::config::WorkerConfig;
use lullaby_worker::dispatcher::JobNotifier;
use lullaby_worker::shutdown::shutdown_signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lullaby_api::config::ServerConfig;
use lullaby_api::router::build_app_router;
use lullaby_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "lullaby_api=debug,lullaby_pipeline=debug,lullaby_worker=debug,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let pipeline_config = PipelineConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        embedded_worker = config.embedded_worker,
        "Loaded server configuration",
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = lullaby_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    lullaby_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    lullaby_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Providers ---
    let providers = Providers::from_config(&pipeline_config).expect("Failed to build providers");
    let local_assets = match &pipeline_config.storage {
        StorageConfig::Local { root, .. } => Some(root.clone()),
        StorageConfig::Supabase { .. } => None,
    };

    // --- Embedded worker ---
    let registry = Arc::new(CancellationRegistry::new());
    let notifier = JobNotifier::new();
    let worker = if config.embedded_worker {
        let worker_config = WorkerConfig {
            shutdown_grace: Duration::from_secs(config.shutdown_timeout_secs),
            ..WorkerConfig::from_env()
        };
        let store = Arc::new(PgGenerationStore::new(pool.clone()));
        let pipeline = Arc::new(Pipeline::new(
            &providers,
            store,
            pipeline_config.stage_timeouts,
        ));
        tracing::info!(concurrency = worker_config.concurrency, "Starting embedded worker");
        Some(lullaby_worker::spawn(
            pool.clone(),
            pipeline,
            Arc::clone(&registry),
            notifier.clone(),
            &worker_config,
        ))
    } else {
        tracing::info!("Embedded worker disabled; jobs run in lullaby-worker");
        None
    };

    // --- App state ---
    let state = AppState {
        pool: pool.clone(),
        config: Arc::new(config.clone()),
        storage: providers.storage.clone(),
        notifier,
        registry,
        status_retry: RetryPolicy::default(),
    };

    let app = build_app_router(state, &config, local_assets.as_deref());

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    if let Some(worker) = worker {
        worker.shutdown().await;
    }
    pool.close().await;

    tracing::info!("Graceful shutdown complete");
}
