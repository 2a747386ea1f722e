use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use overseer_events::{EventBus, EventPersistence};
use overseer_orchestrator::{dispatcher, supervisor, OrchestratorConfig};
use overseer_worker::{ConnectionManager, FsArtifactStore, Worker};

/// Number of worker loops to run in this process.
const DEFAULT_WORKER_COUNT: usize = 4;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "overseer_worker=debug,overseer_orchestrator=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let pool = overseer_db::create_pool(&database_url).await?;
    overseer_db::MIGRATOR.run(&pool).await?;

    let config = OrchestratorConfig::from_env();
    let worker_count: usize = std::env::var("OVERSEER_WORKER_COUNT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_WORKER_COUNT);
    let artifact_root = std::env::var("OVERSEER_ARTIFACT_DIR")
        .unwrap_or_else(|_| "/var/lib/overseer/artifacts".to_string());
    let node_name =
        std::env::var("OVERSEER_NODE_NAME").unwrap_or_else(|_| "overseer".to_string());

    let bus = Arc::new(EventBus::default());
    let cancel = CancellationToken::new();
    let mut tasks = Vec::new();

    tasks.push(tokio::spawn(EventPersistence::run(
        pool.clone(),
        bus.subscribe(),
    )));
    tasks.push(tokio::spawn(dispatcher::run(
        pool.clone(),
        config.clone(),
        bus.clone(),
        cancel.clone(),
    )));
    tasks.push(tokio::spawn(supervisor::run(
        pool.clone(),
        config.clone(),
        bus.clone(),
        cancel.clone(),
    )));

    let connections = Arc::new(ConnectionManager::new(config.connect_attempts));
    let artifacts = Arc::new(FsArtifactStore::new(artifact_root));
    for i in 0..worker_count {
        let worker = Worker::new(
            format!("{node_name}-{i}"),
            pool.clone(),
            config.clone(),
            bus.clone(),
            connections.clone(),
            artifacts.clone(),
        );
        tasks.push(tokio::spawn(worker.run(cancel.clone())));
    }

    tracing::info!(workers = worker_count, "Overseer worker node started");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    cancel.cancel();
    // Dropping the last bus handle closes the broadcast channel, which
    // lets the persistence task drain and exit.
    drop(bus);

    for task in tasks {
        let _ = task.await;
    }
    Ok(())
}
