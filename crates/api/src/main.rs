//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use cache::{CacheClient, InMemoryCache, RedisCache};
use fulfillment::tasks::{
    FailedTasks, FsDocumentStore, HttpShipmentNotifier, InMemoryShipmentNotifier,
    ShipmentNotifier, TaskExecutor, spawn_workers,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use store::{InMemoryStore, PostgresStore, Store};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = PrometheusBuilder::new().install_recorder()?;

    // 3. Cache backend
    let cache: Arc<dyn CacheClient> = match &config.redis_url {
        Some(url) => {
            let redis = RedisCache::connect(url, config.cache_key_prefix.clone()).await?;
            tracing::info!("connected to Redis cache");
            Arc::new(redis)
        }
        None => {
            tracing::warn!("REDIS_URL not set, using in-memory cache");
            Arc::new(InMemoryCache::new())
        }
    };

    // 4. Store of record
    match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url, config.database_max_connections).await?;
            store.run_migrations().await?;
            tracing::info!("connected to PostgreSQL, migrations applied");
            run(store, cache, &config, metrics_handle).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            run(InMemoryStore::new(), cache, &config, metrics_handle).await
        }
    }
}

async fn run<S: Store + Clone>(
    store: S,
    cache: Arc<dyn CacheClient>,
    config: &Config,
    metrics_handle: PrometheusHandle,
) -> Result<(), BoxError> {
    // 5. Deferred task workers
    let notifier: Arc<dyn ShipmentNotifier> = match &config.shipment_webhook_url {
        Some(url) => Arc::new(HttpShipmentNotifier::new(
            url.clone(),
            config.shipment_timeout,
        )?),
        None => {
            tracing::warn!("SHIPMENT_WEBHOOK_URL not set, shipment notices stay in memory");
            Arc::new(InMemoryShipmentNotifier::new())
        }
    };
    let failed_tasks = FailedTasks::new();
    let executor = TaskExecutor::new(
        store.clone(),
        Arc::new(FsDocumentStore::new(config.media_root.clone())),
        notifier,
        failed_tasks.clone(),
    );
    let (dispatcher, workers) = spawn_workers(Arc::new(executor), config.task_workers);

    // 6. Build the application
    let state = api::create_state(store, cache, config, Arc::new(dispatcher), failed_tasks);
    let app = api::create_app(state, metrics_handle);

    // 7. Start server
    let addr = config.addr();
    tracing::info!(%addr, workers = workers.size(), "starting API server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last dispatcher handle; workers now drain the queue.
    tracing::info!("waiting for deferred tasks");
    workers.shutdown().await;

    tracing::info!("server shut down gracefully");
    Ok(())
}
