pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod stores;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use crate::core::shutdown::{shutdown_signal, Shutdown};
use crate::core::{config::Settings, redis::RedisHandle, state::AppState, telemetry};
use crate::services::documents::StoredDocuments;
use crate::services::generation::OpenAiGenerationClient;
use crate::services::storage::StorageService;
use crate::services::Services;
use crate::stores::postgres::PgStore;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let redis = RedisHandle::new(settings.redis().redis_url());
    if let Err(err) = redis.connect().await {
        tracing::error!(error = %err, "Failed to connect to Redis; rate limits disabled");
    } else {
        tracing::info!("Redis connected successfully");
    }

    let storage = StorageService::from_settings(&settings).await;
    let documents = StoredDocuments::new(storage.clone(), &settings);
    let generation = OpenAiGenerationClient::from_settings(&settings)?;
    let services = Services::new(
        Arc::new(PgStore::new(db_pool.clone())),
        Arc::new(generation),
        Arc::new(documents),
        Duration::from_secs(settings.ingestion().job_timeout_seconds),
    );
    let state = AppState::new(settings, db_pool, redis.clone(), storage, services);

    let shutdown = Shutdown::new();
    let sweeper = tasks::scheduler::spawn(state.clone(), shutdown.subscribe());

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "LessonForge API listening"
    );

    let result = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await;

    shutdown.trigger();
    if let Err(err) = sweeper.await {
        tracing::error!(error = %err, "Stale job sweeper panicked");
    }

    redis.disconnect().await;
    tracing::info!("Redis disconnected");

    result?;

    Ok(())
}
