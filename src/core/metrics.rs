use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled || PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);

    metrics::describe_counter!("ingestion_jobs_total", "Chapter ingestion jobs by final status");
    metrics::describe_histogram!(
        "ingestion_duration_seconds",
        "Wall time from job pickup to terminal status"
    );
    metrics::describe_counter!("mastery_updates_total", "Mastery record updates by correctness");
    metrics::describe_counter!("spin_rewards_total", "Spin wheel rewards by kind");
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}
