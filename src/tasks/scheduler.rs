use tokio::sync::watch;
use tokio::time::{interval, Duration};

use crate::core::state::AppState;

/// Grace added to the job timeout before a `processing` job counts as stale.
const STALE_GRACE_SECONDS: u64 = 60;

pub(crate) fn spawn(
    state: AppState,
    shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(sweep_stale_jobs_loop(state, shutdown))
}

async fn sweep_stale_jobs_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let ingestion = state.settings().ingestion();
    let mut tick = interval(Duration::from_secs(ingestion.sweep_interval_seconds.max(1)));
    let max_age = time::Duration::seconds(
        i64::try_from(ingestion.job_timeout_seconds.saturating_add(STALE_GRACE_SECONDS))
            .unwrap_or(i64::MAX),
    );

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                match state.services().ingestion.fail_stale(max_age).await {
                    Ok(0) => {}
                    Ok(count) => tracing::warn!(count, "Failed stale ingestion jobs"),
                    Err(err) => tracing::error!(error = %err, "sweep_stale_jobs failed"),
                }
            }
        }
    }
}
