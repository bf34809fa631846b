//! Background task that expires reveal requests the oracle never answered.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::state::AppState;

pub async fn run(state: Arc<AppState>, cancel: CancellationToken) {
    let timeout = state.config.reveal_timeout_secs;
    if timeout == 0 {
        info!("Reveal request expiry disabled");
        return;
    }

    let mut interval = tokio::time::interval(Duration::from_secs(state.config.sweep_interval_secs.max(1)));
    info!(timeout, "Reveal request sweeper started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let expired = state.ledger().await.ledger.expire_stale_requests(timeout);
        for request in &expired {
            warn!(
                project_id = %request.project_id,
                request_id = %request.request_id,
                requested_at = request.requested_at,
                "Reveal request expired"
            );
        }
    }

    info!("Reveal request sweeper stopped");
}
