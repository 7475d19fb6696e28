use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use flowboard_api::state::AppState;

/// Background task that prunes expired magic tokens.
///
/// Runs on an interval. Expired tokens already fail verification, so
/// this only keeps the table small; nothing depends on its cadence.
pub async fn run_sweep_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match state.db.sweep_expired_tokens(Utc::now().timestamp_millis()) {
            Ok(count) => {
                if count > 0 {
                    info!("Sweep: removed {} expired magic tokens", count);
                }
            }
            Err(e) => {
                warn!("Sweep error: {}", e);
            }
        }
    }
}
