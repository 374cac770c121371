//! Background task that closes sessions once their window has ended.
//!
//! Check-in evaluation already treats such sessions as closed; the sweep
//! makes the stored status catch up so listings and storage agree.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::state::SharedState;

/// Close every expired session once.
///
/// Returns the number of sessions closed. Persistence failures are logged
/// and retried on the next sweep.
pub async fn sweep_once(state: &SharedState) -> usize {
    let state_guard = state.read().await;
    match state_guard.registry.close_expired(Utc::now()) {
        Ok(closed) => {
            if !closed.is_empty() {
                info!(count = closed.len(), "Closed expired sessions");
            }
            closed.len()
        }
        Err(err) => {
            warn!(error = %err, "Failed to close expired sessions");
            0
        }
    }
}

/// Spawn the periodic sweep.
pub fn spawn(state: SharedState, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        debug!(interval_secs = interval.as_secs(), "Session sweep started");

        loop {
            ticker.tick().await;
            sweep_once(&state).await;
        }
    })
}
