use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

use crate::state::SharedState;

/// Periodically drop sessions that are over or abandoned.
pub async fn run_reclaimer(state: SharedState) {
    let mut ticker = interval(state.config().reclaim_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let reclaimed = state.registry().sweep();
        debug!(reclaimed, live = state.registry().len(), "session sweep finished");
    }
}
