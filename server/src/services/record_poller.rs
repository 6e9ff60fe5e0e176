use tracing::{info, warn};

use crate::config::record_poll_interval;
use crate::services::map_actor::MapCommand;
use crate::state::AppState;

pub async fn run(state: AppState) {
    let mut interval = tokio::time::interval(record_poll_interval());

    loop {
        interval.tick().await;
        if !poll_once(&state).await {
            break;
        }
    }
}

/// Fetch the current record set and hand it to the map actor. Returns false
/// once the actor has stopped.
pub(crate) async fn poll_once(state: &AppState) -> bool {
    state.observability.record_poll();
    let records = match state.record_source.fetch(&state.record_query).await {
        Ok(records) => records,
        Err(e) => {
            state.observability.record_poll_failure();
            warn!(error = %e, "failed to fetch checkpoint records; keeping previous set");
            return true;
        }
    };

    info!(count = records.len(), "fetched checkpoint records");
    if state
        .commands
        .send(MapCommand::ReplaceRecords { records })
        .await
        .is_err()
    {
        warn!("map actor stopped; record poller exiting");
        return false;
    }
    true
}
