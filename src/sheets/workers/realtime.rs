use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::{debug, info, warn};

use crate::leads::LeadEvents;
use crate::sheets::sync::SyncEngine;

/// Pushes each new lead when the sync mode is realtime. Failures never reach the submitter.
pub fn spawn_realtime_listener(events: &LeadEvents, engine: SyncEngine) -> JoinHandle<()> {
    let mut stream = BroadcastStream::new(events.subscribe());
    tokio::spawn(async move {
        info!("Realtime Google Sheets listener started");
        while let Some(item) = stream.next().await {
            let event = match item {
                Ok(event) => event,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Realtime listener lagged; leads left for the next batch pass");
                    continue;
                }
            };
            match engine.handle_realtime_sync(event.lead_id).await {
                Ok(pushed) => debug!(lead_id = event.lead_id, pushed, "Realtime sync handled"),
                Err(e) => warn!(lead_id = event.lead_id, error = %e, "Realtime sync failed"),
            }
        }
        info!("Realtime Google Sheets listener stopped");
    })
}
