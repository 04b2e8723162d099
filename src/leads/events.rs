use super::LeadSubmission;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

const CHANNEL_CAPACITY: usize = 256;

/// Announced after a lead row is written.
#[derive(Debug, Clone)]
pub struct LeadCreated {
    pub lead_id: i64,
    pub submission: Arc<LeadSubmission>,
}

/// In-process fan-out of [`LeadCreated`]. Slow subscribers lose the oldest events.
#[derive(Clone)]
pub struct LeadEvents {
    tx: broadcast::Sender<LeadCreated>,
}

impl Default for LeadEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl LeadEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LeadCreated> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: LeadCreated) {
        let lead_id = event.lead_id;
        // No subscribers is fine.
        let receivers = self.tx.send(event).unwrap_or(0);
        trace!(lead_id, receivers, "lead_created published");
    }
}
