use lettre::AsyncTransport;
use std::fmt::Display;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::{debug, info, warn};

use super::mailer::{LeadMailer, NotifyOutcome};
use crate::leads::LeadEvents;

/// Mails each new lead to the address its widget names. Failures are logged only.
pub fn spawn_email_notifier<T>(events: &LeadEvents, mailer: LeadMailer<T>) -> JoinHandle<()>
where
    T: AsyncTransport + Send + Sync + 'static,
    T::Ok: Send,
    T::Error: Display + Send,
{
    let mut stream = BroadcastStream::new(events.subscribe());
    tokio::spawn(async move {
        info!("Lead email notifier started");
        while let Some(item) = stream.next().await {
            let event = match item {
                Ok(event) => event,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Lead email notifier lagged; notifications dropped");
                    continue;
                }
            };
            match mailer.notify(&event).await {
                Ok(NotifyOutcome::Sent { to }) => {
                    info!(lead_id = event.lead_id, to = %to, "Lead notification sent");
                }
                Ok(NotifyOutcome::Skipped(reason)) => {
                    debug!(lead_id = event.lead_id, reason, "Lead notification skipped");
                }
                Err(e) => warn!(lead_id = event.lead_id, error = %e, "Lead notification failed"),
            }
        }
        info!("Lead email notifier stopped");
    })
}
