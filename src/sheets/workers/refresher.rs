use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::sheets::client::{RefreshAttempt, TokenManager};

/// Wakes every `check_every` and lets the token manager decide whether a refresh is due.
/// The first check runs immediately.
pub fn spawn_token_refresher(tokens: TokenManager, check_every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            check_every_secs = check_every.as_secs(),
            "Google Sheets token refresher started"
        );
        let mut ticker = interval(check_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match tokens.maybe_refresh_token().await {
                Ok(RefreshAttempt::Refreshed) => info!("Background token refresh succeeded"),
                Ok(RefreshAttempt::Failed(e)) if e.is_revocation() => {
                    warn!(error = %e, "Google Sheets connection revoked; waiting for reconnect");
                }
                Ok(RefreshAttempt::Failed(e)) => warn!(error = %e, "Background token refresh failed"),
                Ok(other) => debug!(outcome = ?other, "Token refresh not needed"),
                Err(e) => warn!(error = %e, "Token refresh check failed"),
            }
        }
    })
}
