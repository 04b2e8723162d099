//! Google Sheets export: connection record, sync settings, API client, token upkeep, the
//! sync engine and its scheduler.

pub mod client;
pub mod connection;
pub mod rows;
pub mod scheduler;
pub mod settings;
pub mod sync;
mod workers;

pub use client::{CreatedSpreadsheet, RefreshAttempt, SheetsApi, TokenManager};
pub use connection::GoogleConnection;
pub use scheduler::{CronOutcome, ScheduleStatus, SyncSchedulerHandle};
pub use settings::{SyncInterval, SyncMode, SyncSettings, SyncSettingsPatch};
pub use sync::{SyncEngine, SyncResult, SyncStats};

use chrono::FixedOffset;
use ractor::ActorProcessingErr;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::GoogleSheetsConfig;
use crate::db::DbActorHandle;
use crate::leads::LeadEvents;

const USER_AGENT: &str = concat!("formychat/", env!("CARGO_PKG_VERSION"));

/// Outbound client shared by the Sheets API and the token manager.
pub fn build_http_client(cfg: &GoogleSheetsConfig) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(10))
        .timeout(cfg.request_timeout());

    if let Some(proxy_url) = cfg.proxy.as_ref() {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
    }
    builder.build()
}

/// Everything the Google Sheets integration needs at runtime.
#[derive(Clone)]
pub struct GoogleSheets {
    pub tokens: TokenManager,
    pub engine: SyncEngine,
    pub scheduler: SyncSchedulerHandle,
    cfg: Arc<GoogleSheetsConfig>,
}

impl GoogleSheets {
    pub async fn spawn(
        db: DbActorHandle,
        http: reqwest::Client,
        cfg: Arc<GoogleSheetsConfig>,
        offset: FixedOffset,
    ) -> Result<Self, ActorProcessingErr> {
        let tokens = TokenManager::new(http.clone(), cfg.clone(), db.clone());
        let api = SheetsApi::new(http, cfg.clone(), db.clone(), tokens.clone());
        let engine = SyncEngine::new(db.clone(), api, cfg.clone(), offset);
        let scheduler = SyncSchedulerHandle::spawn(db, engine.clone()).await?;

        info!(
            sheets_api_base = %cfg.sheets_api_base,
            refresh_endpoint = %cfg.refresh_endpoint,
            premium = cfg.premium,
            free_limit = cfg.free_limit,
            "Google Sheets integration initialized"
        );

        Ok(Self {
            tokens,
            engine,
            scheduler,
            cfg,
        })
    }

    pub fn api(&self) -> &SheetsApi {
        self.engine.api()
    }

    /// Starts the token refresher and the realtime lead listener.
    pub fn start_workers(&self, events: &LeadEvents) -> Vec<JoinHandle<()>> {
        vec![
            workers::spawn_token_refresher(self.tokens.clone(), self.cfg.token_check_interval()),
            workers::spawn_realtime_listener(events, self.engine.clone()),
        ]
    }
}
