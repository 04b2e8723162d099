use ahash::AHashMap;
use chrono::{DateTime, FixedOffset, SubsecRound, Utc};
use moka::sync::Cache;
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::client::SheetsApi;
use super::connection::GoogleConnection;
use super::rows::{self, RowBuilder};
use super::settings::{SyncMode, SyncSettingsPatch, load_settings, update_settings};
use crate::config::GoogleSheetsConfig;
use crate::db::{DbActorHandle, GOOGLE_SHEETS_INTEGRATION_ID, LeadCount};
use crate::error::FormyChatError;

const WIDGET_NAMES_TTL: Duration = Duration::from_secs(60);

/// Outcome of a sync pass. Remote failures are reported here, not as `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub success: bool,
    pub synced: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncResult {
    pub fn ok(synced: u64) -> Self {
        Self {
            success: true,
            synced,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            synced: 0,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncStats {
    pub total: u64,
    pub synced: u64,
    pub pending: u64,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_count: u64,
    pub last_error: Option<String>,
}

struct SyncEngineInner {
    db: DbActorHandle,
    api: SheetsApi,
    cfg: Arc<GoogleSheetsConfig>,
    offset: FixedOffset,
    /// Held for the whole of a pass so two passes never append the same rows.
    lease: Mutex<()>,
    widget_names: Cache<(), Arc<AHashMap<i64, String>>>,
}

/// Pushes unsynced leads to the selected spreadsheet.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<SyncEngineInner>,
}

impl SyncEngine {
    pub fn new(
        db: DbActorHandle,
        api: SheetsApi,
        cfg: Arc<GoogleSheetsConfig>,
        offset: FixedOffset,
    ) -> Self {
        let widget_names = Cache::builder()
            .max_capacity(1)
            .time_to_live(WIDGET_NAMES_TTL)
            .build();
        Self {
            inner: Arc::new(SyncEngineInner {
                db,
                api,
                cfg,
                offset,
                lease: Mutex::new(()),
                widget_names,
            }),
        }
    }

    pub fn api(&self) -> &SheetsApi {
        &self.inner.api
    }

    /// Forget cached widget names after a widget is renamed or removed.
    pub fn invalidate_widget_names(&self) {
        self.inner.widget_names.invalidate_all();
    }

    /// Batch pass. With `full_resync` every lead is pushed again into a freshly prepared sheet.
    pub async fn sync_leads(&self, full_resync: bool) -> Result<SyncResult, FormyChatError> {
        let _lease = self.inner.lease.lock().await;
        let db = &self.inner.db;

        if !db.integration_enabled(GOOGLE_SHEETS_INTEGRATION_ID).await? {
            return Ok(SyncResult::failed("Google Sheets integration is disabled."));
        }
        let settings = load_settings(db).await?;
        if !settings.has_spreadsheet() {
            return Ok(SyncResult::failed("No spreadsheet selected."));
        }

        if full_resync {
            let reset = db.reset_sync_status().await?;
            debug!(reset, "Cleared sync markers for full resync");
        }

        let limit = self.pending_limit().await?;
        if limit == Some(0) {
            return Ok(SyncResult::failed(
                "Free tier limit reached. Upgrade to sync more leads.",
            ));
        }

        let field_keys = db.list_field_keys().await?;
        let spreadsheet_id = settings.spreadsheet_id.as_str();

        if full_resync {
            let headers = rows::headers(&field_keys);
            if let Err(e) = self
                .inner
                .api
                .setup_sheet(spreadsheet_id, &headers, &self.inner.cfg.sheet_name)
                .await
            {
                return self.record_failure(e).await;
            }
        }

        let leads = db.list_pending_sync(limit).await?;
        if leads.is_empty() {
            update_settings(db, SyncSettingsPatch::sync_outcome(now(), Some(0), None)).await?;
            return Ok(SyncResult::ok(0));
        }

        let widget_names = self.widget_names().await?;
        let builder = RowBuilder::new(&field_keys, &widget_names, self.inner.offset);
        let rows = builder.build_rows(&leads);

        if let Err(e) = self
            .inner
            .api
            .append_rows(spreadsheet_id, rows, &self.inner.cfg.sheet_name)
            .await
        {
            return self.record_failure(e).await;
        }

        let ids: Vec<i64> = leads.iter().map(|l| l.id).collect();
        let synced = ids.len() as u64;
        db.mark_synced(ids).await?;
        update_settings(
            db,
            SyncSettingsPatch::sync_outcome(now(), Some(synced), None),
        )
        .await?;

        info!(synced, full_resync, spreadsheet_id, "Google Sheets sync completed");
        Ok(SyncResult::ok(synced))
    }

    /// Pushes one lead. `false` when preconditions fail, the lead is gone or the push failed.
    pub async fn sync_single_lead(&self, lead_id: i64) -> Result<bool, FormyChatError> {
        let _lease = self.inner.lease.lock().await;
        let db = &self.inner.db;

        if !db.integration_enabled(GOOGLE_SHEETS_INTEGRATION_ID).await? {
            return Ok(false);
        }
        let settings = load_settings(db).await?;
        if !settings.has_spreadsheet() || self.is_limit_reached().await? {
            return Ok(false);
        }
        let Some(lead) = db.find_lead(lead_id).await? else {
            return Ok(false);
        };
        if lead.google_sheet_synced_at.is_some() {
            return Ok(false);
        }

        let field_keys = db.list_field_keys().await?;
        let widget_names = self.widget_names().await?;
        let row = RowBuilder::new(&field_keys, &widget_names, self.inner.offset).build_row(&lead);

        if let Err(e) = self
            .inner
            .api
            .append_rows(&settings.spreadsheet_id, vec![row], &self.inner.cfg.sheet_name)
            .await
        {
            let result = self.record_failure(e).await?;
            debug!(lead_id, error = ?result.error, "Single lead sync failed");
            return Ok(false);
        }

        db.mark_synced(vec![lead_id]).await?;
        update_settings(db, SyncSettingsPatch::sync_outcome(now(), Some(1), None)).await?;
        debug!(lead_id, "Lead pushed to Google Sheets");
        Ok(true)
    }

    /// Reaction to a new lead when the sync mode is realtime.
    pub async fn handle_realtime_sync(&self, lead_id: i64) -> Result<bool, FormyChatError> {
        let db = &self.inner.db;
        if lead_id <= 0 || !db.integration_enabled(GOOGLE_SHEETS_INTEGRATION_ID).await? {
            return Ok(false);
        }
        let settings = load_settings(db).await?;
        if settings.sync_mode != SyncMode::Realtime || !settings.has_spreadsheet() {
            return Ok(false);
        }
        let usable = GoogleConnection::load(db)
            .await?
            .is_some_and(|c| c.is_usable());
        if !usable {
            return Ok(false);
        }
        self.sync_single_lead(lead_id).await
    }

    /// Rows that may still be pushed. `u64::MAX` on premium installs.
    pub async fn get_remaining_slots(&self) -> Result<u64, FormyChatError> {
        if self.inner.cfg.premium {
            return Ok(u64::MAX);
        }
        let synced = self.inner.db.count_leads(LeadCount::Synced).await?;
        Ok(self.inner.cfg.free_limit.saturating_sub(synced))
    }

    pub async fn is_limit_reached(&self) -> Result<bool, FormyChatError> {
        Ok(self.get_remaining_slots().await? == 0)
    }

    async fn pending_limit(&self) -> Result<Option<u64>, FormyChatError> {
        if self.inner.cfg.premium {
            return Ok(None);
        }
        self.get_remaining_slots().await.map(Some)
    }

    pub async fn get_sync_stats(&self) -> Result<SyncStats, FormyChatError> {
        let db = &self.inner.db;
        let settings = load_settings(db).await?;
        Ok(SyncStats {
            total: db.count_leads(LeadCount::Total).await?,
            synced: db.count_leads(LeadCount::Synced).await?,
            pending: db.count_leads(LeadCount::PendingSync).await?,
            last_sync: settings.last_sync_at,
            last_count: settings.last_sync_count,
            last_error: settings.last_sync_error,
        })
    }

    pub async fn get_all_field_keys(&self) -> Result<Vec<String>, FormyChatError> {
        self.inner.db.list_field_keys().await
    }

    pub async fn get_headers(&self) -> Result<Vec<String>, FormyChatError> {
        Ok(rows::headers(&self.get_all_field_keys().await?))
    }

    /// Prepares the lead tab of `spreadsheet_id` without pushing rows.
    pub async fn setup_spreadsheet(&self, spreadsheet_id: &str) -> Result<(), FormyChatError> {
        let headers = self.get_headers().await?;
        self.inner
            .api
            .setup_sheet(spreadsheet_id, &headers, &self.inner.cfg.sheet_name)
            .await
    }

    async fn widget_names(&self) -> Result<Arc<AHashMap<i64, String>>, FormyChatError> {
        if let Some(names) = self.inner.widget_names.get(&()) {
            return Ok(names);
        }
        let names: AHashMap<i64, String> =
            self.inner.db.widget_names().await?.into_iter().collect();
        let names = Arc::new(names);
        self.inner.widget_names.insert((), names.clone());
        Ok(names)
    }

    /// Records a remote failure on the settings record. Local storage errors still propagate.
    async fn record_failure(&self, e: FormyChatError) -> Result<SyncResult, FormyChatError> {
        if matches!(
            e,
            FormyChatError::DatabaseError(_) | FormyChatError::RactorError(_)
        ) {
            return Err(e);
        }
        let message = e.to_string();
        warn!(error = %message, "Google Sheets sync failed");
        update_settings(
            &self.inner.db,
            SyncSettingsPatch::sync_outcome(now(), None, Some(message.clone())),
        )
        .await?;
        Ok(SyncResult::failed(message))
    }
}

fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}
