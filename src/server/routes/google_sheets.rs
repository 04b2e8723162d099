use crate::db::{GOOGLE_SHEETS_INTEGRATION_ID, JUST_CONNECTED_TRANSIENT};
use crate::error::FormyChatError;
use crate::server::router::FormyChatState;
use crate::sheets::{
    GoogleConnection, SyncInterval, SyncResult, SyncSettingsPatch,
    settings::{load_settings, update_settings},
};
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::{SubsecRound, TimeDelta, Utc};
use oauth2::AccessToken;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

pub fn router() -> Router<FormyChatState> {
    Router::new()
        .route("/integrations/google-sheets/status", get(status))
        .route("/integrations/google-sheets/disconnect", post(disconnect))
        .route("/integrations/google-sheets/userinfo", post(save_userinfo))
        .route("/integrations/google-sheets/token", post(save_token))
        .route(
            "/integrations/google-sheets/spreadsheets",
            get(list_spreadsheets).post(create_spreadsheet),
        )
        .route(
            "/integrations/google-sheets/sync-settings",
            get(get_sync_settings).post(update_sync_settings),
        )
        .route("/integrations/google-sheets/sync", post(trigger_sync))
        .route("/integrations/google-sheets/resync", post(trigger_resync))
        .route("/integrations/google-sheets/sync-status", get(sync_status))
        .route("/integrations/google-sheets/intervals", get(intervals))
}

fn not_connected() -> FormyChatError {
    FormyChatError::validation("not_connected", "Google Sheets is not connected.")
}

async fn connected(state: &FormyChatState) -> Result<GoogleConnection, FormyChatError> {
    GoogleConnection::load(&state.db)
        .await?
        .filter(|c| c.connected)
        .ok_or_else(not_connected)
}

/// GET /integrations/google-sheets/status
pub async fn status(State(state): State<FormyChatState>) -> Result<Json<Value>, FormyChatError> {
    let just_connected = state
        .db
        .get_transient(JUST_CONNECTED_TRANSIENT)
        .await?
        .is_some();

    let body = match GoogleConnection::load(&state.db).await? {
        Some(c) if c.connected && c.revoked => json!({
            "connected": false,
            "revoked": true,
            "email": c.email,
            "picture": c.picture,
        }),
        Some(c) if c.connected => json!({
            "connected": true,
            "email": c.email,
            "picture": c.picture,
            "access_token": c.access_token_secret().unwrap_or_default(),
            "refresh_token": c.refresh_token_secret().unwrap_or_default(),
            "just_connected": just_connected,
        }),
        _ => json!({ "connected": false }),
    };
    Ok(Json(body))
}

/// POST /integrations/google-sheets/disconnect
pub async fn disconnect(
    State(state): State<FormyChatState>,
) -> Result<Json<Value>, FormyChatError> {
    GoogleConnection::delete(&state.db).await?;
    state
        .db
        .set_integration_enabled(GOOGLE_SHEETS_INTEGRATION_ID, Value::Bool(false))
        .await?;
    state.sheets.scheduler.unschedule_sync().await?;
    info!("Google Sheets disconnected");

    Ok(Json(json!({
        "success": true,
        "message": "Google Sheets disconnected successfully.",
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct UserInfoBody {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// POST /integrations/google-sheets/userinfo
pub async fn save_userinfo(
    State(state): State<FormyChatState>,
    Json(body): Json<UserInfoBody>,
) -> Result<Json<Value>, FormyChatError> {
    let mut conn = connected(&state).await?;
    if let Some(email) = body.email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()) {
        conn.email = email;
    }
    if let Some(picture) = body
        .picture
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
    {
        conn.picture = picture;
    }
    conn.save(&state.db).await?;

    Ok(Json(json!({
        "success": true,
        "email": conn.email,
        "picture": conn.picture,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenBody {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// POST /integrations/google-sheets/token
pub async fn save_token(
    State(state): State<FormyChatState>,
    Json(body): Json<TokenBody>,
) -> Result<Json<Value>, FormyChatError> {
    let mut conn = connected(&state).await?;
    if let Some(token) = body
        .access_token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
    {
        conn.access_token = Some(AccessToken::new(token));
        if let Some(secs) = body.expires_in.filter(|s| *s > 0) {
            conn.token_expires = Some(Utc::now().trunc_subsecs(0) + TimeDelta::seconds(secs));
        }
        conn.save(&state.db).await?;
    }
    Ok(Json(json!({ "success": true })))
}

/// GET /integrations/google-sheets/spreadsheets
pub async fn list_spreadsheets(
    State(state): State<FormyChatState>,
) -> Result<Json<Value>, FormyChatError> {
    let files = state.sheets.api().list_spreadsheets().await?;
    let spreadsheets: Vec<Value> = files
        .into_iter()
        .map(|f| json!({ "id": f.id, "name": f.name }))
        .collect();
    Ok(Json(json!({ "success": true, "spreadsheets": spreadsheets })))
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSpreadsheetBody {
    #[serde(default)]
    pub title: Option<String>,
}

/// POST /integrations/google-sheets/spreadsheets
///
/// Creates a document, selects it and runs a full sync into it.
pub async fn create_spreadsheet(
    State(state): State<FormyChatState>,
    Json(body): Json<CreateSpreadsheetBody>,
) -> Result<Json<Value>, FormyChatError> {
    let title = body
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            FormyChatError::validation("missing_title", "Spreadsheet title is required.")
        })?;

    let engine = &state.sheets.engine;
    let created = engine.api().create_spreadsheet(&title).await?;

    if let Err(e) = engine.setup_spreadsheet(&created.id).await {
        warn!(spreadsheet_id = %created.id, error = %e, "Initial sheet setup failed");
    }

    update_settings(
        &state.db,
        SyncSettingsPatch {
            spreadsheet_id: Some(created.id.clone()),
            spreadsheet_name: Some(created.name.clone()),
            ..Default::default()
        },
    )
    .await?;

    let result = engine.sync_leads(true).await?;
    let stats = engine.get_sync_stats().await?;
    Ok(Json(json!({
        "success": true,
        "spreadsheet": created,
        "synced": result.synced,
        "stats": stats,
    })))
}

/// GET /integrations/google-sheets/sync-settings
pub async fn get_sync_settings(
    State(state): State<FormyChatState>,
) -> Result<Json<Value>, FormyChatError> {
    let settings = load_settings(&state.db).await?;
    Ok(Json(json!({ "success": true, "settings": settings })))
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncSettingsBody {
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    #[serde(default)]
    pub spreadsheet_name: Option<String>,
    #[serde(default)]
    pub sync_mode: Option<String>,
    #[serde(default)]
    pub sync_interval: Option<String>,
    #[serde(default)]
    pub save_only: Option<Value>,
}

impl SyncSettingsBody {
    /// Unknown modes and intervals are ignored rather than rejected.
    fn to_patch(&self) -> SyncSettingsPatch {
        SyncSettingsPatch {
            spreadsheet_id: self.spreadsheet_id.as_ref().map(|s| s.trim().to_string()),
            spreadsheet_name: self.spreadsheet_name.as_ref().map(|s| s.trim().to_string()),
            sync_mode: self.sync_mode.as_deref().and_then(|m| m.parse().ok()),
            sync_interval: self.sync_interval.as_deref().and_then(|i| i.parse().ok()),
            ..Default::default()
        }
    }

    fn save_only(&self) -> bool {
        self.save_only
            .as_ref()
            .is_some_and(crate::db::validate_boolean)
    }
}

/// POST /integrations/google-sheets/sync-settings
///
/// Choosing a spreadsheet prepares it and re-exports every lead unless `save_only` is set.
pub async fn update_sync_settings(
    State(state): State<FormyChatState>,
    Json(body): Json<SyncSettingsBody>,
) -> Result<Json<Value>, FormyChatError> {
    let patch = body.to_patch();
    let new_spreadsheet = patch.spreadsheet_id.clone().filter(|id| !id.is_empty());

    let settings = update_settings(&state.db, patch).await?;
    state
        .sheets
        .scheduler
        .update_cron_from_settings(settings.clone())
        .await?;

    if body.save_only() {
        return Ok(Json(json!({ "success": true, "settings": settings })));
    }

    let engine = &state.sheets.engine;
    let mut sync_result: Option<SyncResult> = None;
    if let Some(spreadsheet_id) = new_spreadsheet {
        match engine.setup_spreadsheet(&spreadsheet_id).await {
            Ok(()) => sync_result = Some(engine.sync_leads(true).await?),
            Err(e) => warn!(spreadsheet_id = %spreadsheet_id, error = %e, "Sheet setup failed; full sync skipped"),
        }
    }

    let mut response = json!({
        "success": true,
        "settings": load_settings(&state.db).await?,
        "stats": engine.get_sync_stats().await?,
    });
    if let Some(result) = sync_result {
        response["synced"] = Value::from(result.synced);
    }
    Ok(Json(response))
}

fn sync_response(result: SyncResult, stats: Value) -> Json<Value> {
    Json(json!({
        "success": result.success,
        "synced": result.synced,
        "error": result.error,
        "stats": stats,
    }))
}

/// POST /integrations/google-sheets/sync
pub async fn trigger_sync(
    State(state): State<FormyChatState>,
) -> Result<Json<Value>, FormyChatError> {
    let engine = &state.sheets.engine;
    let result = engine.sync_leads(false).await?;
    let stats = serde_json::to_value(engine.get_sync_stats().await?)?;
    Ok(sync_response(result, stats))
}

/// POST /integrations/google-sheets/resync
pub async fn trigger_resync(
    State(state): State<FormyChatState>,
) -> Result<Json<Value>, FormyChatError> {
    let engine = &state.sheets.engine;
    let result = engine.sync_leads(true).await?;
    let stats = serde_json::to_value(engine.get_sync_stats().await?)?;
    Ok(sync_response(result, stats))
}

/// GET /integrations/google-sheets/sync-status
pub async fn sync_status(
    State(state): State<FormyChatState>,
) -> Result<Json<Value>, FormyChatError> {
    let stats = state.sheets.engine.get_sync_stats().await?;
    let schedule = state.sheets.scheduler.status().await?;
    Ok(Json(json!({
        "success": true,
        "stats": stats,
        "schedule": schedule,
        "remaining": state.sheets.engine.get_remaining_slots().await?,
    })))
}

/// GET /integrations/google-sheets/intervals
pub async fn intervals() -> Json<Value> {
    let intervals: Map<String, Value> = SyncInterval::ALL
        .iter()
        .map(|i| (i.as_str().to_string(), Value::from(i.label())))
        .collect();
    Json(json!({ "success": true, "intervals": intervals }))
}
