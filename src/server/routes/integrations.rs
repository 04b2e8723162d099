use crate::db::GOOGLE_SHEETS_INTEGRATION_ID;
use crate::error::FormyChatError;
use crate::integrations::{self, IntegrationsCatalog};
use crate::server::router::FormyChatState;
use axum::{Json, Router, extract::State, routing::get};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

pub fn router() -> Router<FormyChatState> {
    Router::new().route("/integrations", get(get_integrations).post(update_integration))
}

/// GET /integrations
pub async fn get_integrations(
    State(state): State<FormyChatState>,
) -> Result<Json<IntegrationsCatalog>, FormyChatError> {
    Ok(Json(integrations::catalog(&state.db).await?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateIntegrationBody {
    #[serde(default)]
    pub integration_id: String,
    #[serde(default)]
    pub enabled: Value,
}

/// POST /integrations
pub async fn update_integration(
    State(state): State<FormyChatState>,
    Json(body): Json<UpdateIntegrationBody>,
) -> Result<Json<Value>, FormyChatError> {
    integrations::update(&state.db, &body.integration_id, body.enabled.clone()).await?;
    info!(integration = %body.integration_id, enabled = %body.enabled, "Integration updated");

    if body.integration_id == GOOGLE_SHEETS_INTEGRATION_ID {
        state.sheets.scheduler.maybe_schedule_cron().await?;
    }

    Ok(Json(json!({
        "success": true,
        "message": "Integration updated successfully.",
    })))
}
