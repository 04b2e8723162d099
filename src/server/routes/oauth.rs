use crate::db::{GOOGLE_SHEETS_INTEGRATION_ID, JUST_CONNECTED_TRANSIENT};
use crate::error::FormyChatError;
use crate::server::router::FormyChatState;
use crate::sheets::GoogleConnection;
use axum::{
    Router,
    extract::{Query, State},
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::info;

const CALLBACK_ACTION: &str = "authenticated";
const CALLBACK_INTEGRATION: &str = "googlesheets";
const JUST_CONNECTED_TTL: Duration = Duration::from_secs(60);

pub fn router() -> Router<FormyChatState> {
    Router::new().route("/oauth2callback", get(oauth_callback))
}

/// Query string the token broker appends when redirecting back after consent.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(rename = "formychat-action")]
    pub action: Option<String>,
    pub integration: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<String>,
    pub email: Option<String>,
}

impl CallbackQuery {
    fn is_sheets_callback(&self) -> bool {
        self.action.as_deref() == Some(CALLBACK_ACTION)
            && self.integration.as_deref() == Some(CALLBACK_INTEGRATION)
    }

    /// Both tokens are required. Anything less stores nothing.
    fn into_connection(self) -> Result<GoogleConnection, FormyChatError> {
        let access = self.access_token.filter(|t| !t.trim().is_empty());
        let refresh = self.refresh_token.filter(|t| !t.trim().is_empty());
        let (Some(access), Some(refresh)) = (access, refresh) else {
            return Err(FormyChatError::validation(
                "missing_tokens",
                "OAuth callback is missing tokens.",
            ));
        };
        Ok(GoogleConnection::from_callback(
            access,
            refresh,
            self.expires_in.and_then(|s| s.trim().parse().ok()),
            self.email.unwrap_or_default(),
        ))
    }
}

/// GET /oauth2callback
pub async fn oauth_callback(
    State(state): State<FormyChatState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, FormyChatError> {
    if !query.is_sheets_callback() {
        return Err(FormyChatError::validation(
            "invalid_callback",
            "Unrecognised OAuth callback.",
        ));
    }

    let conn = query.into_connection()?;
    conn.save(&state.db).await?;
    state
        .db
        .set_integration_enabled(GOOGLE_SHEETS_INTEGRATION_ID, Value::Bool(true))
        .await?;
    state
        .db
        .set_transient(JUST_CONNECTED_TRANSIENT, Value::Bool(true), JUST_CONNECTED_TTL)
        .await?;
    state.sheets.scheduler.maybe_schedule_cron().await?;
    info!(email = %conn.email, "Google Sheets connected");

    Ok((StatusCode::FOUND, [(LOCATION, state.admin_redirect_url.to_string())]).into_response())
}
