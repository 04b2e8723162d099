use chrono::{Duration as ChronoDuration, SubsecRound, Utc};
use formychat_schema::{TokenRefreshRequest, TokenRefreshResponse};
use oauth2::AccessToken;
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::GoogleSheetsConfig;
use crate::db::{DbActorHandle, LAST_REFRESH_TRANSIENT};
use crate::error::{FormyChatError, OauthError, truncate_body};
use crate::sheets::connection::GoogleConnection;

/// What a gated refresh check ended up doing.
#[derive(Debug)]
pub enum RefreshAttempt {
    /// A refresh ran recently; nothing to do until the gate expires.
    Gated,
    NotConnected,
    NoRefreshToken,
    Revoked,
    Refreshed,
    Failed(OauthError),
}

/// Keeps the stored Google access token alive through the auth proxy.
#[derive(Clone)]
pub struct TokenManager {
    http: reqwest::Client,
    cfg: Arc<GoogleSheetsConfig>,
    db: DbActorHandle,
}

impl TokenManager {
    pub fn new(http: reqwest::Client, cfg: Arc<GoogleSheetsConfig>, db: DbActorHandle) -> Self {
        Self { http, cfg, db }
    }

    /// Background entry point. Refreshes at most once per refresh interval and never while the
    /// connection is revoked.
    pub async fn maybe_refresh_token(&self) -> Result<RefreshAttempt, FormyChatError> {
        if self.db.get_transient(LAST_REFRESH_TRANSIENT).await?.is_some() {
            return Ok(RefreshAttempt::Gated);
        }

        let Some(conn) = GoogleConnection::load(&self.db).await? else {
            return Ok(RefreshAttempt::NotConnected);
        };
        if !conn.connected {
            return Ok(RefreshAttempt::NotConnected);
        }
        if conn.refresh_token.is_none() {
            return Ok(RefreshAttempt::NoRefreshToken);
        }
        if conn.revoked {
            return Ok(RefreshAttempt::Revoked);
        }

        match self.refresh_token(conn).await {
            Ok(_) => Ok(RefreshAttempt::Refreshed),
            Err(FormyChatError::Oauth(e)) => Ok(RefreshAttempt::Failed(e)),
            Err(e) => Err(e),
        }
    }

    /// Refresh now, ignoring the gate. Used when the stored token is already expired.
    pub async fn force_refresh(&self) -> Result<GoogleConnection, FormyChatError> {
        let conn = GoogleConnection::load(&self.db)
            .await?
            .filter(|c| c.refresh_token.is_some())
            .ok_or(OauthError::MissingRefreshToken)?;
        self.refresh_token(conn).await
    }

    /// One exchange against the auth proxy.
    ///
    /// 400/401 marks the connection revoked and keeps the old access token. Other failures
    /// leave the stored state alone. The outcome is applied to the record as stored after the
    /// exchange, and dropped if that record no longer carries the same refresh token.
    pub async fn refresh_token(
        &self,
        conn: GoogleConnection,
    ) -> Result<GoogleConnection, FormyChatError> {
        if conn.revoked {
            return Err(OauthError::AlreadyRevoked.into());
        }
        let refresh_token = conn
            .refresh_token_secret()
            .ok_or(OauthError::MissingRefreshToken)?
            .to_string();

        let resp = self
            .http
            .post(self.cfg.refresh_endpoint.clone())
            .json(&TokenRefreshRequest {
                refresh_token: refresh_token.clone(),
            })
            .send()
            .await
            .map_err(OauthError::from)?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(OauthError::from)?;

        if matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED) {
            let mut conn = self.stored_connection(&refresh_token).await?;
            conn.mark_revoked();
            conn.save(&self.db).await?;
            self.db.delete_transient(LAST_REFRESH_TRANSIENT).await?;
            warn!(
                status = status.as_u16(),
                email = %conn.email,
                "Google Sheets refresh token rejected; connection marked revoked"
            );
            return Err(OauthError::Revoked(status).into());
        }

        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                body = %truncate_body(&body),
                "Google Sheets token refresh failed"
            );
            return Err(OauthError::UpstreamStatus(status).into());
        }

        let payload: TokenRefreshResponse =
            serde_json::from_slice(&body).map_err(|e| OauthError::Parse {
                message: e.to_string(),
                body: truncate_body(&body),
            })?;
        let Some(access_token) = payload.access_token() else {
            warn!(body = %truncate_body(&body), "Token refresh response has no access_token");
            return Err(OauthError::MissingAccessToken.into());
        };

        let mut conn = self.stored_connection(&refresh_token).await?;
        let now = Utc::now().trunc_subsecs(0);
        let expires_in = payload.expires_in_or_default();
        conn.access_token = Some(AccessToken::new(access_token.to_string()));
        conn.token_expires = Some(now + ChronoDuration::seconds(expires_in as i64));
        conn.revoked = false;
        conn.revoked_at = None;
        conn.save(&self.db).await?;

        self.db
            .set_transient(
                LAST_REFRESH_TRANSIENT,
                Value::from(now.timestamp()),
                self.cfg.refresh_interval(),
            )
            .await?;

        info!(expires_in, "Google Sheets access token refreshed");
        debug!(token_expires = ?conn.token_expires, "Stored refreshed Google connection");
        Ok(conn)
    }

    async fn stored_connection(&self, refresh_token: &str) -> Result<GoogleConnection, FormyChatError> {
        match GoogleConnection::load(&self.db).await? {
            Some(current)
                if current.connected && current.refresh_token_secret() == Some(refresh_token) =>
            {
                Ok(current)
            }
            _ => {
                warn!("Google Sheets connection changed during token refresh; discarding result");
                Err(OauthError::ConnectionChanged.into())
            }
        }
    }
}
