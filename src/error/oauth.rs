use axum::http::StatusCode;
use thiserror::Error as ThisError;

/// Failures of the refresh-token exchange against the auth proxy.
#[derive(Debug, ThisError)]
pub enum OauthError {
    /// The proxy rejected the refresh token (400/401). The connection is now revoked.
    #[error("Refresh token rejected with status {0}; reconnect required")]
    Revoked(StatusCode),

    #[error("Google Sheets connection is revoked; reconnect required")]
    AlreadyRevoked,

    /// Disconnected or reconnected while the exchange was in flight. Nothing was stored.
    #[error("Google Sheets connection changed during the token refresh")]
    ConnectionChanged,

    #[error("No refresh token available")]
    MissingRefreshToken,

    #[error("Refresh response did not contain an access token")]
    MissingAccessToken,

    #[error("OAuth2 upstream error with status: {0}")]
    UpstreamStatus(StatusCode),

    #[error("OAuth2 request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("OAuth2 refresh endpoint parse error: {message}. Body: {body}")]
    Parse { message: String, body: String },
}

impl OauthError {
    /// Whether the stored refresh token is known to be dead.
    pub fn is_revocation(&self) -> bool {
        matches!(self, OauthError::Revoked(_) | OauthError::AlreadyRevoked)
    }
}
