use serde::{Deserialize, Serialize};

/// JSON body posted to the token-refresh proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRefreshRequest {
    pub refresh_token: String,
}

/// Token-refresh proxy response.
///
/// Both fields are optional on the wire. A body without `access_token` is treated as a failed
/// refresh by the caller, and a missing `expires_in` falls back to one hour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenRefreshResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl TokenRefreshResponse {
    pub const DEFAULT_EXPIRES_IN: u64 = 3600;

    /// Returns the access token when it is present and non-empty.
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn expires_in_or_default(&self) -> u64 {
        self.expires_in
            .filter(|s| *s > 0)
            .unwrap_or(Self::DEFAULT_EXPIRES_IN)
    }
}
