use chrono::{DateTime, Duration, SubsecRound, Utc};
use oauth2::{AccessToken, RefreshToken};
use serde::{Deserialize, Deserializer, Serialize};

use crate::db::{DbActorHandle, GOOGLE_SHEETS};
use crate::error::FormyChatError;

/// Google account link stored under `formychat_google_sheets`.
///
/// Token secrets are wrapped so they never show up in `Debug` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoogleConnection {
    #[serde(
        default,
        deserialize_with = "non_empty_access_token",
        skip_serializing_if = "Option::is_none"
    )]
    pub access_token: Option<AccessToken>,

    #[serde(
        default,
        deserialize_with = "non_empty_refresh_token",
        skip_serializing_if = "Option::is_none"
    )]
    pub refresh_token: Option<RefreshToken>,

    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub token_expires: Option<DateTime<Utc>>,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub picture: String,

    #[serde(default)]
    pub connected: bool,

    #[serde(default)]
    pub revoked: bool,

    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub revoked_at: Option<DateTime<Utc>>,
}

fn non_empty_access_token<'de, D>(deserializer: D) -> Result<Option<AccessToken>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(non_empty(deserializer)?.map(AccessToken::new))
}

fn non_empty_refresh_token<'de, D>(deserializer: D) -> Result<Option<RefreshToken>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(non_empty(deserializer)?.map(RefreshToken::new))
}

fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}

impl GoogleConnection {
    /// Fresh connection from an OAuth callback. Clears any previous revocation.
    pub fn from_callback(
        access_token: String,
        refresh_token: String,
        expires_in: Option<i64>,
        email: String,
    ) -> Self {
        let expires_in = expires_in.filter(|s| *s > 0).unwrap_or(3600);
        Self {
            access_token: Some(AccessToken::new(access_token)),
            refresh_token: Some(RefreshToken::new(refresh_token)),
            token_expires: Some(now() + Duration::seconds(expires_in)),
            email,
            picture: String::new(),
            connected: true,
            revoked: false,
            revoked_at: None,
        }
    }

    /// Connected and not revoked.
    pub fn is_usable(&self) -> bool {
        self.connected && !self.revoked
    }

    pub fn is_expired(&self, at: DateTime<Utc>) -> bool {
        self.token_expires.is_some_and(|t| t < at)
    }

    pub fn access_token_secret(&self) -> Option<&str> {
        self.access_token.as_ref().map(|t| t.secret().as_str())
    }

    pub fn refresh_token_secret(&self) -> Option<&str> {
        self.refresh_token.as_ref().map(|t| t.secret().as_str())
    }

    pub fn mark_revoked(&mut self) {
        self.revoked = true;
        self.revoked_at = Some(now());
    }

    pub async fn load(db: &DbActorHandle) -> Result<Option<Self>, FormyChatError> {
        db.get_option_as(GOOGLE_SHEETS).await
    }

    pub async fn save(&self, db: &DbActorHandle) -> Result<(), FormyChatError> {
        db.update_option_as(GOOGLE_SHEETS, self).await
    }

    /// Drops the stored link. Returns whether one existed.
    pub async fn delete(db: &DbActorHandle) -> Result<bool, FormyChatError> {
        db.delete_option(GOOGLE_SHEETS).await
    }
}

fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_tokens_read_as_missing() {
        let conn: GoogleConnection = serde_json::from_value(json!({
            "access_token": "",
            "refresh_token": "  ",
            "connected": true
        }))
        .unwrap();
        assert!(conn.access_token.is_none());
        assert!(conn.refresh_token.is_none());
        assert!(conn.is_usable());
    }

    #[test]
    fn revoked_connection_is_not_usable() {
        let mut conn =
            GoogleConnection::from_callback("at".into(), "rt".into(), Some(60), "a@b.c".into());
        assert!(conn.is_usable());
        conn.mark_revoked();
        assert!(!conn.is_usable());
        assert!(conn.revoked_at.is_some());
        assert_eq!(conn.access_token_secret(), Some("at"));
    }

    #[test]
    fn expiry_round_trips_as_unix_seconds() {
        let conn =
            GoogleConnection::from_callback("at".into(), "rt".into(), None, String::new());
        let stored = serde_json::to_value(&conn).unwrap();
        assert!(stored["token_expires"].is_i64());
        assert!(stored["revoked_at"].is_null());
        let back: GoogleConnection = serde_json::from_value(stored).unwrap();
        assert_eq!(back.token_expires, conn.token_expires);
    }
}
