//! Named options persisted as JSON in `formychat_options`.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::warn;

use super::actor::DbActorHandle;
use crate::error::FormyChatError;

/// Google connection record (tokens, account, revocation).
pub const GOOGLE_SHEETS: &str = "formychat_google_sheets";
/// Spreadsheet sync settings.
pub const GOOGLE_SHEETS_SYNC: &str = "formychat_google_sheets_sync";
/// Transient gating the background token refresh.
pub const LAST_REFRESH_TRANSIENT: &str = "formychat_google_sheets_last_refresh";
/// Short-lived marker set after a successful OAuth callback.
pub const JUST_CONNECTED_TRANSIENT: &str = "formychat_google_sheets_just_connected";

pub const GOOGLE_SHEETS_INTEGRATION_ID: &str = "google_sheets";

/// Option holding the enabled flag of one integration.
pub fn integration_option(id: &str) -> String {
    format!("formychat_integration_{id}")
}

/// Loose truthiness of a stored flag.
///
/// `false`, `"false"`, `0`, `"0"`, `""`, `"off"`, `"no"` and null are false, every other
/// scalar is true. Arrays and objects count as true when non-empty.
pub fn validate_boolean(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            !matches!(s.as_str(), "" | "0" | "false" | "off" | "no")
        }
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

impl DbActorHandle {
    /// Reads and decodes an option. A stored value of the wrong shape is logged and treated as
    /// missing so the caller falls back to defaults.
    pub async fn get_option_as<T: DeserializeOwned>(
        &self,
        name: &str,
    ) -> Result<Option<T>, FormyChatError> {
        let Some(raw) = self.get_option(name).await? else {
            return Ok(None);
        };
        match serde_json::from_value(raw) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                warn!(option = name, error = %e, "stored option has unexpected shape; ignoring");
                Ok(None)
            }
        }
    }

    pub async fn update_option_as<T: Serialize>(
        &self,
        name: &str,
        value: &T,
    ) -> Result<(), FormyChatError> {
        self.update_option(name, serde_json::to_value(value)?).await
    }

    /// Whether `formychat_integration_<id>` is truthy.
    pub async fn integration_enabled(&self, id: &str) -> Result<bool, FormyChatError> {
        Ok(self
            .get_option(&integration_option(id))
            .await?
            .is_some_and(|v| validate_boolean(&v)))
    }

    pub async fn set_integration_enabled(
        &self,
        id: &str,
        enabled: Value,
    ) -> Result<(), FormyChatError> {
        self.update_option(&integration_option(id), enabled).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loose_booleans() {
        for falsy in [json!(null), json!(false), json!(0), json!("0"), json!(""), json!("false"), json!("FALSE")] {
            assert!(!validate_boolean(&falsy), "{falsy} should be false");
        }
        for truthy in [json!(true), json!(1), json!("1"), json!("true"), json!("yes"), json!(2.5)] {
            assert!(validate_boolean(&truthy), "{truthy} should be true");
        }
    }

    #[test]
    fn integration_option_name() {
        assert_eq!(
            integration_option(GOOGLE_SHEETS_INTEGRATION_ID),
            "formychat_integration_google_sheets"
        );
    }
}
