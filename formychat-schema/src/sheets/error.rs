use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Google API error envelope: `{"error": {"code", "message", "status"}}`.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GoogleApiErrorBody {
    #[serde(rename = "error")]
    #[serde(default)]
    pub inner: GoogleApiErrorObject,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GoogleApiErrorObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(flatten)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl GoogleApiErrorBody {
    /// Best-effort extraction of `error.message` from a raw body.
    pub fn message_from_slice(body: &[u8]) -> Option<String> {
        serde_json::from_slice::<Self>(body)
            .ok()
            .and_then(|b| b.inner.message)
            .filter(|m| !m.is_empty())
    }
}
