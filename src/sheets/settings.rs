use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{str::FromStr, time::Duration};

use crate::db::{DbActorHandle, GOOGLE_SHEETS_SYNC};
use crate::error::FormyChatError;

/// How leads reach the spreadsheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Only explicit sync/resync calls.
    Manual,
    /// Periodic batch pass.
    #[default]
    #[serde(alias = "automatic")]
    Scheduled,
    /// One row per lead as it arrives.
    Realtime,
}

impl SyncMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncMode::Manual => "manual",
            SyncMode::Scheduled => "scheduled",
            SyncMode::Realtime => "realtime",
        }
    }
}

impl FromStr for SyncMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(SyncMode::Manual),
            "scheduled" => Ok(SyncMode::Scheduled),
            "realtime" => Ok(SyncMode::Realtime),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SyncInterval {
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[default]
    #[serde(rename = "1h")]
    Hourly,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "daily")]
    Daily,
}

impl SyncInterval {
    pub const ALL: [SyncInterval; 5] = [
        SyncInterval::FifteenMinutes,
        SyncInterval::ThirtyMinutes,
        SyncInterval::Hourly,
        SyncInterval::SixHours,
        SyncInterval::Daily,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SyncInterval::FifteenMinutes => "15m",
            SyncInterval::ThirtyMinutes => "30m",
            SyncInterval::Hourly => "1h",
            SyncInterval::SixHours => "6h",
            SyncInterval::Daily => "daily",
        }
    }

    pub fn period(self) -> Duration {
        Duration::from_secs(match self {
            SyncInterval::FifteenMinutes => 15 * 60,
            SyncInterval::ThirtyMinutes => 30 * 60,
            SyncInterval::Hourly => 60 * 60,
            SyncInterval::SixHours => 6 * 60 * 60,
            SyncInterval::Daily => 24 * 60 * 60,
        })
    }

    pub fn label(self) -> &'static str {
        match self {
            SyncInterval::FifteenMinutes => "Every 15 minutes",
            SyncInterval::ThirtyMinutes => "Every 30 minutes",
            SyncInterval::Hourly => "Every hour",
            SyncInterval::SixHours => "Every 6 hours",
            SyncInterval::Daily => "Daily",
        }
    }
}

impl FromStr for SyncInterval {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SyncInterval::ALL
            .into_iter()
            .find(|i| i.as_str() == s)
            .ok_or(())
    }
}

/// Stored under `formychat_google_sheets_sync`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default)]
    pub spreadsheet_id: String,
    #[serde(default)]
    pub spreadsheet_name: String,
    #[serde(default, deserialize_with = "or_default")]
    pub sync_mode: SyncMode,
    #[serde(default, deserialize_with = "or_default")]
    pub sync_interval: SyncInterval,
    #[serde(default, deserialize_with = "or_default")]
    pub last_sync_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "or_default")]
    pub last_sync_count: u64,
    #[serde(default)]
    pub last_sync_error: Option<String>,
}

/// Unknown or malformed stored values fall back to the default instead of failing the record.
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let v = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(v).unwrap_or_default())
}

impl SyncSettings {
    pub fn has_spreadsheet(&self) -> bool {
        !self.spreadsheet_id.is_empty()
    }
}

/// Partial update. `None` leaves a member untouched.
#[derive(Debug, Clone, Default)]
pub struct SyncSettingsPatch {
    pub spreadsheet_id: Option<String>,
    pub spreadsheet_name: Option<String>,
    pub sync_mode: Option<SyncMode>,
    pub sync_interval: Option<SyncInterval>,
    pub last_sync_at: Option<Option<DateTime<Utc>>>,
    pub last_sync_count: Option<u64>,
    pub last_sync_error: Option<Option<String>>,
}

impl SyncSettingsPatch {
    /// Bookkeeping for a finished pass. A `None` error clears the previous one.
    pub fn sync_outcome(at: DateTime<Utc>, count: Option<u64>, error: Option<String>) -> Self {
        Self {
            last_sync_at: Some(Some(at)),
            last_sync_count: count,
            last_sync_error: Some(error),
            ..Default::default()
        }
    }

    pub fn apply(self, settings: &mut SyncSettings) {
        if let Some(v) = self.spreadsheet_id {
            settings.spreadsheet_id = v;
        }
        if let Some(v) = self.spreadsheet_name {
            settings.spreadsheet_name = v;
        }
        if let Some(v) = self.sync_mode {
            settings.sync_mode = v;
        }
        if let Some(v) = self.sync_interval {
            settings.sync_interval = v;
        }
        if let Some(v) = self.last_sync_at {
            settings.last_sync_at = v;
        }
        if let Some(v) = self.last_sync_count {
            settings.last_sync_count = v;
        }
        if let Some(v) = self.last_sync_error {
            settings.last_sync_error = v;
        }
    }
}

pub async fn load_settings(db: &DbActorHandle) -> Result<SyncSettings, FormyChatError> {
    Ok(db
        .get_option_as::<SyncSettings>(GOOGLE_SHEETS_SYNC)
        .await?
        .unwrap_or_default())
}

/// Merges `patch` into the stored record and writes it back whole.
pub async fn update_settings(
    db: &DbActorHandle,
    patch: SyncSettingsPatch,
) -> Result<SyncSettings, FormyChatError> {
    let mut settings = load_settings(db).await?;
    patch.apply(&mut settings);
    db.update_option_as(GOOGLE_SHEETS_SYNC, &settings).await?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_record_defaults_to_hourly_schedule() {
        let s: SyncSettings = serde_json::from_value(json!({})).unwrap();
        assert_eq!(s.sync_mode, SyncMode::Scheduled);
        assert_eq!(s.sync_interval, SyncInterval::Hourly);
        assert!(!s.has_spreadsheet());
    }

    #[test]
    fn legacy_automatic_mode_reads_as_scheduled() {
        let s: SyncSettings =
            serde_json::from_value(json!({"sync_mode": "automatic", "sync_interval": "6h"}))
                .unwrap();
        assert_eq!(s.sync_mode, SyncMode::Scheduled);
        assert_eq!(s.sync_interval, SyncInterval::SixHours);
    }

    #[test]
    fn unknown_values_fall_back() {
        let s: SyncSettings = serde_json::from_value(json!({
            "spreadsheet_id": "abc",
            "sync_mode": "weekly",
            "sync_interval": "2h",
            "last_sync_count": "lots"
        }))
        .unwrap();
        assert_eq!(s.spreadsheet_id, "abc");
        assert_eq!(s.sync_mode, SyncMode::Scheduled);
        assert_eq!(s.sync_interval, SyncInterval::Hourly);
        assert_eq!(s.last_sync_count, 0);
    }

    #[test]
    fn update_path_rejects_legacy_alias() {
        assert!("automatic".parse::<SyncMode>().is_err());
        assert_eq!("realtime".parse::<SyncMode>(), Ok(SyncMode::Realtime));
        assert_eq!("daily".parse::<SyncInterval>(), Ok(SyncInterval::Daily));
        assert!("1d".parse::<SyncInterval>().is_err());
    }

    #[test]
    fn interval_periods() {
        let secs: Vec<u64> = SyncInterval::ALL.iter().map(|i| i.period().as_secs()).collect();
        assert_eq!(secs, vec![900, 1800, 3600, 21600, 86400]);
        assert_eq!(SyncInterval::Hourly.label(), "Every hour");
    }

    #[test]
    fn patch_clears_error_and_keeps_selection() {
        let mut s = SyncSettings {
            spreadsheet_id: "abc".into(),
            last_sync_error: Some("boom".into()),
            ..Default::default()
        };
        SyncSettingsPatch::sync_outcome(Utc::now(), Some(3), None).apply(&mut s);
        assert_eq!(s.spreadsheet_id, "abc");
        assert_eq!(s.last_sync_count, 3);
        assert!(s.last_sync_error.is_none());
        assert!(s.last_sync_at.is_some());
    }
}
