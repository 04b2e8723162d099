use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Google Sheets export configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GoogleSheetsConfig {
    /// Sheets v4 base URL (spreadsheets collection).
    /// TOML: `google_sheets.sheets_api_base`. Default: `https://sheets.googleapis.com/v4/spreadsheets`.
    #[serde(default = "default_sheets_api_base")]
    pub sheets_api_base: Url,

    /// Drive v3 files endpoint used to list spreadsheets.
    /// TOML: `google_sheets.drive_api_base`. Default: `https://www.googleapis.com/drive/v3/files`.
    #[serde(default = "default_drive_api_base")]
    pub drive_api_base: Url,

    /// Auth proxy endpoint that exchanges a refresh token for a fresh access token.
    /// TOML: `google_sheets.refresh_endpoint`.
    #[serde(default = "default_refresh_endpoint")]
    pub refresh_endpoint: Url,

    /// Optional outbound HTTP proxy. If set, used for the reqwest client.
    /// TOML: `google_sheets.proxy`. Example: `http://127.0.0.1:1080`.
    #[serde(default)]
    pub proxy: Option<Url>,

    /// Per-request timeout for every outbound call, in seconds. No retries are made.
    /// TOML: `google_sheets.request_timeout_secs`. Default: `30`.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Row cap for non-premium installs.
    /// TOML: `google_sheets.free_limit`. Default: `100`.
    #[serde(default = "default_free_limit")]
    pub free_limit: u64,

    /// Lifts the row cap.
    /// TOML: `google_sheets.premium`. Default: `false`.
    #[serde(default)]
    pub premium: bool,

    /// Minimum spacing between background token refreshes, in seconds.
    /// TOML: `google_sheets.refresh_interval_secs`. Default: `259200` (3 days).
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// How often the refresher wakes up to check the gate, in seconds.
    /// TOML: `google_sheets.token_check_interval_secs`. Default: `3600`.
    #[serde(default = "default_token_check_interval_secs")]
    pub token_check_interval_secs: u64,

    /// Tab that receives the lead rows.
    /// TOML: `google_sheets.sheet_name`. Default: `Leads`.
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
}

impl Default for GoogleSheetsConfig {
    fn default() -> Self {
        Self {
            sheets_api_base: default_sheets_api_base(),
            drive_api_base: default_drive_api_base(),
            refresh_endpoint: default_refresh_endpoint(),
            proxy: None,
            request_timeout_secs: default_request_timeout_secs(),
            free_limit: default_free_limit(),
            premium: false,
            refresh_interval_secs: default_refresh_interval_secs(),
            token_check_interval_secs: default_token_check_interval_secs(),
            sheet_name: default_sheet_name(),
        }
    }
}

impl GoogleSheetsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn token_check_interval(&self) -> Duration {
        Duration::from_secs(self.token_check_interval_secs.max(1))
    }
}

fn default_sheets_api_base() -> Url {
    Url::parse("https://sheets.googleapis.com/v4/spreadsheets").expect("valid default URL")
}

fn default_drive_api_base() -> Url {
    Url::parse("https://www.googleapis.com/drive/v3/files").expect("valid default URL")
}

fn default_refresh_endpoint() -> Url {
    Url::parse("https://auth-staging.wppool.dev/refresh/google/formychat-sheet-access")
        .expect("valid default URL")
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_free_limit() -> u64 {
    100
}

fn default_refresh_interval_secs() -> u64 {
    3 * 24 * 60 * 60
}

fn default_token_check_interval_secs() -> u64 {
    60 * 60
}

fn default_sheet_name() -> String {
    "Leads".to_string()
}
