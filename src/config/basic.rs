use chrono::FixedOffset;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::net::{IpAddr, Ipv4Addr};

/// `[basic]` table: listener, storage, admin access and site locale.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BasicConfig {
    /// Bind address. Default `0.0.0.0`.
    #[serde(default = "default_listen_ip")]
    pub listen_addr: IpAddr,

    /// Default `8188`.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// SQLite location holding leads, widgets and options. Default `sqlite://data.db`.
    #[serde(default)]
    pub database_url: String,

    /// Fallback filter when `RUST_LOG` is unset. Default `info`.
    #[serde(default)]
    pub loglevel: String,

    /// Shared secret for the admin API and the OAuth callback. Required.
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_string_lax")]
    pub admin_key: String,

    /// Redirect target after a successful OAuth callback.
    #[serde(default = "default_admin_redirect_url")]
    pub admin_redirect_url: String,

    /// Site timezone in minutes east of UTC, applied to sheet date/time cells.
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// Body cap for the public submit endpoint. Default 64 KiB.
    #[serde(default = "default_max_submission_bytes")]
    pub max_submission_bytes: usize,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_ip(),
            listen_port: default_listen_port(),
            database_url: "sqlite://data.db".to_string(),
            loglevel: "info".to_string(),
            // Left empty; `Config::from_toml()` refuses to start without one.
            admin_key: String::new(),
            admin_redirect_url: default_admin_redirect_url(),
            utc_offset_minutes: 0,
            max_submission_bytes: default_max_submission_bytes(),
        }
    }
}

impl BasicConfig {
    /// Site offset; out-of-range values fall back to UTC.
    pub fn site_offset(&self) -> FixedOffset {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"))
    }
}

/// Accepts a bare TOML number so `admin_key = 1234` still works.
fn deserialize_string_lax<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;

    match v {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(serde::de::Error::custom(
            "expected a string or a number for basic.admin_key",
        )),
    }
}

fn default_listen_ip() -> IpAddr {
    Ipv4Addr::new(0, 0, 0, 0).into()
}

fn default_listen_port() -> u16 {
    8188
}

fn default_admin_redirect_url() -> String {
    "/admin.php?page=formychat-integrations".to_string()
}

fn default_max_submission_bytes() -> usize {
    64 * 1024
}
