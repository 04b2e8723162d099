mod basic;
mod mail;
mod sheets;

pub use basic::BasicConfig;
pub use mail::MailConfig;
pub use sheets::GoogleSheetsConfig;

use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Whole service configuration, layered by Figment over built-in defaults.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub basic: BasicConfig,

    /// Remote endpoints and quotas for the spreadsheet export.
    #[serde(default)]
    pub google_sheets: GoogleSheetsConfig,

    /// Lead notification mail.
    #[serde(default)]
    pub mail: MailConfig,
}

const DEFAULT_CONFIG_FILE: &str = "config.toml";

impl Config {
    /// Defaults, then `config.toml` when present.
    pub fn figment() -> Figment {
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            figment.merge(Toml::file(DEFAULT_CONFIG_FILE))
        } else {
            figment
        }
    }

    /// Startup loader. Panics when the file is missing or `basic.admin_key` is empty.
    pub fn from_toml() -> Self {
        if !PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            panic!("config file not found: {}", DEFAULT_CONFIG_FILE);
        }
        let cfg: Self = Self::figment().extract().unwrap_or_else(|err| {
            panic!(
                "failed to extract configuration from {}: {err}",
                DEFAULT_CONFIG_FILE
            )
        });
        if cfg.basic.admin_key.trim().is_empty() {
            panic!("basic.admin_key must be set and non-empty");
        }
        cfg
    }
}
