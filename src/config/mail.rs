use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `[mail]` table: SMTP relay and the site identity used in lead notifications.
///
/// Notifications stay off until `enabled` is set. Each widget still decides through its own
/// `config.email` settings whether a lead produces a message.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MailConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Default `localhost`.
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    /// Default `587`.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub smtp_username: Option<String>,

    #[serde(default)]
    pub smtp_password: Option<String>,

    /// Upgrade the connection with STARTTLS. Plain SMTP when off, for local relays only.
    #[serde(default = "default_starttls")]
    pub starttls: bool,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Sender mailbox, e.g. `FormyChat <noreply@example.com>`.
    #[serde(default = "default_from")]
    pub from: String,

    /// Recipient when a widget asks for the site admin instead of its own address.
    #[serde(default)]
    pub admin_email: String,

    /// Shown in the subject and body.
    #[serde(default = "default_site_name")]
    pub site_name: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            starttls: default_starttls(),
            timeout_secs: default_timeout_secs(),
            from: default_from(),
            admin_email: String::new(),
            site_name: default_site_name(),
        }
    }
}

impl MailConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_starttls() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_from() -> String {
    "FormyChat <wordpress@localhost>".to_string()
}

fn default_site_name() -> String {
    "FormyChat".to_string()
}
