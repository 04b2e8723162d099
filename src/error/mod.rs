mod formychat;
mod mail;
mod oauth;
mod sheets;

pub use formychat::{ApiErrorBody, ApiErrorObject, FormyChatError};
pub use mail::MailError;
pub use oauth::OauthError;
pub use sheets::SheetsError;

/// Shortens an upstream body for logs and error payloads.
pub(crate) fn truncate_body(body: &[u8]) -> String {
    let body_str = String::from_utf8_lossy(body);
    body_str
        .char_indices()
        .nth(100)
        .map(|(idx, _)| format!("{}...<truncated>", &body_str[..idx]))
        .unwrap_or_else(|| body_str.into_owned())
}
