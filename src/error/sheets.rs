use axum::http::StatusCode;
use thiserror::Error as ThisError;

use super::oauth::OauthError;

/// Failures talking to the Google Sheets / Drive APIs.
///
/// `Display` of `Api` is the bare upstream message so it can be surfaced to the admin as the
/// last sync error.
#[derive(Debug, ThisError)]
pub enum SheetsError {
    #[error("Google Sheets is not connected.")]
    NotConnected,

    #[error("No access token available.")]
    NoToken,

    #[error("Access token expired and refresh failed.")]
    TokenExpired(#[source] OauthError),

    #[error("{message}")]
    Api { status: StatusCode, message: String },

    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Malformed response from Google API: {message}. Body: {body}")]
    Parse { message: String, body: String },

    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),
}
