use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error as ThisError;

use super::oauth::OauthError;
use super::sheets::SheetsError;

#[derive(Debug, ThisError)]
pub enum FormyChatError {
    /// Rejected input. Nothing was written.
    #[error("{message}")]
    Validation { code: &'static str, message: String },

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Sheets(#[from] SheetsError),

    #[error(transparent)]
    Oauth(#[from] OauthError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unexpected error: {0}")]
    UnexpectedError(String),

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl FormyChatError {
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        FormyChatError::Validation {
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for FormyChatError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            FormyChatError::DatabaseError(_)
            | FormyChatError::RactorError(_)
            | FormyChatError::UnexpectedError(_)
            | FormyChatError::JsonError(_)
            | FormyChatError::Sheets(SheetsError::InvalidBaseUrl(_)) => {
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                let body = ApiErrorObject {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal server error occurred.".to_string(),
                    details: None,
                };
                (status, body)
            }

            FormyChatError::Validation { code, message } => (
                StatusCode::BAD_REQUEST,
                ApiErrorObject {
                    code: code.to_string(),
                    message,
                    details: None,
                },
            ),

            FormyChatError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                ApiErrorObject {
                    code: "NOT_FOUND".to_string(),
                    message,
                    details: None,
                },
            ),

            FormyChatError::Sheets(
                e @ (SheetsError::NotConnected | SheetsError::NoToken | SheetsError::TokenExpired(_)),
            ) => {
                let code = match e {
                    SheetsError::NotConnected => "not_connected",
                    SheetsError::NoToken => "no_token",
                    _ => "token_expired",
                };
                (
                    StatusCode::UNAUTHORIZED,
                    ApiErrorObject {
                        code: code.to_string(),
                        message: e.to_string(),
                        details: None,
                    },
                )
            }

            FormyChatError::Sheets(SheetsError::Api { status, message }) => (
                StatusCode::BAD_GATEWAY,
                ApiErrorObject {
                    code: "api_error".to_string(),
                    message,
                    details: Some(json!({ "status": status.as_u16() })),
                },
            ),

            FormyChatError::Sheets(SheetsError::Parse { .. })
            | FormyChatError::Oauth(OauthError::Parse { .. } | OauthError::MissingAccessToken) => {
                let status = StatusCode::BAD_GATEWAY;
                let body = ApiErrorObject {
                    code: "BAD_UPSTREAM_PAYLOAD".to_string(),
                    message: "Failed to parse upstream response.".to_string(),
                    details: None,
                };
                (status, body)
            }

            FormyChatError::Sheets(SheetsError::Request(_))
            | FormyChatError::Oauth(OauthError::Request(_) | OauthError::UpstreamStatus(_)) => {
                let status = StatusCode::BAD_GATEWAY;
                let body = ApiErrorObject {
                    code: "UPSTREAM_ERROR".to_string(),
                    message: "Upstream service error.".to_string(),
                    details: None,
                };
                (status, body)
            }

            FormyChatError::Oauth(
                e @ (OauthError::Revoked(_)
                | OauthError::AlreadyRevoked
                | OauthError::ConnectionChanged
                | OauthError::MissingRefreshToken),
            ) => (
                StatusCode::UNAUTHORIZED,
                ApiErrorObject {
                    code: "revoked".to_string(),
                    message: e.to_string(),
                    details: None,
                },
            ),
        };
        (status, Json(ApiErrorBody { inner: error_body })).into_response()
    }
}

/// Standardized API error response payload.
#[derive(Serialize)]
pub struct ApiErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Serialize)]
pub struct ApiErrorBody {
    #[serde(rename = "error")]
    pub inner: ApiErrorObject,
}
