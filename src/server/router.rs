use crate::config::BasicConfig;
use crate::db::DbActorHandle;
use crate::leads::LeadIngest;
use crate::server::guards::auth::RequireAdmin;
use crate::server::routes::{google_sheets, integrations, leads, oauth, submit, widgets};
use crate::sheets::GoogleSheets;

use axum::{
    Router,
    extract::Request,
    http::{HeaderName, HeaderValue, Method, StatusCode, Version, header::USER_AGENT},
    middleware::{self, Next},
    response::Response,
};
use base64::Engine as _;
use rand::RngCore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Mount point of every REST route.
pub const REST_PREFIX: &str = "/wp-json/formychat";

const MAX_REQUEST_ID_LEN: usize = 128;
const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

fn new_request_id() -> String {
    let mut raw = [0u8; 12];
    rand::rng().fill_bytes(&mut raw);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(raw)
}

fn protocol_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/?",
    }
}

#[derive(Clone)]
pub struct FormyChatState {
    pub db: DbActorHandle,
    pub ingest: LeadIngest,
    pub sheets: GoogleSheets,
    pub admin_key: Arc<str>,
    pub admin_redirect_url: Arc<str>,
    pub max_submission_bytes: usize,
}

impl FormyChatState {
    pub fn new(
        db: DbActorHandle,
        ingest: LeadIngest,
        sheets: GoogleSheets,
        basic: &BasicConfig,
    ) -> Self {
        Self {
            db,
            ingest,
            sheets,
            admin_key: Arc::from(basic.admin_key.as_str()),
            admin_redirect_url: Arc::from(basic.admin_redirect_url.as_str()),
            max_submission_bytes: basic.max_submission_bytes,
        }
    }
}

async fn not_found_handler() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Request metadata captured before the request moves into the handler stack.
struct AccessEntry {
    method: Method,
    path: String,
    protocol: &'static str,
    request_id: String,
    user_agent: String,
}

impl AccessEntry {
    fn capture(req: &Request) -> Self {
        let headers = req.headers();
        let request_id = headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
            .map_or_else(new_request_id, str::to_string);
        let user_agent = headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string();
        Self {
            method: req.method().clone(),
            path: req.uri().path().to_string(),
            protocol: protocol_label(req.version()),
            request_id,
            user_agent,
        }
    }

    fn emit(&self, status: StatusCode, latency_ms: u64) {
        let status = status.as_u16();
        let method = self.method.as_str();
        match status {
            500.. => error!(
                status,
                request_id = %self.request_id,
                method,
                protocol = self.protocol,
                path = %self.path,
                latency_ms,
                user_agent = %self.user_agent,
                "request failed"
            ),
            400..500 => warn!(
                status,
                request_id = %self.request_id,
                method,
                protocol = self.protocol,
                path = %self.path,
                latency_ms,
                user_agent = %self.user_agent,
                "request rejected"
            ),
            _ => info!(
                status,
                request_id = %self.request_id,
                method,
                protocol = self.protocol,
                path = %self.path,
                latency_ms,
                user_agent = %self.user_agent,
                "request served"
            ),
        }
    }
}

async fn access_log(req: Request, next: Next) -> Response {
    let entry = AccessEntry::capture(&req);
    let started = Instant::now();
    let mut resp = next.run(req).await;

    // Echo the id back, generated or not.
    if let Ok(value) = HeaderValue::from_str(&entry.request_id) {
        resp.headers_mut().insert(X_REQUEST_ID, value);
    }
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    entry.emit(resp.status(), latency_ms);
    resp
}

pub fn formychat_router(state: FormyChatState) -> Router {
    let admin = Router::new()
        .merge(leads::router())
        .merge(widgets::router())
        .merge(integrations::router())
        .merge(google_sheets::router())
        .layer(middleware::from_extractor_with_state::<RequireAdmin, _>(
            state.clone(),
        ));

    let public = submit::router(state.max_submission_bytes);

    // The callback lands on the admin site root, outside the REST namespace.
    let oauth = oauth::router().layer(middleware::from_extractor_with_state::<RequireAdmin, _>(
        state.clone(),
    ));

    Router::new()
        .nest(REST_PREFIX, admin.merge(public))
        .merge(oauth)
        .fallback(not_found_handler)
        .with_state(state)
        .layer(middleware::from_fn(access_log))
}
