use crate::leads::LeadSubmission;
use crate::server::router::FormyChatState;
use axum::{Json, Router, extract::State, routing::post};
use serde_json::{Value, json};
use tower_http::limit::RequestBodyLimitLayer;

pub fn router(max_body_bytes: usize) -> Router<FormyChatState> {
    Router::new().route(
        "/v1/submit-form",
        post(submit_form).layer(RequestBodyLimitLayer::new(max_body_bytes)),
    )
}

/// POST /v1/submit-form
///
/// Always reports success. A failed insert shows up as `lead_id: 0`.
pub async fn submit_form(
    State(state): State<FormyChatState>,
    Json(submission): Json<LeadSubmission>,
) -> Json<Value> {
    let lead_id = state.ingest.submit(submission).await;
    Json(json!({ "success": true, "data": { "lead_id": lead_id } }))
}
