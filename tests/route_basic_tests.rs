use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use formychat::config::{BasicConfig, GoogleSheetsConfig};
use formychat::db::{DbActorHandle, GOOGLE_SHEETS_INTEGRATION_ID};
use formychat::leads::{LeadEvents, LeadIngest};
use formychat::server::{FormyChatState, formychat_router};
use formychat::sheets::{GoogleConnection, GoogleSheets};
use serde_json::{Value, json};
use std::{
    path::PathBuf,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tower::ServiceExt;
use url::Url;

const KEY: &str = "pwd";

async fn build_app(tag: &str) -> (Router, DbActorHandle, PathBuf) {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let mut temp_path = std::env::temp_dir();
    temp_path.push(format!(
        "formychat-routes-{}-{}-{}.sqlite",
        tag,
        std::process::id(),
        nanos
    ));
    let database_url = format!("sqlite:{}", temp_path.display());
    let db = formychat::db::spawn(&database_url).await;

    let basic = BasicConfig {
        admin_key: KEY.to_string(),
        admin_redirect_url: "/admin.php?page=formychat-integrations".to_string(),
        max_submission_bytes: 1024,
        ..Default::default()
    };

    let unreachable = Url::parse("http://127.0.0.1:9").unwrap();
    let cfg = Arc::new(GoogleSheetsConfig {
        sheets_api_base: unreachable.join("/v4/spreadsheets").unwrap(),
        drive_api_base: unreachable.join("/drive/v3/files").unwrap(),
        refresh_endpoint: unreachable.join("/refresh").unwrap(),
        ..Default::default()
    });
    let http = formychat::sheets::build_http_client(&cfg).expect("http client");
    let sheets = GoogleSheets::spawn(db.clone(), http, cfg, basic.site_offset())
        .await
        .expect("spawn sheets");

    let ingest = LeadIngest::new(db.clone(), LeadEvents::new());
    let state = FormyChatState::new(db.clone(), ingest, sheets, &basic);
    (formychat_router(state), db, temp_path)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.expect("request failed");
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn admin(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-formychat-key", KEY);
    match body {
        Some(b) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .expect("failed to build request"),
        None => builder.body(Body::empty()).expect("failed to build request"),
    }
}

#[tokio::test]
async fn admin_routes_require_key_and_submissions_are_public() {
    let (app, _db, temp_path) = build_app("auth").await;

    // 1) no key -> 401
    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/wp-json/formychat/leads")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], json!("unauthorized"));

    // 2) wrong bearer -> 401
    let (status, _) = send(
        &app,
        Request::builder()
            .uri("/wp-json/formychat/leads")
            .header(header::AUTHORIZATION, "Bearer nope")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // 3) public submit stores a lead
    let (status, body) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/wp-json/formychat/v1/submit-form")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "field": { "name": "Ada" }, "widget_id": "3" }).to_string(),
            ))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    let lead_id = body["data"]["lead_id"].as_i64().expect("lead id");
    assert!(lead_id > 0);

    // 4) oversized body -> 413
    let big = json!({ "field": { "blob": "x".repeat(4096) } }).to_string();
    let (status, _) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/wp-json/formychat/v1/submit-form")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, big.len())
            .body(Body::from(big))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    // 5) listing with the key sees the lead
    let (status, body) = send(&app, admin("GET", "/wp-json/formychat/leads", None)).await;
    assert_eq!(status, StatusCode::OK);
    let leads = body.as_array().expect("lead list");
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0]["id"], json!(lead_id));
    assert_eq!(leads[0]["widget_id"], json!(3));
    assert_eq!(leads[0]["field"]["name"], json!("Ada"));

    // 6) bad sort column -> 400
    let (status, body) = send(
        &app,
        admin("GET", "/wp-json/formychat/leads?order_by=secret", None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("invalid_order_by"));

    // 7) delete without ids -> 400, with id -> deleted
    let (status, _) = send(
        &app,
        admin("DELETE", "/wp-json/formychat/leads", Some(json!({}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = send(
        &app,
        admin(
            "DELETE",
            "/wp-json/formychat/leads",
            Some(json!({ "id": [lead_id] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], json!(1));

    // 8) unknown path -> 404
    let (status, _) = send(&app, admin("GET", "/wp-json/formychat/nope", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let _ = tokio::fs::remove_file(&temp_path).await;
}

#[tokio::test]
async fn widget_crud_round_trip() {
    let (app, _db, temp_path) = build_app("widgets").await;

    let (status, body) = send(
        &app,
        admin(
            "POST",
            "/wp-json/formychat/widget",
            Some(json!({ "config": { "color": "green" } })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["id"].as_i64().expect("widget id");
    assert_eq!(body["data"]["name"], json!("Untitled"));

    let (status, _) = send(
        &app,
        admin("PUT", &format!("/wp-json/formychat/widget/{id}"), Some(json!({}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        admin(
            "PUT",
            &format!("/wp-json/formychat/widget/{id}"),
            Some(json!({ "name": "Sales", "is_active": "0" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], json!("Sales"));
    assert_eq!(body["data"]["is_active"], json!(false));

    let (status, _) = send(
        &app,
        admin("GET", &format!("/wp-json/formychat/widget/{}", id + 1), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        admin("DELETE", "/wp-json/formychat/widgets", Some(json!({ "id": id }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], json!(1));

    let (_, body) = send(&app, admin("GET", "/wp-json/formychat/widgets", None)).await;
    assert_eq!(body, json!([]));

    let _ = tokio::fs::remove_file(&temp_path).await;
}

#[tokio::test]
async fn oauth_callback_connects_and_disconnect_clears_everything() {
    let (app, db, temp_path) = build_app("oauth").await;

    let (_, body) = send(
        &app,
        admin("GET", "/wp-json/formychat/integrations/google-sheets/status", None),
    )
    .await;
    assert_eq!(body, json!({ "connected": false }));

    // Missing refresh token: rejected, nothing stored.
    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/oauth2callback?formychat-action=authenticated&integration=googlesheets&access_token=a&key=pwd")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("missing_tokens"));
    assert!(GoogleConnection::load(&db).await.unwrap().is_none());

    // Full callback: stored, enabled, redirected.
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/oauth2callback?formychat-action=authenticated&integration=googlesheets&access_token=a&refresh_token=r&expires_in=3600&email=owner%40example.com&key=pwd")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        resp.headers().get(header::LOCATION).unwrap(),
        "/admin.php?page=formychat-integrations"
    );
    assert!(db.integration_enabled(GOOGLE_SHEETS_INTEGRATION_ID).await.unwrap());

    let (_, body) = send(
        &app,
        admin("GET", "/wp-json/formychat/integrations/google-sheets/status", None),
    )
    .await;
    assert_eq!(body["connected"], json!(true));
    assert_eq!(body["email"], json!("owner@example.com"));
    assert_eq!(body["refresh_token"], json!("r"));
    assert_eq!(body["just_connected"], json!(true));

    // Default settings are scheduled mode, so connecting schedules the export.
    let (_, body) = send(
        &app,
        admin(
            "GET",
            "/wp-json/formychat/integrations/google-sheets/sync-status",
            None,
        ),
    )
    .await;
    assert_eq!(body["schedule"]["scheduled"], json!(true));
    assert_eq!(body["schedule"]["interval"], json!("1h"));

    let (status, body) = send(
        &app,
        admin(
            "POST",
            "/wp-json/formychat/integrations/google-sheets/disconnect",
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));

    let (_, body) = send(
        &app,
        admin("GET", "/wp-json/formychat/integrations/google-sheets/status", None),
    )
    .await;
    assert_eq!(body, json!({ "connected": false }));
    assert!(!db.integration_enabled(GOOGLE_SHEETS_INTEGRATION_ID).await.unwrap());

    let (_, body) = send(
        &app,
        admin(
            "GET",
            "/wp-json/formychat/integrations/google-sheets/sync-status",
            None,
        ),
    )
    .await;
    assert_eq!(body["schedule"]["scheduled"], json!(false));

    let _ = tokio::fs::remove_file(&temp_path).await;
}

#[tokio::test]
async fn sync_settings_ignore_unknown_values() {
    let (app, _db, temp_path) = build_app("settings").await;

    let (status, body) = send(
        &app,
        admin(
            "POST",
            "/wp-json/formychat/integrations/google-sheets/sync-settings",
            Some(json!({
                "sync_mode": "sometimes",
                "sync_interval": "6h",
                "save_only": true
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settings"]["sync_mode"], json!("scheduled"));
    assert_eq!(body["settings"]["sync_interval"], json!("6h"));

    let (_, body) = send(
        &app,
        admin(
            "GET",
            "/wp-json/formychat/integrations/google-sheets/intervals",
            None,
        ),
    )
    .await;
    assert_eq!(body["intervals"]["15m"], json!("Every 15 minutes"));
    assert_eq!(body["intervals"]["daily"], json!("Daily"));

    // Not connected: token and userinfo updates are rejected.
    let (status, body) = send(
        &app,
        admin(
            "POST",
            "/wp-json/formychat/integrations/google-sheets/token",
            Some(json!({ "access_token": "x" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("not_connected"));

    // Integration toggle.
    let (status, body) = send(
        &app,
        admin(
            "POST",
            "/wp-json/formychat/integrations",
            Some(json!({ "integration_id": "google_sheets", "enabled": true })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Integration updated successfully."));

    // Manual sync without a spreadsheet reports the precondition.
    let (status, body) = send(
        &app,
        admin("POST", "/wp-json/formychat/integrations/google-sheets/sync", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("No spreadsheet selected."));

    let _ = tokio::fs::remove_file(&temp_path).await;
}
