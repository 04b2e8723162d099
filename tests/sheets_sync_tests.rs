use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header},
};
use chrono::{TimeDelta, Utc};
use formychat::config::GoogleSheetsConfig;
use formychat::db::{DbActorHandle, GOOGLE_SHEETS_INTEGRATION_ID, LeadCreate};
use formychat::sheets::{
    GoogleConnection, GoogleSheets, RefreshAttempt, SyncMode, SyncResult, SyncSettingsPatch,
    settings::update_settings,
};
use serde_json::{Value, json};
use std::{
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};
use tokio::net::TcpListener;
use url::Url;

const SPREADSHEET_ID: &str = "sheet-1";
const APPEND_PATH: &str = "/v4/spreadsheets/sheet-1/values/Leads!A:A:append";
const HEADER_PATH: &str = "/v4/spreadsheets/sheet-1/values/Leads!A1";

#[derive(Debug, Clone)]
struct Captured {
    method: Method,
    path: String,
    authorization: Option<String>,
    body: Value,
}

/// Stand-in for Sheets v4, Drive v3 and the token-refresh proxy.
#[derive(Clone)]
struct MockGoogle {
    calls: Arc<Mutex<Vec<Captured>>>,
    fail_append: Arc<AtomicBool>,
    refresh_status: Arc<AtomicU16>,
    refresh_calls: Arc<AtomicUsize>,
}

impl Default for MockGoogle {
    fn default() -> Self {
        Self {
            calls: Arc::default(),
            fail_append: Arc::default(),
            refresh_status: Arc::new(AtomicU16::new(200)),
            refresh_calls: Arc::default(),
        }
    }
}

impl MockGoogle {
    fn calls_to(&self, path: &str) -> Vec<Captured> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.path == path)
            .cloned()
            .collect()
    }

    fn sheets_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.path.starts_with("/v4/"))
            .count()
    }
}

async fn google_handler(
    State(mock): State<MockGoogle>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> (StatusCode, Json<Value>) {
    let path = uri.path().to_string();
    mock.calls.lock().unwrap().push(Captured {
        method: method.clone(),
        path: path.clone(),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    if path == "/refresh" {
        mock.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let status = StatusCode::from_u16(mock.refresh_status.load(Ordering::SeqCst)).unwrap();
        if status.is_success() {
            return (
                status,
                Json(json!({ "access_token": "access-2", "expires_in": 3600 })),
            );
        }
        return (status, Json(json!({ "error": "invalid_grant" })));
    }

    match (method.as_str(), path.as_str()) {
        ("GET", "/v4/spreadsheets/sheet-1") => (
            StatusCode::OK,
            Json(json!({
                "spreadsheetId": SPREADSHEET_ID,
                "properties": { "title": "Leads export" },
                "sheets": [{ "properties": { "sheetId": 0, "title": "Leads" } }]
            })),
        ),
        ("POST", APPEND_PATH) if mock.fail_append.load(Ordering::SeqCst) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": { "code": 500, "message": "backend down" } })),
        ),
        ("POST", APPEND_PATH)
        | ("PUT", HEADER_PATH)
        | ("POST", "/v4/spreadsheets/sheet-1:batchUpdate")
        | ("POST", "/v4/spreadsheets/sheet-1/values/Leads!A2:ZZ:clear") => {
            (StatusCode::OK, Json(json!({ "spreadsheetId": SPREADSHEET_ID })))
        }
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": { "code": 404, "message": "not found" } })),
        ),
    }
}

async fn spawn_test_server(mock: MockGoogle) -> Url {
    let app = Router::new().fallback(google_handler).with_state(mock);
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    let base = Url::parse(&format!("http://{}", addr)).expect("valid base url");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    base
}

struct Harness {
    db: DbActorHandle,
    sheets: GoogleSheets,
    mock: MockGoogle,
    temp_path: PathBuf,
}

impl Harness {
    async fn cleanup(self) {
        let _ = tokio::fs::remove_file(&self.temp_path).await;
    }
}

/// Connected, enabled, manual mode, spreadsheet selected.
async fn harness(tag: &str, tweak: impl FnOnce(&mut GoogleSheetsConfig)) -> Harness {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let mut temp_path = std::env::temp_dir();
    temp_path.push(format!(
        "formychat-sync-{}-{}-{}.sqlite",
        tag,
        std::process::id(),
        nanos
    ));
    let database_url = format!("sqlite:{}", temp_path.display());
    let db = formychat::db::spawn(&database_url).await;

    let mock = MockGoogle::default();
    let base = spawn_test_server(mock.clone()).await;

    let mut cfg = GoogleSheetsConfig {
        sheets_api_base: base.join("/v4/spreadsheets").unwrap(),
        drive_api_base: base.join("/drive/v3/files").unwrap(),
        refresh_endpoint: base.join("/refresh").unwrap(),
        ..Default::default()
    };
    tweak(&mut cfg);
    let cfg = Arc::new(cfg);

    let http = formychat::sheets::build_http_client(&cfg).expect("http client");
    let sheets = GoogleSheets::spawn(
        db.clone(),
        http,
        cfg,
        chrono::FixedOffset::east_opt(0).unwrap(),
    )
    .await
    .expect("spawn sheets");

    GoogleConnection::from_callback(
        "access-1".to_string(),
        "refresh-1".to_string(),
        Some(3600),
        "owner@example.com".to_string(),
    )
    .save(&db)
    .await
    .expect("save connection");
    db.set_integration_enabled(GOOGLE_SHEETS_INTEGRATION_ID, json!(true))
        .await
        .unwrap();
    update_settings(
        &db,
        SyncSettingsPatch {
            spreadsheet_id: Some(SPREADSHEET_ID.to_string()),
            spreadsheet_name: Some("Leads export".to_string()),
            sync_mode: Some(SyncMode::Manual),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    Harness {
        db,
        sheets,
        mock,
        temp_path,
    }
}

async fn seed_leads(db: &DbActorHandle, fields: &[Value]) -> Vec<i64> {
    let mut ids = Vec::new();
    for field in fields {
        let id = db
            .create_lead(LeadCreate {
                field: field.clone(),
                ..Default::default()
            })
            .await
            .expect("create lead");
        ids.push(id);
    }
    ids
}

#[tokio::test]
async fn full_resync_writes_headers_then_rows_and_is_idempotent() {
    let h = harness("headers", |_| {}).await;
    let ids = seed_leads(
        &h.db,
        &[
            json!({ "name": "Ada", "email": "ada@example.com" }),
            json!({ "name": "Bob" }),
            json!({ "name": "Cy", "email": "cy@example.com" }),
        ],
    )
    .await;

    let engine = &h.sheets.engine;
    assert_eq!(
        engine.get_headers().await.unwrap(),
        vec!["ID", "Widget", "Form", "Date", "Time", "Name", "Email"]
    );

    let result = engine.sync_leads(true).await.expect("sync");
    assert_eq!(result, SyncResult::ok(3));

    let header_calls = h.mock.calls_to(HEADER_PATH);
    assert_eq!(header_calls.len(), 1);
    assert_eq!(header_calls[0].method, Method::PUT);
    assert_eq!(
        header_calls[0].body["values"],
        json!([["ID", "Widget", "Form", "Date", "Time", "Name", "Email"]])
    );

    let appends = h.mock.calls_to(APPEND_PATH);
    assert_eq!(appends.len(), 1);
    assert_eq!(appends[0].authorization.as_deref(), Some("Bearer access-1"));
    let rows = appends[0].body["values"].as_array().expect("rows").clone();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][0], json!(ids[0]));
    assert_eq!(rows[0][2], json!("FormyChat"));
    assert_eq!(rows[1][5], json!("Bob"));
    assert_eq!(rows[1][6], json!(""), "missing field is an empty cell");

    let stats = engine.get_sync_stats().await.unwrap();
    assert_eq!((stats.total, stats.synced, stats.pending), (3, 3, 0));
    assert_eq!(stats.last_count, 3);
    assert!(stats.last_sync.is_some());
    assert!(stats.last_error.is_none());

    // Nothing new: no further append.
    let again = engine.sync_leads(false).await.expect("second sync");
    assert_eq!(again, SyncResult::ok(0));
    assert_eq!(h.mock.calls_to(APPEND_PATH).len(), 1);

    // A new lead only pushes itself.
    seed_leads(&h.db, &[json!({ "name": "Dee" })]).await;
    let incremental = engine.sync_leads(false).await.expect("incremental sync");
    assert_eq!(incremental, SyncResult::ok(1));
    let appends = h.mock.calls_to(APPEND_PATH);
    assert_eq!(appends.len(), 2);
    assert_eq!(appends[1].body["values"].as_array().unwrap().len(), 1);

    // Full resync pushes everything again into a cleared sheet.
    let full = engine.sync_leads(true).await.expect("full resync");
    assert_eq!(full, SyncResult::ok(4));
    assert_eq!(h.mock.calls_to(HEADER_PATH).len(), 2);

    h.cleanup().await;
}

#[tokio::test]
async fn free_tier_quota_caps_pushed_rows() {
    let h = harness("quota", |cfg| cfg.free_limit = 2).await;
    seed_leads(
        &h.db,
        &[json!({ "n": 1 }), json!({ "n": 2 }), json!({ "n": 3 })],
    )
    .await;

    let engine = &h.sheets.engine;
    assert_eq!(engine.get_remaining_slots().await.unwrap(), 2);

    let first = engine.sync_leads(false).await.unwrap();
    assert_eq!(first, SyncResult::ok(2));
    assert!(engine.is_limit_reached().await.unwrap());

    let capped = engine.sync_leads(false).await.unwrap();
    assert_eq!(
        capped,
        SyncResult::failed("Free tier limit reached. Upgrade to sync more leads.")
    );
    assert_eq!(h.mock.calls_to(APPEND_PATH).len(), 1);

    let stats = engine.get_sync_stats().await.unwrap();
    assert_eq!((stats.synced, stats.pending), (2, 1));

    h.cleanup().await;
}

#[tokio::test]
async fn premium_has_no_quota() {
    let h = harness("premium", |cfg| {
        cfg.free_limit = 1;
        cfg.premium = true;
    })
    .await;
    seed_leads(&h.db, &[json!({ "n": 1 }), json!({ "n": 2 })]).await;

    let engine = &h.sheets.engine;
    assert_eq!(engine.get_remaining_slots().await.unwrap(), u64::MAX);
    assert_eq!(engine.sync_leads(false).await.unwrap(), SyncResult::ok(2));

    h.cleanup().await;
}

#[tokio::test]
async fn preconditions_fail_without_remote_calls() {
    let h = harness("preconditions", |_| {}).await;
    seed_leads(&h.db, &[json!({ "n": 1 })]).await;
    let engine = &h.sheets.engine;

    h.db.set_integration_enabled(GOOGLE_SHEETS_INTEGRATION_ID, json!(false))
        .await
        .unwrap();
    assert_eq!(
        engine.sync_leads(false).await.unwrap(),
        SyncResult::failed("Google Sheets integration is disabled.")
    );

    h.db.set_integration_enabled(GOOGLE_SHEETS_INTEGRATION_ID, json!(true))
        .await
        .unwrap();
    update_settings(
        &h.db,
        SyncSettingsPatch {
            spreadsheet_id: Some(String::new()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(
        engine.sync_leads(false).await.unwrap(),
        SyncResult::failed("No spreadsheet selected.")
    );

    assert_eq!(h.mock.sheets_calls(), 0);
    h.cleanup().await;
}

#[tokio::test]
async fn append_failure_is_recorded_and_leads_stay_pending() {
    let h = harness("append-failure", |_| {}).await;
    seed_leads(&h.db, &[json!({ "n": 1 }), json!({ "n": 2 })]).await;
    h.mock.fail_append.store(true, Ordering::SeqCst);

    let engine = &h.sheets.engine;
    let result = engine.sync_leads(false).await.expect("no local error");
    assert_eq!(result, SyncResult::failed("backend down"));

    let stats = engine.get_sync_stats().await.unwrap();
    assert_eq!(stats.pending, 2);
    assert_eq!(stats.last_error.as_deref(), Some("backend down"));

    // Recovery clears the recorded error.
    h.mock.fail_append.store(false, Ordering::SeqCst);
    assert_eq!(engine.sync_leads(false).await.unwrap(), SyncResult::ok(2));
    assert!(engine.get_sync_stats().await.unwrap().last_error.is_none());

    h.cleanup().await;
}

#[tokio::test]
async fn realtime_mode_pushes_single_leads_once() {
    let h = harness("realtime", |_| {}).await;
    let ids = seed_leads(&h.db, &[json!({ "email": "a@example.com" })]).await;
    let engine = &h.sheets.engine;

    // Manual mode ignores new leads.
    assert!(!engine.handle_realtime_sync(ids[0]).await.unwrap());
    assert!(h.mock.calls_to(APPEND_PATH).is_empty());

    update_settings(
        &h.db,
        SyncSettingsPatch {
            sync_mode: Some(SyncMode::Realtime),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert!(engine.handle_realtime_sync(ids[0]).await.unwrap());
    assert!(!engine.handle_realtime_sync(ids[0]).await.unwrap(), "already synced");
    assert!(!engine.handle_realtime_sync(0).await.unwrap(), "failed insert id");

    let appends = h.mock.calls_to(APPEND_PATH);
    assert_eq!(appends.len(), 1);
    assert_eq!(appends[0].body["values"].as_array().unwrap().len(), 1);

    h.cleanup().await;
}

#[tokio::test]
async fn expired_token_is_refreshed_before_the_request() {
    let h = harness("refresh-ok", |_| {}).await;
    let mut conn = GoogleConnection::load(&h.db).await.unwrap().unwrap();
    conn.token_expires = Some(Utc::now() - TimeDelta::seconds(60));
    conn.save(&h.db).await.unwrap();
    seed_leads(&h.db, &[json!({ "n": 1 })]).await;

    let result = h.sheets.engine.sync_leads(false).await.unwrap();
    assert_eq!(result, SyncResult::ok(1));
    assert_eq!(h.mock.refresh_calls.load(Ordering::SeqCst), 1);

    let refresh = h.mock.calls_to("/refresh");
    assert_eq!(refresh[0].body, json!({ "refresh_token": "refresh-1" }));

    let appends = h.mock.calls_to(APPEND_PATH);
    assert_eq!(appends[0].authorization.as_deref(), Some("Bearer access-2"));

    let stored = GoogleConnection::load(&h.db).await.unwrap().unwrap();
    assert_eq!(stored.access_token_secret(), Some("access-2"));
    assert!(!stored.is_expired(Utc::now()));

    // The background refresher is now gated.
    assert!(matches!(
        h.sheets.tokens.maybe_refresh_token().await.unwrap(),
        RefreshAttempt::Gated
    ));
    assert_eq!(h.mock.refresh_calls.load(Ordering::SeqCst), 1);

    h.cleanup().await;
}

#[tokio::test]
async fn rejected_refresh_marks_connection_revoked_and_stops_retrying() {
    let h = harness("revoked", |_| {}).await;
    h.mock.refresh_status.store(401, Ordering::SeqCst);

    let attempt = h.sheets.tokens.maybe_refresh_token().await.unwrap();
    assert!(matches!(attempt, RefreshAttempt::Failed(_)));
    assert_eq!(h.mock.refresh_calls.load(Ordering::SeqCst), 1);

    let stored = GoogleConnection::load(&h.db).await.unwrap().unwrap();
    assert!(stored.revoked);
    assert!(stored.revoked_at.is_some());
    assert_eq!(stored.access_token_secret(), Some("access-1"), "token kept");

    // Later checks see the revocation and never call the proxy again.
    assert!(matches!(
        h.sheets.tokens.maybe_refresh_token().await.unwrap(),
        RefreshAttempt::Revoked
    ));
    seed_leads(&h.db, &[json!({ "n": 1 })]).await;
    let result = h.sheets.engine.sync_leads(false).await.unwrap();
    assert_eq!(result, SyncResult::failed("Google Sheets is not connected."));
    assert_eq!(h.mock.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.mock.sheets_calls(), 0);

    h.cleanup().await;
}

#[tokio::test]
async fn refresh_result_is_dropped_when_connection_changes_mid_exchange() {
    use formychat::FormyChatError;
    use formychat::error::OauthError;

    let h = harness("refresh-race", |_| {}).await;

    // Disconnected while the exchange is in flight: nothing is written back.
    let in_flight = GoogleConnection::load(&h.db).await.unwrap().unwrap();
    assert!(GoogleConnection::delete(&h.db).await.unwrap());
    let err = h.sheets.tokens.refresh_token(in_flight).await.unwrap_err();
    assert!(matches!(
        err,
        FormyChatError::Oauth(OauthError::ConnectionChanged)
    ));
    assert_eq!(h.mock.refresh_calls.load(Ordering::SeqCst), 1);
    assert!(GoogleConnection::load(&h.db).await.unwrap().is_none());

    // Reconnected with new tokens: a late rejection must not revoke the new connection.
    let stale = GoogleConnection::from_callback(
        "access-old".to_string(),
        "refresh-old".to_string(),
        Some(3600),
        "owner@example.com".to_string(),
    );
    GoogleConnection::from_callback(
        "access-new".to_string(),
        "refresh-new".to_string(),
        Some(3600),
        "owner@example.com".to_string(),
    )
    .save(&h.db)
    .await
    .unwrap();
    h.mock.refresh_status.store(401, Ordering::SeqCst);
    let err = h.sheets.tokens.refresh_token(stale).await.unwrap_err();
    assert!(matches!(
        err,
        FormyChatError::Oauth(OauthError::ConnectionChanged)
    ));
    let stored = GoogleConnection::load(&h.db).await.unwrap().unwrap();
    assert!(!stored.revoked);
    assert_eq!(stored.access_token_secret(), Some("access-new"));

    h.cleanup().await;
}

#[tokio::test]
async fn submitted_lead_reaches_the_sheet_through_the_realtime_listener() {
    use formychat::leads::{LeadEvents, LeadIngest, LeadSubmission};
    use std::time::Duration;

    let h = harness("listener", |_| {}).await;
    update_settings(
        &h.db,
        SyncSettingsPatch {
            sync_mode: Some(SyncMode::Realtime),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let events = LeadEvents::new();
    let workers = h.sheets.start_workers(&events);
    let ingest = LeadIngest::new(h.db.clone(), events);

    let lead_id = ingest
        .submit(LeadSubmission {
            field: json!({ "email": "rt@example.com" }),
            ..Default::default()
        })
        .await;
    assert!(lead_id > 0);

    let mut pushed = false;
    for _ in 0..50 {
        if !h.mock.calls_to(APPEND_PATH).is_empty() {
            pushed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(pushed, "realtime listener should append the new lead");

    let appends = h.mock.calls_to(APPEND_PATH);
    assert_eq!(appends[0].body["values"][0][0], json!(lead_id));

    for worker in workers {
        worker.abort();
    }
    h.cleanup().await;
}
