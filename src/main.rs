use formychat::{
    config::Config,
    leads::{LeadEvents, LeadIngest},
    notify::{LeadMailer, build_smtp_transport, spawn_email_notifier},
    server::{FormyChatState, formychat_router},
    sheets::{GoogleSheets, build_http_client},
};
use mimalloc::MiMalloc;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config::from_toml();
    let basic = &cfg.basic;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %basic.database_url,
        loglevel = %basic.loglevel,
        listen_addr = %basic.listen_addr,
        listen_port = basic.listen_port,
        utc_offset_minutes = basic.utc_offset_minutes,
        proxy = %cfg.google_sheets.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
    );

    let db = formychat::db::spawn(&basic.database_url).await;
    let events = LeadEvents::new();
    let ingest = LeadIngest::new(db.clone(), events.clone());

    let sheets_cfg = Arc::new(cfg.google_sheets.clone());
    let http = build_http_client(&sheets_cfg).expect("failed to build HTTP client");
    let sheets = GoogleSheets::spawn(db.clone(), http, sheets_cfg, basic.site_offset())
        .await
        .expect("failed to spawn Google Sheets integration");
    let mut workers = sheets.start_workers(&events);

    if cfg.mail.enabled {
        let mail_cfg = Arc::new(cfg.mail.clone());
        let transport = build_smtp_transport(&mail_cfg).expect("failed to build SMTP transport");
        let mailer = LeadMailer::new(db.clone(), Arc::new(transport), mail_cfg.clone())
            .expect("invalid mail.from address");
        workers.push(spawn_email_notifier(&events, mailer));
        info!(smtp_host = %mail_cfg.smtp_host, "Lead email notifications enabled");
    }

    // Restore the periodic export left configured by a previous run.
    if let Err(e) = sheets.scheduler.maybe_schedule_cron().await {
        warn!(error = %e, "Failed to evaluate sync schedule at startup");
    }

    let state = FormyChatState::new(db, ingest, sheets, basic);
    let app = formychat_router(state);

    let addr = SocketAddr::from((basic.listen_addr, basic.listen_port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server has shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
