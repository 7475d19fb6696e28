mod sweep;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use flowboard_api::app;
use flowboard_api::email::LogMailer;
use flowboard_api::session::SessionSigner;
use flowboard_api::state::{AppState, AppStateInner};
use flowboard_db::Database;

/// Placeholder JWT secrets that MUST NOT reach production.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowboard=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let production = std::env::var("FLOWBOARD_ENV").is_ok_and(|v| v == "production");
    let jwt_secret = std::env::var("FLOWBOARD_JWT_SECRET").unwrap_or_default();
    if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
        if production {
            eprintln!("FATAL: FLOWBOARD_JWT_SECRET is unset or still a placeholder.");
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
        warn!("FLOWBOARD_JWT_SECRET unset, using a dev-only default");
    }
    let jwt_secret = if jwt_secret.is_empty() {
        "dev-secret-change-me".to_string()
    } else {
        jwt_secret
    };

    let db_path: PathBuf = std::env::var("FLOWBOARD_DB_PATH")
        .unwrap_or_else(|_| "flowboard.db".into())
        .into();
    let host = std::env::var("FLOWBOARD_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("FLOWBOARD_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let public_url =
        std::env::var("FLOWBOARD_PUBLIC_URL").unwrap_or_else(|_| "http://localhost:5173".into());
    let sweep_interval_secs: u64 = std::env::var("FLOWBOARD_SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3600);

    // Init database
    let db = Database::open(&db_path)?;

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        signer: SessionSigner::new(&jwt_secret),
        mailer: Arc::new(LogMailer),
        public_url,
        dev_mode: !production,
    });

    // Background sweep of expired magic tokens (housekeeping only)
    tokio::spawn(sweep::run_sweep_loop(state.clone(), sweep_interval_secs));

    let router = app::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Flowboard server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
