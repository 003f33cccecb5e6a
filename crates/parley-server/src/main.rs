use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use tracing::{info, warn};

use parley_api::auth::AppStateInner;
use parley_db::Database;
use parley_gateway::{DiskFileStore, Gateway, JwtVerifier, SqliteMessageStore};
use parley_server::app::build_router;
use parley_server::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "parley_server=debug,parley_gateway=debug,parley_api=debug,tower_http=debug".into()
            }),
        )
        .init();

    // Config
    let config = ServerConfig::from_env()?;
    if config.has_placeholder_secret() {
        warn!("PARLEY_JWT_SECRET is unset or still a placeholder; set it before deploying");
    }
    let client_origin = HeaderValue::from_str(&config.client_url)?;

    // Init database and stores
    let db = Arc::new(Database::open(&config.db_path)?);
    let files = DiskFileStore::new(config.uploads_dir.clone()).await?;

    let gateway = Gateway::new(
        config.gateway.clone(),
        Arc::new(JwtVerifier::new(&config.jwt_secret)),
        Arc::new(SqliteMessageStore::new(db.clone())),
        Arc::new(files),
    );
    let api = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
    });

    let app = build_router(api, gateway, &config.uploads_dir, client_origin);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Parley server listening on {}", addr);
    info!(
        "Heartbeat every {:?}, pong deadline {:?}",
        config.gateway.heartbeat_interval, config.gateway.heartbeat_timeout
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Parley server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
