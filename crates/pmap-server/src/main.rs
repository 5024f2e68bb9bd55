use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use pmap_api::auth::{AppState, AppStateInner};

/// Placeholder JWT secret that is only acceptable for local development.
const DEV_SECRET: &str = "dev-secret-change-me";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pmap=debug,pmap_api=debug,pmap_db=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret = std::env::var("PMAP_JWT_SECRET").unwrap_or_else(|_| DEV_SECRET.into());
    if jwt_secret == DEV_SECRET {
        warn!("PMAP_JWT_SECRET is unset; using the development placeholder");
    }
    let db_path = std::env::var("PMAP_DB_PATH").unwrap_or_else(|_| "pmap.db".into());
    let upload_dir: PathBuf = std::env::var("PMAP_UPLOAD_DIR")
        .unwrap_or_else(|_| "./uploads".into())
        .into();
    let host = std::env::var("PMAP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PMAP_PORT")
        .unwrap_or_else(|_| "8080".into())
        .parse()?;

    // Init database
    let db = pmap_db::Database::open(&PathBuf::from(&db_path))?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        upload_dir,
    });

    let app = pmap_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Problem map server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl+C, shutting down...");
    }
}
