use std::sync::Arc;

use tracing::{info, warn};

use fitlink_db::Database;
use fitlink_gateway::auth::JwtVerifier;
use fitlink_server::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fitlink=debug,fitlink_server=debug,fitlink_gateway=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    if config.uses_placeholder_secret() {
        warn!("FITLINK_JWT_SECRET is unset or a placeholder; tokens from the main app will not verify");
    }

    let db = Arc::new(Database::open(&config.db_path)?);

    let dispatcher = fitlink_server::dispatcher(db.clone());
    let app = fitlink_server::app(dispatcher, db, JwtVerifier::new(&config.jwt_secret));

    let addr = config.addr()?;
    info!("FitLink realtime server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
