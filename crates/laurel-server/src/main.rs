use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use laurel_api::auth::AppStateInner;
use laurel_api::notify::{LogMailer, RandomCodes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "laurel=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("LAUREL_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("LAUREL_DB_PATH").unwrap_or_else(|_| "laurel.db".into());
    let host = std::env::var("LAUREL_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("LAUREL_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let mail_from =
        std::env::var("LAUREL_MAIL_FROM").unwrap_or_else(|_| "noreply@laurel.local".into());

    // Init database
    let db = laurel_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state with the production collaborators; tests swap in
    // deterministic ones.
    let state = Arc::new(AppStateInner {
        db,
        jwt_secret,
        codes: Box::new(RandomCodes),
        mailer: Box::new(LogMailer { from: mail_from }),
    });

    let app = laurel_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Laurel server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
