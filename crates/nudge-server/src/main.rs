use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    middleware,
    routing::{delete, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use nudge_api::auth::{self, AppState, AppStateInner};
use nudge_api::devices;
use nudge_api::middleware::require_auth;
use nudge_push::{Dispatcher, PushTransport, Registry, WebPushTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nudge=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("NUDGE_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("NUDGE_DB_PATH").unwrap_or_else(|_| "nudge.db".into());
    let host = std::env::var("NUDGE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("NUDGE_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let vapid_private_key = std::env::var("NUDGE_VAPID_PRIVATE_KEY")
        .context("NUDGE_VAPID_PRIVATE_KEY must be set (base64url 32-byte P-256 scalar)")?;
    let vapid_contact =
        std::env::var("NUDGE_VAPID_CONTACT").unwrap_or_else(|_| "mailto:admin@localhost".into());

    // Init database
    let db = Arc::new(nudge_db::Database::open(&PathBuf::from(&db_path))?);

    // The push transport is constructed once here; a bad VAPID key is a
    // deployment problem and fails the process, never a request.
    let transport: Arc<dyn PushTransport> =
        Arc::new(WebPushTransport::new(&vapid_private_key, &vapid_contact)?);

    // Shared state
    let registry = Registry::new(db.clone());
    let dispatcher = Dispatcher::new(db.clone(), transport);
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        registry,
        dispatcher,
    });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/api/push/subscribe", post(devices::register_device))
        .route("/api/push/unsubscribe", delete(devices::unregister_device))
        .route("/api/push/test", post(devices::send_test_notification))
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Nudge server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
