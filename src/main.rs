use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;

mod ai_launcher;
mod chat;
mod config;
mod error;
mod protocol;
mod rules;
mod session;
mod store;
mod ws;

use ai_launcher::AiLauncher;
use config::Config;
use session::SessionManager;
use store::StoreGateway;
use ws::{AppState, ws_handler};

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to Postgres");
    tracing::info!("connected to Postgres");

    let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();

    let store = StoreGateway::open(pool, &config.machine_id_path, config.run_db_setup, events_tx)
        .await
        .expect("failed to open store gateway");
    tracing::info!(identity = %store.identity(), "server identity established");

    let sessions = Arc::new(SessionManager::new(Arc::new(store)));
    tokio::spawn(Arc::clone(&sessions).run_dispatcher(events_rx));

    let ai_launcher = AiLauncher::new(config.ai_server_url.clone());

    let state = AppState {
        sessions,
        ai_launcher,
        origin_suffix: Arc::new(config.origin_suffix.clone()),
    };

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(addr, "igo-server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app.into_make_service()).await.unwrap();
}
