//! Relay broker server.
//!
//! Wires the HTTP/websocket boundary onto `relay-core`'s domain rules,
//! `relay-storage`'s Postgres/S3 backends, and `relay-push`'s funnel hub,
//! then runs the axum app and the background reaper alongside it.

use axum::routing::{get, post};
use axum::Router;
use axum_extra::extract::cookie::Key;
use clap::Parser;
use relay_storage::{PgCreditRepository, PgTransferRepository, PgUserRepository};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod auth;
mod config;
mod error;
mod handlers;
mod reaper;
mod state;
mod ticket;
mod ws;

use config::RelayConfig;
use state::AppState;

#[derive(Parser)]
#[command(name = "relay-server")]
#[command(about = "HTTP/websocket rendezvous broker for encrypted peer-to-peer file transfer")]
struct Cli {
    /// Optional TOML config file, layered over the defaults and under
    /// `RELAY_`-prefixed environment overrides.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let relay_config = RelayConfig::load(cli.config.as_deref())?;

    tracing::info!(listen = %relay_config.http.listen_address, "starting relay-server");

    let pool = relay_storage::connect(&relay_config.database.url).await?;
    let users: Arc<dyn relay_core::repo::UserRepository> = Arc::new(PgUserRepository::new(pool.clone()));
    let credits: Arc<dyn relay_core::repo::CreditRepository> = Arc::new(PgCreditRepository::new(pool.clone()));
    let transfers: Arc<dyn relay_core::repo::TransferRepository> = Arc::new(PgTransferRepository::new(pool));

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let s3_client = aws_sdk_s3::Client::new(&aws_config);
    let blobs = Arc::new(relay_storage::BlobStore::new(
        s3_client,
        relay_config.object_store.bucket.clone(),
    ));

    let bus = relay_push::Bus::connect(&relay_config.bus.redis_url).await?;
    let hub = Arc::new(relay_push::Hub::new(bus));

    let cookie_key = Key::from(relay_config.session.cookie_signing_key.as_bytes());

    let state = AppState {
        users,
        credits,
        transfers,
        hub,
        blobs,
        config: Arc::new(relay_config.clone()),
        cookie_key,
    };

    let reaper_handle = reaper::spawn(state.clone());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let authenticated_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/code", post(handlers::code::code_handler))
        .route("/init-upload", post(handlers::transfer::init_upload_handler))
        .route("/upload", post(handlers::transfer::upload_handler))
        .route("/download", post(handlers::transfer::download_handler))
        .route(
            "/completed-download",
            post(handlers::transfer::completed_download_handler),
        )
        .route("/register", post(handlers::code::bind_credit_handler))
        .route("/toggle-perm-code", post(handlers::code::toggle_perm_code_handler))
        .route("/custom-code", post(handlers::code::custom_code_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::require_shared_secret,
        ));

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/live", get(handlers::live))
        .merge(authenticated_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&relay_config.http.listen_address).await?;
    axum::serve(listener, app).await?;

    reaper_handle.abort();
    Ok(())
}
