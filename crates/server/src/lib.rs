#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::get,
};
use liftlog_domain::{ExerciseRepository, catalog};
use liftlog_storage::Storage;
use serde::Serialize;
use tokio::{net::TcpListener, sync::watch};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

pub mod admin;
pub mod auth;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod exercises;
pub mod extract;
pub mod oauth;
pub mod routines;
pub mod state;
pub mod stats;
pub mod users;
pub mod workouts;

use config::{Config, Environment};
use extract::Json;
use state::{AppState, SharedState};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Builds the complete HTTP application.
pub fn app(state: AppState) -> Router {
    let state = Arc::new(state);
    let api = Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .nest("/auth", auth::router().merge(oauth::router()))
        .nest("/users/me", users::router(&state.config))
        .nest("/exercises", exercises::router())
        .route("/muscles", get(exercises::get_muscles))
        .nest("/routines", routines::router())
        .nest("/workouts", workouts::router())
        .route("/stats", get(stats::get_statistics))
        .nest("/admin", admin::router());

    let mut router = Router::new()
        .nest("/api", api)
        .route("/uploads/{file}", get(users::get_upload))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http());
    if let Some(cors) = cors_layer(&state.config) {
        router = router.layer(cors);
    }
    router.with_state(state)
}

fn cors_layer(config: &Config) -> Option<CorsLayer> {
    let origins = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("ignoring invalid CORS origin {origin}: {err}");
                None
            }
        })
        .collect::<Vec<_>>();

    if origins.is_empty() {
        return match config.environment {
            Environment::Development => Some(CorsLayer::permissive()),
            Environment::Production => None,
        };
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
    )
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: VERSION,
    })
}

async fn version() -> Json<&'static str> {
    Json(VERSION)
}

/// Opens the storage, seeds the exercise catalog and serves until a shutdown signal arrives.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let storage = Storage::open(&config.database)
        .with_context(|| format!("failed to open database {}", config.database.display()))?;
    let seeded = storage
        .seed_catalog(catalog::exercises())
        .await
        .context("failed to seed exercise catalog")?;
    if seeded > 0 {
        info!(exercises = seeded, "exercise catalog seeded");
    }

    let state = AppState::new(config.clone(), storage.clone());
    state
        .avatars
        .init()
        .await
        .with_context(|| format!("failed to create {}", config.upload_dir.display()))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cleanup = cleanup::spawn(storage, config.token_cleanup_interval, shutdown_rx);

    let address = config.address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind to {address}"))?;
    info!(
        address = %address,
        environment = ?config.environment,
        version = VERSION,
        "server listening"
    );

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    let _ = shutdown_tx.send(true);
    if let Err(err) = cleanup.await {
        warn!("session cleanup task failed: {err}");
    }
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl+C, shutting down"),
            Err(err) => {
                warn!("failed to listen for Ctrl+C: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(err) => {
                warn!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
