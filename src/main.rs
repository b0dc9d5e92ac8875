//! Courtside sync bridge entrypoint wiring the court-finder client, the sync
//! session and the view-facing REST and SSE layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use courtside_sync::{
    config::AppConfig,
    dao::{
        court_api::http::{HttpConfig, HttpCourtApi, SseEventSource},
        credentials::Credentials,
    },
    routes,
    services::{
        session::{SessionDeps, SyncSession},
        view_events::ViewBroadcaster,
    },
    state::{AppState, SharedState, SseHub, surfaces::SurfaceRegistry},
};

/// Capacity of the view broadcast channel.
const VIEW_SSE_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let credentials = Credentials::new(env::var("COURTSIDE_TOKEN").ok());

    let http_config =
        HttpConfig::new(config.api_base_url.clone()).with_event_stream_path(config.event_stream_path.clone());
    let api = HttpCourtApi::new(&http_config, credentials.clone())
        .context("building court service client")?;
    let events = SseEventSource::new(&api, &http_config);

    let hub = SseHub::new(VIEW_SSE_CAPACITY);
    let surfaces = Arc::new(SurfaceRegistry::new());
    let session = SyncSession::start(SessionDeps {
        tuning: config.sync.clone(),
        api: Arc::new(api),
        events: Some(Arc::new(events)),
        credentials: credentials.clone(),
        surfaces: surfaces.clone(),
        view: Arc::new(ViewBroadcaster::new(hub.clone())),
    });

    info!(
        api = %config.api_base_url,
        authenticated = credentials.is_present(),
        "sync session running"
    );
    let app_state = AppState::new(config, credentials, surfaces, hub, session);
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state.clone());

    let port = env::var("PORT")
        .or_else(|_| env::var("BRIDGE_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8090);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    app_state.shutdown().await;
    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
