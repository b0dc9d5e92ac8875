pub mod debounce;
pub mod geo;
pub mod messages;
pub mod presence;
mod sse;
pub mod surfaces;
pub mod tracker;

use std::sync::Arc;

use tokio::sync::{Mutex, watch};

use crate::{
    config::AppConfig,
    dao::credentials::Credentials,
    services::session::{SessionHandle, SyncSession},
};

pub use self::sse::SseHub;
use self::surfaces::SurfaceRegistry;

pub type SharedState = Arc<AppState>;

/// Central application state shared by the HTTP bridge.
pub struct AppState {
    config: AppConfig,
    credentials: Credentials,
    surfaces: Arc<SurfaceRegistry>,
    view_sse: SseHub,
    session: SessionHandle,
    connection: watch::Receiver<bool>,
    lifecycle: Mutex<SyncSession>,
}

impl AppState {
    /// Wrap a started [`SyncSession`] and its collaborators into a [`SharedState`].
    pub fn new(
        config: AppConfig,
        credentials: Credentials,
        surfaces: Arc<SurfaceRegistry>,
        view_sse: SseHub,
        session: SyncSession,
    ) -> SharedState {
        Arc::new(Self {
            config,
            credentials,
            surfaces,
            view_sse,
            session: session.handle(),
            connection: session.connection(),
            lifecycle: Mutex::new(session),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Credential shared by the engine, the HTTP client and the event stream.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Surfaces the view layer reported as visible.
    pub fn surfaces(&self) -> &SurfaceRegistry {
        &self.surfaces
    }

    /// Broadcast hub feeding the view SSE stream.
    pub fn view_sse(&self) -> &SseHub {
        &self.view_sse
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Degraded while the server event stream is disconnected.
    pub fn is_degraded(&self) -> bool {
        !*self.connection.borrow()
    }

    /// Stop the sync session; later calls are no-ops.
    pub async fn shutdown(&self) {
        self.lifecycle.lock().await.stop().await;
    }
}
