use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report degraded while the server event stream is down.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    if state.is_degraded() {
        if state.credentials().is_present() {
            warn!("server event stream disconnected (degraded mode)");
        }
        return HealthResponse::degraded();
    }

    HealthResponse::ok()
}
