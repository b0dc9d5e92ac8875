use axum::Router;

use crate::state::SharedState;

pub mod chat;
pub mod docs;
pub mod health;
pub mod position;
pub mod presence;
pub mod session;
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(position::router())
        .merge(presence::router())
        .merge(chat::router())
        .merge(session::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
