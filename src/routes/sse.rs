use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/view",
    tag = "sse",
    responses((status = 200, description = "View SSE stream: refresh, message, presence, notice and status events", content_type = "text/event-stream", body = String))
)]
/// Stream render instructions to the view layer.
pub async fn view_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let subscription = sse_service::subscribe_view(&state);
    info!(connection_id = %subscription.connection_id, "New view SSE connection");
    sse_service::to_sse_stream(subscription)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/view", get(view_stream))
}
