use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::post,
};
use axum_valid::Valid;

use crate::{
    dto::{position::PositionSampleRequest, session::ActionResponse},
    error::AppError,
    services::presence_service,
    state::SharedState,
};

/// Routes fed by the platform location sensor.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/position", post(submit_position).delete(stop_watch))
        .route("/position/watch", post(start_watch))
        .route("/position/unavailable", post(report_unavailable))
}

/// Submit one position sample.
#[utoipa::path(
    post,
    path = "/position",
    tag = "presence",
    request_body = PositionSampleRequest,
    responses(
        (status = 202, description = "Sample queued for evaluation"),
        (status = 400, description = "Coordinates or accuracy out of range")
    )
)]
pub async fn submit_position(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<PositionSampleRequest>>,
) -> Result<StatusCode, AppError> {
    presence_service::submit_position(&state, payload)?;
    Ok(StatusCode::ACCEPTED)
}

/// Restart a stopped position watch.
#[utoipa::path(
    post,
    path = "/position/watch",
    tag = "presence",
    responses((status = 200, description = "Watch state", body = ActionResponse))
)]
pub async fn start_watch(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(presence_service::start_watch(&state).await?))
}

/// Stop the position watch; samples are ignored until it restarts.
#[utoipa::path(
    delete,
    path = "/position",
    tag = "presence",
    responses((status = 200, description = "Watch state", body = ActionResponse))
)]
pub async fn stop_watch(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(presence_service::stop_watch(&state).await?))
}

/// Report that the platform has no location capability.
#[utoipa::path(
    post,
    path = "/position/unavailable",
    tag = "presence",
    responses((status = 200, description = "Presence is manual only", body = ActionResponse))
)]
pub async fn report_unavailable(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(presence_service::report_unavailable(&state)?))
}
