use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::presence::{ManualCheckInRequest, PresenceSnapshot},
    error::AppError,
    services::presence_service,
    state::SharedState,
};

/// Manual presence controls and the local presence readout.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/presence", get(presence))
        .route("/presence/checkin", post(check_in))
        .route("/presence/checkout", post(check_out))
}

#[utoipa::path(
    get,
    path = "/presence",
    tag = "presence",
    responses((status = 200, description = "Local presence state", body = PresenceSnapshot))
)]
pub async fn presence(
    State(state): State<SharedState>,
) -> Result<Json<PresenceSnapshot>, AppError> {
    Ok(Json(presence_service::snapshot(&state).await?))
}

/// Check in at a court, or at the nearest one when none is given.
#[utoipa::path(
    post,
    path = "/presence/checkin",
    tag = "presence",
    request_body = ManualCheckInRequest,
    responses(
        (status = 200, description = "Checked in", body = PresenceSnapshot),
        (status = 401, description = "No credential"),
        (status = 502, description = "Court service refused the check-in")
    )
)]
pub async fn check_in(
    State(state): State<SharedState>,
    Json(payload): Json<ManualCheckInRequest>,
) -> Result<Json<PresenceSnapshot>, AppError> {
    Ok(Json(presence_service::check_in(&state, payload).await?))
}

#[utoipa::path(
    post,
    path = "/presence/checkout",
    tag = "presence",
    responses(
        (status = 200, description = "Checked out", body = PresenceSnapshot),
        (status = 401, description = "No credential")
    )
)]
pub async fn check_out(
    State(state): State<SharedState>,
) -> Result<Json<PresenceSnapshot>, AppError> {
    Ok(Json(presence_service::check_out(&state).await?))
}
