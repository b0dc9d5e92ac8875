use axum::{
    Json, Router,
    extract::State,
    routing::{post, put},
};
use axum_valid::Valid;

use crate::{
    dto::{
        session::{ActionResponse, LoginRequest},
        surfaces::SurfacesReport,
    },
    services::session_service,
    state::SharedState,
};

/// Credential and visible-surface reporting.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/session/login", post(login))
        .route("/session/logout", post(logout))
        .route("/surfaces", put(report_surfaces))
}

/// Install the bearer credential of the signed-in user.
#[utoipa::path(
    post,
    path = "/session/login",
    tag = "session",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credential installed", body = ActionResponse),
        (status = 400, description = "Malformed token")
    )
)]
pub async fn login(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<LoginRequest>>,
) -> Json<ActionResponse> {
    Json(session_service::login(&state, payload))
}

/// Drop the credential and reset presence locally.
#[utoipa::path(
    post,
    path = "/session/logout",
    tag = "session",
    responses((status = 200, description = "Credential cleared", body = ActionResponse))
)]
pub async fn logout(State(state): State<SharedState>) -> Json<ActionResponse> {
    Json(session_service::logout(&state))
}

/// Replace the set of surfaces currently visible in the view layer.
#[utoipa::path(
    put,
    path = "/surfaces",
    tag = "session",
    request_body = SurfacesReport,
    responses((status = 200, description = "Visible surfaces recorded", body = ActionResponse))
)]
pub async fn report_surfaces(
    State(state): State<SharedState>,
    Json(payload): Json<SurfacesReport>,
) -> Json<ActionResponse> {
    Json(session_service::report_surfaces(&state, payload))
}
