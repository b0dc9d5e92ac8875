use tracing::debug;

use crate::{
    dto::{
        position::PositionSampleRequest,
        presence::{ManualCheckInRequest, PresenceSnapshot},
        session::ActionResponse,
    },
    error::ServiceResult,
    state::SharedState,
};

/// Forward a position sample from the platform sensor.
pub fn submit_position(state: &SharedState, request: PositionSampleRequest) -> ServiceResult<()> {
    debug!(accuracy = request.accuracy, "position sample received");
    state.session().submit_position(request.into())
}

/// Record that the platform has no location capability.
pub fn report_unavailable(state: &SharedState) -> ServiceResult<ActionResponse> {
    state.session().sensor_unavailable()?;
    Ok(ActionResponse::new("location marked unavailable"))
}

pub async fn stop_watch(state: &SharedState) -> ServiceResult<ActionResponse> {
    let message = if state.session().stop_watch().await? {
        "position watch stopped"
    } else {
        "position watch already stopped"
    };
    Ok(ActionResponse::new(message))
}

pub async fn start_watch(state: &SharedState) -> ServiceResult<ActionResponse> {
    let message = if state.session().start_watch().await? {
        "position watch started"
    } else {
        "position watch already running"
    };
    Ok(ActionResponse::new(message))
}

pub async fn check_in(
    state: &SharedState,
    request: ManualCheckInRequest,
) -> ServiceResult<PresenceSnapshot> {
    state.session().check_in(request.court_id).await
}

pub async fn check_out(state: &SharedState) -> ServiceResult<PresenceSnapshot> {
    state.session().check_out().await
}

pub async fn snapshot(state: &SharedState) -> ServiceResult<PresenceSnapshot> {
    state.session().presence().await
}
