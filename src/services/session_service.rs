use tracing::info;

use crate::{
    dto::{
        session::{ActionResponse, LoginRequest},
        surfaces::SurfacesReport,
    },
    state::SharedState,
};

/// Install a bearer credential; the engine and event stream pick it up.
pub fn login(state: &SharedState, request: LoginRequest) -> ActionResponse {
    let replaced = state.credentials().is_present();
    state.credentials().set(request.token.trim());
    info!(replaced, "credential installed");
    ActionResponse::new("signed in")
}

/// Drop the credential. Presence resets locally without contacting the server.
pub fn logout(state: &SharedState) -> ActionResponse {
    if state.credentials().clear() {
        info!("credential cleared");
        ActionResponse::new("signed out")
    } else {
        ActionResponse::new("already signed out")
    }
}

/// Replace the set of visible surfaces.
pub fn report_surfaces(state: &SharedState, report: SurfacesReport) -> ActionResponse {
    let visible = state.surfaces().replace(report.surfaces);
    ActionResponse::new(format!("{visible} surfaces visible"))
}
