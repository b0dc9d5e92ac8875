use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::state::geo::PositionSample;

/// Location fix forwarded by the platform's position watch.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema, Validate)]
pub struct PositionSampleRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    /// Radius of the 68% confidence circle, in meters.
    #[validate(range(min = 0.0))]
    pub accuracy: f64,
    /// Sensor timestamp in milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp_ms: Option<u64>,
}

impl From<PositionSampleRequest> for PositionSample {
    fn from(request: PositionSampleRequest) -> Self {
        Self {
            latitude: request.latitude,
            longitude: request.longitude,
            accuracy_m: request.accuracy,
            timestamp_ms: request.timestamp_ms,
        }
    }
}
