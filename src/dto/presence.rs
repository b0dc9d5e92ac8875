use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{dao::models::CourtId, dto::format_system_time};

/// State of the position watch feeding the tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SensorStatus {
    /// No sample received yet.
    #[default]
    Idle,
    /// Samples are flowing.
    Active,
    /// The view layer stopped the watch; samples are ignored until it restarts.
    Stopped,
    /// The platform has no location capability; presence is manual only.
    Unavailable,
}

/// Court closest to the last accepted sample.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct NearbyCourt {
    pub court_id: CourtId,
    pub name: String,
    pub distance_m: f64,
}

/// Local view of the presence state.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PresenceSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_in_court_id: Option<CourtId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub court_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nearby: Option<NearbyCourt>,
    pub sensor: SensorStatus,
    /// Number of courts the tracker currently knows about.
    pub known_courts: usize,
    /// RFC 3339 time of the last presence change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_at: Option<String>,
}

impl PresenceSnapshot {
    pub fn stamp(mut self, changed_at: Option<SystemTime>) -> Self {
        self.changed_at = changed_at.map(format_system_time);
        self
    }
}

/// Manual check-in request; without a court the nearest one is used.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ManualCheckInRequest {
    #[serde(default)]
    pub court_id: Option<CourtId>,
}
