use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{dao::models::CourtId, dto::events::EventCategory};

/// View regions the sync engine knows how to refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    /// Court markers on the map.
    CourtsLayer,
    /// Popup/side panel of one court.
    CourtPanel,
    /// Full detail page of one court.
    CourtPage,
    /// Scheduled play sessions listing.
    SessionsView,
    /// Ranked-match view (queue, lobby, leaderboard).
    RankedView,
    /// Unread notification counter.
    NotificationBadge,
}

impl SurfaceKind {
    /// Surfaces affected by an event category.
    pub fn for_category(category: EventCategory) -> &'static [SurfaceKind] {
        match category {
            EventCategory::Presence => &[
                SurfaceKind::CourtsLayer,
                SurfaceKind::CourtPanel,
                SurfaceKind::CourtPage,
                SurfaceKind::SessionsView,
            ],
            EventCategory::Ranked => &[
                SurfaceKind::RankedView,
                SurfaceKind::CourtPanel,
                SurfaceKind::CourtPage,
            ],
            EventCategory::Notification => &[SurfaceKind::NotificationBadge],
        }
    }
}

/// One surface the view layer reports as open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct VisibleSurface {
    pub kind: SurfaceKind,
    /// Court the surface is bound to; `None` for global surfaces.
    #[serde(default)]
    pub court_id: Option<CourtId>,
}

impl VisibleSurface {
    pub fn global(kind: SurfaceKind) -> Self {
        Self {
            kind,
            court_id: None,
        }
    }

    pub fn scoped(kind: SurfaceKind, court_id: CourtId) -> Self {
        Self {
            kind,
            court_id: Some(court_id),
        }
    }

    /// Whether an event about `subject` concerns this surface.
    ///
    /// Events without a subject and global surfaces always match.
    pub fn matches(&self, subject: Option<CourtId>) -> bool {
        match (subject, self.court_id) {
            (None, _) | (_, None) => true,
            (Some(subject), Some(scope)) => subject == scope,
        }
    }
}

/// Full replacement of the visible surface set.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SurfacesReport {
    pub surfaces: Vec<VisibleSurface>,
}

/// Scroll metrics of a conversation surface, in CSS pixels.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema, Validate)]
pub struct ViewportReport {
    #[validate(range(min = 0.0))]
    pub scroll_top: f64,
    #[validate(range(min = 0.0))]
    pub scroll_height: f64,
    #[validate(range(min = 0.0))]
    pub client_height: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_surface_matches_only_its_court() {
        let panel = VisibleSurface::scoped(SurfaceKind::CourtPanel, 3);
        assert!(panel.matches(Some(3)));
        assert!(!panel.matches(Some(4)));
        assert!(panel.matches(None));
    }

    #[test]
    fn global_surface_matches_everything() {
        let layer = VisibleSurface::global(SurfaceKind::CourtsLayer);
        assert!(layer.matches(Some(9)));
        assert!(layer.matches(None));
    }

    #[test]
    fn notification_category_only_targets_badge() {
        assert_eq!(
            SurfaceKind::for_category(EventCategory::Notification),
            &[SurfaceKind::NotificationBadge]
        );
        assert!(SurfaceKind::for_category(EventCategory::Ranked).contains(&SurfaceKind::RankedView));
    }
}
