//! Debounced fan-out of server-pushed events to visible surfaces.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::{
    dao::models::CourtId,
    dto::{
        events::{EventCategory, InboundEvent, PresenceUpdate, RankedUpdate},
        sse::RefreshEvent,
        surfaces::SurfaceKind,
    },
    state::{debounce::Debouncer, surfaces::SurfaceVisibility},
};

pub const PRESENCE_DEBOUNCE: Duration = Duration::from_millis(250);
pub const RANKED_DEBOUNCE: Duration = Duration::from_millis(250);
pub const NOTIFICATION_DEBOUNCE: Duration = Duration::from_millis(150);

/// Quiet period per event category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceWindows {
    pub presence: Duration,
    pub ranked: Duration,
    pub notification: Duration,
}

impl DebounceWindows {
    pub fn for_category(&self, category: EventCategory) -> Duration {
        match category {
            EventCategory::Presence => self.presence,
            EventCategory::Ranked => self.ranked,
            EventCategory::Notification => self.notification,
        }
    }
}

impl Default for DebounceWindows {
    fn default() -> Self {
        Self {
            presence: PRESENCE_DEBOUNCE,
            ranked: RANKED_DEBOUNCE,
            notification: NOTIFICATION_DEBOUNCE,
        }
    }
}

/// Context kept for the latest event of a category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshContext {
    pub subject: Option<CourtId>,
    pub action: Option<String>,
}

impl RefreshContext {
    pub fn about(subject: Option<CourtId>, action: Option<String>) -> Self {
        Self { subject, action }
    }

    fn from_event(event: InboundEvent) -> Option<(EventCategory, Self)> {
        let category = event.category()?;
        let context = match event {
            InboundEvent::PresenceUpdate(PresenceUpdate { court_id, action }) => {
                Self::about(court_id, action)
            }
            InboundEvent::RankedUpdate(RankedUpdate { court_id, reason }) => {
                Self::about(court_id, reason)
            }
            InboundEvent::NotificationUpdate | InboundEvent::NewMessage(_) => Self::default(),
        };
        Some((category, context))
    }
}

/// Merges bursts of events into one refresh per category and visible surface.
#[derive(Debug, Clone)]
pub struct EventCoalescer {
    windows: DebounceWindows,
    pending: Debouncer<EventCategory, RefreshContext>,
}

impl EventCoalescer {
    pub fn new(windows: DebounceWindows) -> Self {
        Self {
            windows,
            pending: Debouncer::new(),
        }
    }

    /// Record an inbound event. Chat messages are not coalesced and return `false`.
    pub fn push(&mut self, event: InboundEvent, now: Instant) -> bool {
        let Some((category, context)) = RefreshContext::from_event(event) else {
            return false;
        };
        self.schedule(category, context, now);
        true
    }

    /// Schedule (or supersede) the refresh of `category`.
    pub fn schedule(&mut self, category: EventCategory, context: RefreshContext, now: Instant) {
        let delay = self.windows.for_category(category);
        if self.pending.schedule(category, context, delay, now) {
            debug!(?category, "coalesced event into pending refresh");
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.next_deadline()
    }

    /// Resolve every category whose quiet period elapsed into per-surface refreshes.
    pub fn fire_due(&mut self, now: Instant, surfaces: &dyn SurfaceVisibility) -> Vec<RefreshEvent> {
        let mut refreshes = Vec::new();
        for fired in self.pending.take_due(now) {
            let category = fired.key;
            let context = fired.context;
            let before = refreshes.len();

            for kind in SurfaceKind::for_category(category) {
                for surface in surfaces.visible(*kind) {
                    if !surface.matches(context.subject) {
                        continue;
                    }
                    refreshes.push(RefreshEvent {
                        surface: surface.kind,
                        court_id: surface.court_id,
                        category,
                        subject: context.subject,
                        action: context.action.clone(),
                    });
                }
            }

            debug!(
                ?category,
                subject = ?context.subject,
                superseded = fired.superseded,
                refreshes = refreshes.len() - before,
                "debounce window elapsed"
            );
        }
        refreshes
    }

    /// Drop every pending refresh.
    pub fn cancel_all(&mut self) -> usize {
        self.pending.cancel_all()
    }
}
