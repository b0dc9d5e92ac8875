use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        presence::PresenceSnapshot,
        sse::{
            MessageEvent, NoticeEvent, PresenceChangedEvent, RefreshEvent, ServerEvent,
            SystemStatus, VIEW_MESSAGE, VIEW_NOTICE, VIEW_PRESENCE, VIEW_REFRESH, VIEW_STATUS,
        },
    },
    state::SseHub,
};

/// Consumer of the engine's view-facing output.
pub trait ViewSink: Send + Sync {
    fn refresh(&self, event: RefreshEvent);
    fn message(&self, event: MessageEvent);
    fn presence(&self, snapshot: PresenceSnapshot);
    fn notice(&self, notice: NoticeEvent);
    fn stream_status(&self, connected: bool);
}

/// [`ViewSink`] publishing every output on the view SSE hub.
#[derive(Clone)]
pub struct ViewBroadcaster {
    hub: SseHub,
}

impl ViewBroadcaster {
    pub fn new(hub: SseHub) -> Self {
        Self { hub }
    }

    fn publish<T: Serialize>(&self, name: &str, payload: &T) {
        match ServerEvent::json(Some(name.to_string()), payload) {
            Ok(event) => self.hub.broadcast(event),
            Err(err) => warn!(event = name, error = %err, "failed to serialise view event"),
        }
    }
}

impl ViewSink for ViewBroadcaster {
    fn refresh(&self, event: RefreshEvent) {
        self.publish(VIEW_REFRESH, &event);
    }

    fn message(&self, event: MessageEvent) {
        self.publish(VIEW_MESSAGE, &event);
    }

    fn presence(&self, snapshot: PresenceSnapshot) {
        self.publish(VIEW_PRESENCE, &PresenceChangedEvent(snapshot));
    }

    fn notice(&self, notice: NoticeEvent) {
        self.publish(VIEW_NOTICE, &notice);
    }

    fn stream_status(&self, connected: bool) {
        self.publish(VIEW_STATUS, &SystemStatus { degraded: !connected });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::{events::EventCategory, surfaces::SurfaceKind};

    #[tokio::test]
    async fn refresh_is_published_as_named_json_event() {
        let hub = SseHub::new(4);
        let mut rx = hub.subscribe();
        let view = ViewBroadcaster::new(hub);

        view.refresh(RefreshEvent {
            surface: SurfaceKind::CourtPanel,
            court_id: Some(3),
            category: EventCategory::Presence,
            subject: Some(3),
            action: None,
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some(VIEW_REFRESH));
        let body: serde_json::Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(body["surface"], "court_panel");
        assert_eq!(body["court_id"], 3);
        assert!(body.get("action").is_none());
    }

    #[tokio::test]
    async fn notice_carries_level() {
        let hub = SseHub::new(4);
        let mut rx = hub.subscribe();
        ViewBroadcaster::new(hub).notice(NoticeEvent::error("Message failed to send"));

        let event = rx.recv().await.unwrap();
        let body: serde_json::Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(body["level"], "error");
    }
}
