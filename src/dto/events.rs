//! Server-pushed events consumed by the sync engine.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use utoipa::ToSchema;

use crate::{
    dao::models::{ChatMessage, CourtId},
    dto::sse::ServerEvent,
};

pub const EVENT_PRESENCE_UPDATE: &str = "presence_update";
pub const EVENT_RANKED_UPDATE: &str = "ranked_update";
pub const EVENT_NOTIFICATION_UPDATE: &str = "notification_update";
pub const EVENT_NEW_MESSAGE: &str = "new_message";

/// Debounced event families; each owns at most one pending refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Presence,
    Ranked,
    Notification,
}

/// Payload of `presence_update`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct PresenceUpdate {
    #[serde(default)]
    pub court_id: Option<CourtId>,
    /// `checkin`, `checkout`, `lfg_toggle`, ...
    #[serde(default)]
    pub action: Option<String>,
}

/// Payload of `ranked_update`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RankedUpdate {
    #[serde(default)]
    pub court_id: Option<CourtId>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Event received from the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    PresenceUpdate(PresenceUpdate),
    RankedUpdate(RankedUpdate),
    NotificationUpdate,
    NewMessage(ChatMessage),
}

impl InboundEvent {
    /// Decode a stream frame. Unknown or unnamed frames yield `Ok(None)`.
    pub fn from_frame(frame: &ServerEvent) -> serde_json::Result<Option<Self>> {
        let Some(name) = frame.event.as_deref() else {
            return Ok(None);
        };

        let event = match name {
            EVENT_PRESENCE_UPDATE => InboundEvent::PresenceUpdate(parse_or_default(&frame.data)?),
            EVENT_RANKED_UPDATE => InboundEvent::RankedUpdate(parse_or_default(&frame.data)?),
            EVENT_NOTIFICATION_UPDATE => InboundEvent::NotificationUpdate,
            EVENT_NEW_MESSAGE => InboundEvent::NewMessage(serde_json::from_str(&frame.data)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    /// Debounce family of the event; chat messages are never debounced.
    pub fn category(&self) -> Option<EventCategory> {
        match self {
            InboundEvent::PresenceUpdate(_) => Some(EventCategory::Presence),
            InboundEvent::RankedUpdate(_) => Some(EventCategory::Ranked),
            InboundEvent::NotificationUpdate => Some(EventCategory::Notification),
            InboundEvent::NewMessage(_) => None,
        }
    }

    /// Court the event is about. `None` means it may affect every surface.
    pub fn subject(&self) -> Option<CourtId> {
        match self {
            InboundEvent::PresenceUpdate(update) => update.court_id,
            InboundEvent::RankedUpdate(update) => update.court_id,
            InboundEvent::NotificationUpdate => None,
            InboundEvent::NewMessage(message) => message.court_id,
        }
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::PresenceUpdate(_) => EVENT_PRESENCE_UPDATE,
            InboundEvent::RankedUpdate(_) => EVENT_RANKED_UPDATE,
            InboundEvent::NotificationUpdate => EVENT_NOTIFICATION_UPDATE,
            InboundEvent::NewMessage(_) => EVENT_NEW_MESSAGE,
        }
    }
}

fn parse_or_default<T>(data: &str) -> serde_json::Result<T>
where
    T: DeserializeOwned + Default,
{
    if data.trim().is_empty() {
        Ok(T::default())
    } else {
        serde_json::from_str(data)
    }
}
