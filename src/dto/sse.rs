use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dao::models::{CourtId, MessageId},
    dto::{
        chat::RenderedMessage, events::EventCategory, presence::PresenceSnapshot,
        surfaces::SurfaceKind,
    },
};

pub const VIEW_REFRESH: &str = "refresh";
pub const VIEW_MESSAGE: &str = "message";
pub const VIEW_PRESENCE: &str = "presence";
pub const VIEW_NOTICE: &str = "notice";
pub const VIEW_HANDSHAKE: &str = "handshake";
pub const VIEW_STATUS: &str = "status";

#[derive(Clone, Debug, PartialEq, Eq)]
/// Frame carried by an event stream, in either direction.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Build a frame from its raw parts.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to a view client when it connects.
pub struct Handshake {
    pub stream: String,
    /// Identifier of this subscription, echoed in bridge logs.
    pub connection_id: String,
    pub message: String,
    /// Whether the upstream event stream is currently disconnected.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the upstream event stream connects or drops.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
/// Instruction to reload one visible surface.
pub struct RefreshEvent {
    pub surface: SurfaceKind,
    /// Court the refreshed surface is bound to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub court_id: Option<CourtId>,
    pub category: EventCategory,
    /// Court named by the event that triggered the refresh.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<CourtId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
/// A message appended to an open conversation surface.
pub struct MessageEvent {
    pub surface: String,
    pub message: RenderedMessage,
    /// Identifiers dropped from the front of the buffer by this insertion.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub evicted: Vec<MessageId>,
    pub anchor_to_bottom: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast whenever the local presence state changes.
pub struct PresenceChangedEvent(pub PresenceSnapshot);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
/// Transient user-facing notification.
pub struct NoticeEvent {
    pub level: NoticeLevel,
    pub message: String,
}

impl NoticeEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}
