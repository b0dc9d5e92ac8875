use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Server-side identifier of a court.
pub type CourtId = i64;
/// Server-side identifier of a play session.
pub type PlaySessionId = i64;
/// Server-side identifier of a chat message.
pub type MessageId = i64;

/// Court snapshot as returned by the courts listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Court {
    /// Stable identifier for the court.
    pub id: CourtId,
    /// Display name of the court.
    #[serde(default)]
    pub name: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// Authoritative presence status reported by the server.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresenceStatus {
    /// Whether the account is currently checked in anywhere.
    pub checked_in: bool,
    /// Court the account is checked in at, when `checked_in` is true.
    #[serde(default)]
    pub court_id: Option<CourtId>,
}

impl PresenceStatus {
    /// Court the server considers active, if any.
    pub fn active_court(&self) -> Option<CourtId> {
        if self.checked_in { self.court_id } else { None }
    }
}

/// Conversation a chat message belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ConversationScope {
    /// Court-wide chat room.
    Court(CourtId),
    /// Chat attached to a scheduled play session.
    Session(PlaySessionId),
}

impl ConversationScope {
    /// Wire value of the `msg_type` field for this conversation.
    pub fn msg_type(&self) -> &'static str {
        match self {
            ConversationScope::Court(_) => "court",
            ConversationScope::Session(_) => "session",
        }
    }

    /// Key of the conversation surface, e.g. `court-3` or `session-12`.
    pub fn surface_key(&self) -> String {
        match self {
            ConversationScope::Court(id) => format!("court-{id}"),
            ConversationScope::Session(id) => format!("session-{id}"),
        }
    }

    /// Parse a key produced by [`ConversationScope::surface_key`].
    pub fn from_surface_key(key: &str) -> Option<Self> {
        let (kind, id) = key.split_once('-')?;
        let id = id.parse().ok()?;
        match kind {
            "court" => Some(ConversationScope::Court(id)),
            "session" => Some(ConversationScope::Session(id)),
            _ => None,
        }
    }
}

/// Author details embedded in chat messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageSender {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Chat message as delivered by the bulk fetch or the event stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub content: String,
    #[serde(default)]
    pub msg_type: Option<String>,
    #[serde(default)]
    pub court_id: Option<CourtId>,
    #[serde(default)]
    pub session_id: Option<PlaySessionId>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub sender: Option<MessageSender>,
}

impl ChatMessage {
    /// Resolve the conversation this message is addressed to.
    ///
    /// Direct and legacy game messages have no conversation surface and yield `None`.
    pub fn scope(&self) -> Option<ConversationScope> {
        match self.msg_type.as_deref().unwrap_or("court") {
            "court" => self.court_id.map(ConversationScope::Court),
            "session" => self.session_id.map(ConversationScope::Session),
            _ => None,
        }
    }

    /// Name shown next to the message.
    pub fn sender_display_name(&self) -> String {
        self.sender
            .as_ref()
            .and_then(|sender| {
                sender
                    .name
                    .clone()
                    .filter(|name| !name.is_empty())
                    .or_else(|| sender.username.clone())
            })
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Chat message authored locally and waiting to be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub scope: ConversationScope,
    pub content: String,
}

/// Why a presence ping is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingSource {
    /// Periodic heartbeat while checked in.
    Interval,
    /// Session resumed and wants to confirm the check-in.
    Sync,
}

impl PingSource {
    /// Wire value of the `source` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            PingSource::Interval => "interval",
            PingSource::Sync => "sync",
        }
    }
}
