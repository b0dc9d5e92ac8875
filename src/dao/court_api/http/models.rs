use serde::{Deserialize, Serialize};

use crate::dao::models::{ChatMessage, ConversationScope, Court, CourtId, OutgoingMessage};

/// Envelope of `GET /api/courts`.
#[derive(Debug, Deserialize)]
pub struct CourtsResponse {
    #[serde(default)]
    pub courts: Vec<Court>,
}

/// Envelope of the chat history endpoints.
#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// Envelope of `POST /api/chat/send`.
#[derive(Debug, Deserialize)]
pub struct SentMessageResponse {
    pub message: ChatMessage,
}

/// Error body the server attaches to rejected requests.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckInBody {
    pub court_id: CourtId,
}

#[derive(Debug, Serialize)]
pub struct EmptyBody {}

#[derive(Debug, Serialize)]
pub struct PingBody {
    pub court_id: CourtId,
    pub source: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SendMessageBody {
    pub content: String,
    pub msg_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub court_id: Option<CourtId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<i64>,
}

impl From<OutgoingMessage> for SendMessageBody {
    fn from(message: OutgoingMessage) -> Self {
        let (court_id, session_id) = match message.scope {
            ConversationScope::Court(id) => (Some(id), None),
            ConversationScope::Session(id) => (None, Some(id)),
        };
        Self {
            content: message.content,
            msg_type: message.scope.msg_type(),
            court_id,
            session_id,
        }
    }
}

/// Path of the chat history endpoint for a conversation.
pub fn history_path(scope: ConversationScope) -> String {
    match scope {
        ConversationScope::Court(id) => format!("api/chat/court/{id}"),
        ConversationScope::Session(id) => format!("api/chat/session/{id}"),
    }
}
