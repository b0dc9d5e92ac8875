use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::{ChatMessage, ConversationScope, MessageId},
    dto::validation::validate_surface_key,
};

/// Path segment naming a conversation surface, e.g. `court-3`.
#[derive(Debug, Deserialize, Validate)]
pub struct SurfacePath {
    #[validate(custom(function = "validate_surface_key"))]
    pub key: String,
}

impl SurfacePath {
    pub fn scope(&self) -> Option<ConversationScope> {
        ConversationScope::from_surface_key(&self.key)
    }
}

/// Request to open (or re-open) a conversation surface.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OpenConversationRequest {
    pub scope: ConversationScope,
}

/// Request to close a conversation surface.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CloseConversationRequest {
    pub scope: ConversationScope,
}

/// User-authored chat message.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SendMessageRequest {
    pub scope: ConversationScope,
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
}

/// Render-ready chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RenderedMessage {
    /// Stable identifier, unique within a conversation buffer.
    pub id: MessageId,
    pub sender: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl From<&ChatMessage> for RenderedMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            id: message.id,
            sender: message.sender_display_name(),
            content: message.content.clone(),
            created_at: message.created_at.clone(),
        }
    }
}

/// Current render buffer of a conversation surface.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationResponse {
    pub surface: String,
    pub scope: ConversationScope,
    /// Whether the initial history fetch has completed.
    pub loaded: bool,
    pub messages: Vec<RenderedMessage>,
}

/// Result of a successful send.
#[derive(Debug, Serialize, ToSchema)]
pub struct SentMessageResponse {
    pub message: RenderedMessage,
}

#[cfg(test)]
mod tests {
    use validator::Validate;

    use super::*;

    #[test]
    fn empty_message_is_rejected() {
        let request = SendMessageRequest {
            scope: ConversationScope::Court(1),
            content: String::new(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn scope_deserializes_from_tagged_object() {
        let request: OpenConversationRequest =
            serde_json::from_str(r#"{"scope":{"kind":"session","id":12}}"#).unwrap();
        assert_eq!(request.scope, ConversationScope::Session(12));
    }

    #[test]
    fn surface_path_resolves_scope() {
        let path = SurfacePath {
            key: "session-12".into(),
        };
        assert!(path.validate().is_ok());
        assert_eq!(path.scope(), Some(ConversationScope::Session(12)));

        let path = SurfacePath {
            key: "direct-4".into(),
        };
        assert!(path.validate().is_err());
    }
}
