//! Open conversation surfaces and their render buffers.

use std::collections::HashMap;

use tracing::debug;

use crate::{
    dao::models::{ChatMessage, ConversationScope},
    dto::{
        chat::{ConversationResponse, RenderedMessage},
        sse::MessageEvent,
    },
    state::messages::{MessageStream, ReportedViewport, Viewport},
};

struct OpenConversation {
    stream: MessageStream,
    viewport: ReportedViewport,
}

impl OpenConversation {
    fn view(&self) -> ConversationResponse {
        let scope = self.stream.scope();
        ConversationResponse {
            surface: scope.surface_key(),
            scope,
            loaded: self.stream.is_loaded(),
            messages: self.stream.snapshot(),
        }
    }
}

/// Every conversation surface currently open in the view layer.
pub struct Conversations {
    limit: usize,
    anchor_threshold_px: f64,
    open: HashMap<ConversationScope, OpenConversation>,
}

impl Conversations {
    pub fn new(limit: usize, anchor_threshold_px: f64) -> Self {
        Self {
            limit,
            anchor_threshold_px,
            open: HashMap::new(),
        }
    }

    /// Open a surface. Re-opening keeps the existing buffer; returns `true` when new.
    pub fn open(&mut self, scope: ConversationScope) -> bool {
        if self.open.contains_key(&scope) {
            return false;
        }
        self.open.insert(
            scope,
            OpenConversation {
                stream: MessageStream::new(scope, self.limit, self.anchor_threshold_px),
                viewport: ReportedViewport::default(),
            },
        );
        true
    }

    pub fn close(&mut self, scope: ConversationScope) -> bool {
        self.open.remove(&scope).is_some()
    }

    pub fn close_all(&mut self) -> usize {
        let count = self.open.len();
        self.open.clear();
        count
    }

    pub fn report_viewport(&mut self, scope: ConversationScope, viewport: Viewport) -> bool {
        match self.open.get_mut(&scope) {
            Some(conversation) => {
                conversation.viewport.report(viewport);
                true
            }
            None => false,
        }
    }

    /// Merge the bulk history of an open surface. `None` when it was closed meanwhile.
    pub fn seed(
        &mut self,
        scope: ConversationScope,
        history: &[ChatMessage],
    ) -> Option<ConversationResponse> {
        let conversation = self.open.get_mut(&scope)?;
        let rendered = history.iter().map(RenderedMessage::from).collect();
        let evicted = conversation.stream.seed(rendered);
        debug!(
            surface = %scope.surface_key(),
            fetched = history.len(),
            evicted = evicted.len(),
            "merged conversation history"
        );
        Some(conversation.view())
    }

    /// Route a pushed or freshly sent message to its surface.
    ///
    /// Returns the render instruction when the message was appended; messages for
    /// closed surfaces and duplicates yield `None`.
    pub fn deliver(&mut self, message: &ChatMessage) -> Option<MessageEvent> {
        let scope = message.scope()?;
        let conversation = self.open.get_mut(&scope)?;
        let rendered = RenderedMessage::from(message);
        let outcome = conversation
            .stream
            .insert(rendered.clone(), &mut conversation.viewport);
        if !outcome.inserted {
            debug!(id = message.id, surface = %scope.surface_key(), "duplicate message suppressed");
            return None;
        }

        Some(MessageEvent {
            surface: scope.surface_key(),
            message: rendered,
            evicted: outcome.evicted,
            anchor_to_bottom: outcome.anchored,
        })
    }

    pub fn view(&self, scope: ConversationScope) -> Option<ConversationResponse> {
        self.open.get(&scope).map(OpenConversation::view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::messages::{MESSAGE_BUFFER_LIMIT, SCROLL_ANCHOR_THRESHOLD_PX};

    fn court_message(id: i64, court_id: i64) -> ChatMessage {
        ChatMessage {
            id,
            content: format!("msg {id}"),
            msg_type: Some("court".into()),
            court_id: Some(court_id),
            session_id: None,
            created_at: None,
            sender: None,
        }
    }

    fn conversations() -> Conversations {
        Conversations::new(MESSAGE_BUFFER_LIMIT, SCROLL_ANCHOR_THRESHOLD_PX)
    }

    #[test]
    fn messages_for_closed_surfaces_are_dropped() {
        let mut conversations = conversations();
        assert!(conversations.deliver(&court_message(1, 3)).is_none());

        conversations.open(ConversationScope::Court(3));
        assert!(conversations.deliver(&court_message(2, 4)).is_none());
        let event = conversations.deliver(&court_message(3, 3)).unwrap();
        assert_eq!(event.surface, "court-3");
        assert!(event.anchor_to_bottom);
    }

    #[test]
    fn fetch_then_push_renders_once() {
        let mut conversations = conversations();
        let scope = ConversationScope::Court(3);
        conversations.open(scope);

        let view = conversations.seed(scope, &[court_message(41, 3), court_message(42, 3)]).unwrap();
        assert!(view.loaded);
        assert!(conversations.deliver(&court_message(42, 3)).is_none());
        assert_eq!(conversations.view(scope).unwrap().messages.len(), 2);
    }

    #[test]
    fn scrolled_up_reader_is_not_anchored() {
        let mut conversations = conversations();
        let scope = ConversationScope::Court(3);
        conversations.open(scope);
        conversations.report_viewport(
            scope,
            Viewport {
                scroll_top: 100.0,
                scroll_height: 1_000.0,
                client_height: 400.0,
            },
        );
        let event = conversations.deliver(&court_message(1, 3)).unwrap();
        assert!(!event.anchor_to_bottom);
    }

    #[test]
    fn seeding_a_closed_surface_is_ignored() {
        let mut conversations = conversations();
        let scope = ConversationScope::Session(5);
        conversations.open(scope);
        assert!(conversations.close(scope));
        assert!(conversations.seed(scope, &[]).is_none());
        assert!(!conversations.report_viewport(scope, Viewport::default()));
    }
}
