#[cfg(feature = "http-transport")]
pub mod http;

use futures::future::BoxFuture;

use crate::dao::{
    models::{
        ChatMessage, ConversationScope, Court, CourtId, OutgoingMessage, PingSource,
        PresenceStatus,
    },
    transport::TransportResult,
};

/// Request/response operations the sync engine needs from the court-finder service.
pub trait CourtApi: Send + Sync {
    fn list_courts(&self) -> BoxFuture<'static, TransportResult<Vec<Court>>>;
    fn check_in(&self, court_id: CourtId) -> BoxFuture<'static, TransportResult<()>>;
    fn check_out(&self) -> BoxFuture<'static, TransportResult<()>>;
    fn presence_status(&self) -> BoxFuture<'static, TransportResult<PresenceStatus>>;
    fn presence_ping(
        &self,
        court_id: CourtId,
        source: PingSource,
    ) -> BoxFuture<'static, TransportResult<PresenceStatus>>;
    fn conversation_messages(
        &self,
        scope: ConversationScope,
    ) -> BoxFuture<'static, TransportResult<Vec<ChatMessage>>>;
    fn send_message(
        &self,
        message: OutgoingMessage,
    ) -> BoxFuture<'static, TransportResult<ChatMessage>>;
}
