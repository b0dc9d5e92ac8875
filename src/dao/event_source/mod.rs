pub mod decoder;

use futures::{future::BoxFuture, stream::BoxStream};

use crate::{dao::transport::TransportResult, dto::events::InboundEvent};

/// Stream of decoded server-pushed events for one connection.
pub type EventStream = BoxStream<'static, TransportResult<InboundEvent>>;

/// Persistent push channel from the court-finder service.
///
/// Each call opens a fresh connection authenticated with `token`; callers
/// reconnect by calling it again with the then-current credential.
pub trait EventSource: Send + Sync {
    fn connect(&self, token: String) -> BoxFuture<'static, TransportResult<EventStream>>;
}
