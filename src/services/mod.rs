/// Conversation surface operations exposed to the view layer.
pub mod chat_service;
/// Debounced fan-out of server events to visible surfaces.
pub mod coalescer;
/// OpenAPI documentation generation.
pub mod documentation;
/// Single-task owner of presence, refresh and chat state.
pub mod engine;
/// Server event stream supervision and reconnection.
pub mod event_stream;
/// Health check service.
pub mod health_service;
/// Open conversations and their render buffers.
pub mod message_stream;
/// Position and manual presence operations.
pub mod presence_service;
/// Sync session lifecycle and command handle.
pub mod session;
/// Credential and visible-surface bookkeeping.
pub mod session_service;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
#[cfg(test)]
pub(crate) mod test_support;
/// View-facing output of the engine.
pub mod view_events;
