//! In-memory collaborators shared by service tests.

use std::sync::{Arc, Mutex};

use futures::future::{self, BoxFuture};

use crate::{
    config::AppConfig,
    dao::{
        court_api::CourtApi,
        credentials::Credentials,
        models::{
            ChatMessage, ConversationScope, Court, CourtId, OutgoingMessage, PingSource,
            PresenceStatus,
        },
        transport::{TransportError, TransportResult},
    },
    dto::{
        presence::PresenceSnapshot,
        sse::{MessageEvent, NoticeEvent, RefreshEvent},
    },
    services::{
        session::{SessionDeps, SyncSession},
        view_events::{ViewBroadcaster, ViewSink},
    },
    state::{AppState, SharedState, SseHub, surfaces::SurfaceRegistry},
};

/// Court service that accepts every presence action and echoes sent messages.
#[derive(Default)]
pub struct StubApi {
    pub courts: Mutex<Vec<Court>>,
    pub history: Mutex<Vec<ChatMessage>>,
}

impl StubApi {
    pub fn with_courts(courts: Vec<Court>) -> Self {
        Self {
            courts: Mutex::new(courts),
            ..Self::default()
        }
    }
}

impl CourtApi for StubApi {
    fn list_courts(&self) -> BoxFuture<'static, TransportResult<Vec<Court>>> {
        let courts = self.courts.lock().unwrap().clone();
        Box::pin(future::ready(Ok(courts)))
    }

    fn check_in(&self, _court_id: CourtId) -> BoxFuture<'static, TransportResult<()>> {
        Box::pin(future::ready(Ok(())))
    }

    fn check_out(&self) -> BoxFuture<'static, TransportResult<()>> {
        Box::pin(future::ready(Ok(())))
    }

    fn presence_status(&self) -> BoxFuture<'static, TransportResult<PresenceStatus>> {
        Box::pin(future::ready(Ok(PresenceStatus::default())))
    }

    fn presence_ping(
        &self,
        court_id: CourtId,
        _source: PingSource,
    ) -> BoxFuture<'static, TransportResult<PresenceStatus>> {
        Box::pin(future::ready(Ok(PresenceStatus {
            checked_in: true,
            court_id: Some(court_id),
        })))
    }

    fn conversation_messages(
        &self,
        _scope: ConversationScope,
    ) -> BoxFuture<'static, TransportResult<Vec<ChatMessage>>> {
        let history = self.history.lock().unwrap().clone();
        Box::pin(future::ready(Ok(history)))
    }

    fn send_message(
        &self,
        message: OutgoingMessage,
    ) -> BoxFuture<'static, TransportResult<ChatMessage>> {
        let (court_id, session_id) = match message.scope {
            ConversationScope::Court(id) => (Some(id), None),
            ConversationScope::Session(id) => (None, Some(id)),
        };
        let result = if message.content.len() > 500 {
            Err(TransportError::Rejected {
                message: "Message too long".into(),
            })
        } else {
            Ok(ChatMessage {
                id: 9_000,
                content: message.content,
                msg_type: Some(message.scope.msg_type().to_string()),
                court_id,
                session_id,
                created_at: None,
                sender: None,
            })
        };
        Box::pin(future::ready(result))
    }
}

/// View sink that drops everything.
pub struct NullView;

impl ViewSink for NullView {
    fn refresh(&self, _event: RefreshEvent) {}
    fn message(&self, _event: MessageEvent) {}
    fn presence(&self, _snapshot: PresenceSnapshot) {}
    fn notice(&self, _notice: NoticeEvent) {}
    fn stream_status(&self, _connected: bool) {}
}

/// Application state backed by `api`, without an upstream event stream.
pub fn shared_state(api: StubApi, token: Option<&str>) -> SharedState {
    let config = AppConfig::default();
    let credentials = Credentials::new(token.map(str::to_string));
    let surfaces = Arc::new(SurfaceRegistry::new());
    let hub = SseHub::new(16);
    let session = SyncSession::start(SessionDeps {
        tuning: config.sync.clone(),
        api: Arc::new(api),
        events: None,
        credentials: credentials.clone(),
        surfaces: surfaces.clone(),
        view: Arc::new(ViewBroadcaster::new(hub.clone())),
    });
    AppState::new(config, credentials, surfaces, hub, session)
}
