//! Lifecycle of a client sync session and the handle used to talk to it.

use std::sync::Arc;

use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{info, warn};

use crate::{
    config::SyncTuning,
    dao::{
        court_api::CourtApi,
        credentials::Credentials,
        event_source::EventSource,
        models::{ConversationScope, CourtId, OutgoingMessage},
    },
    dto::{
        chat::{ConversationResponse, RenderedMessage},
        events::InboundEvent,
        presence::PresenceSnapshot,
    },
    error::{ServiceError, ServiceResult},
    services::{
        engine::{SessionCommand, SessionEngine},
        event_stream,
        view_events::ViewSink,
    },
    state::{geo::PositionSample, messages::Viewport, surfaces::SurfaceVisibility},
};

/// Cloneable entry point into a running session engine.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<SessionCommand>) -> Self {
        Self { tx }
    }

    fn send(&self, command: SessionCommand) -> ServiceResult<()> {
        self.tx
            .send(command)
            .map_err(|_| ServiceError::SessionStopped)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> ServiceResult<T> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply))?;
        rx.await.map_err(|_| ServiceError::SessionStopped)
    }

    /// Feed a position sample to the presence tracker.
    pub fn submit_position(&self, sample: PositionSample) -> ServiceResult<()> {
        self.send(SessionCommand::Position(sample))
    }

    /// Report that the platform cannot provide positions.
    pub fn sensor_unavailable(&self) -> ServiceResult<()> {
        self.send(SessionCommand::SensorUnavailable)
    }

    pub async fn stop_watch(&self) -> ServiceResult<bool> {
        self.request(|reply| SessionCommand::StopWatch { reply }).await
    }

    pub async fn start_watch(&self) -> ServiceResult<bool> {
        self.request(|reply| SessionCommand::StartWatch { reply }).await
    }

    /// Hand a server-pushed event to the engine.
    pub fn push_event(&self, event: InboundEvent) -> ServiceResult<()> {
        self.send(SessionCommand::Inbound(event))
    }

    /// Ask the engine to re-read authoritative state, e.g. after a reconnect.
    pub fn reconcile(&self) -> ServiceResult<()> {
        self.send(SessionCommand::Reconcile)
    }

    /// Open a conversation surface and wait for its history.
    pub async fn open_conversation(
        &self,
        scope: ConversationScope,
    ) -> ServiceResult<ConversationResponse> {
        self.request(|reply| SessionCommand::OpenConversation { scope, reply })
            .await?
    }

    pub async fn close_conversation(&self, scope: ConversationScope) -> ServiceResult<bool> {
        self.request(|reply| SessionCommand::CloseConversation { scope, reply })
            .await
    }

    pub async fn conversation(
        &self,
        scope: ConversationScope,
    ) -> ServiceResult<Option<ConversationResponse>> {
        self.request(|reply| SessionCommand::Conversation { scope, reply })
            .await
    }

    pub async fn report_viewport(
        &self,
        scope: ConversationScope,
        viewport: Viewport,
    ) -> ServiceResult<bool> {
        self.request(|reply| SessionCommand::Viewport {
            scope,
            viewport,
            reply,
        })
        .await
    }

    pub async fn send_message(&self, message: OutgoingMessage) -> ServiceResult<RenderedMessage> {
        self.request(|reply| SessionCommand::Send { message, reply })
            .await?
    }

    /// Manual check-in; without a court the nearest known one is used.
    pub async fn check_in(&self, court_id: Option<CourtId>) -> ServiceResult<PresenceSnapshot> {
        self.request(|reply| SessionCommand::CheckIn { court_id, reply })
            .await?
    }

    pub async fn check_out(&self) -> ServiceResult<PresenceSnapshot> {
        self.request(|reply| SessionCommand::CheckOut { reply })
            .await?
    }

    pub async fn presence(&self) -> ServiceResult<PresenceSnapshot> {
        self.request(|reply| SessionCommand::Presence { reply })
            .await
    }
}

/// Collaborators of a sync session.
pub struct SessionDeps {
    pub tuning: SyncTuning,
    pub api: Arc<dyn CourtApi>,
    /// Push channel; without one the session only reacts to local input.
    pub events: Option<Arc<dyn EventSource>>,
    pub credentials: Credentials,
    pub surfaces: Arc<dyn SurfaceVisibility>,
    pub view: Arc<dyn ViewSink>,
}

/// A running session: the engine task plus the event stream supervisor.
pub struct SyncSession {
    handle: SessionHandle,
    shutdown: watch::Sender<bool>,
    connected: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncSession {
    /// Spawn the engine (and the event stream supervisor when a source is given).
    pub fn start(deps: SessionDeps) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (connected_tx, connected) = watch::channel(false);
        let handle = SessionHandle::new(tx);

        let engine = SessionEngine::new(
            deps.tuning,
            deps.api,
            deps.credentials.clone(),
            deps.surfaces,
            deps.view.clone(),
        );
        let mut tasks = vec![tokio::spawn(engine.run(rx, shutdown_rx.clone()))];

        match deps.events {
            Some(source) => tasks.push(tokio::spawn(event_stream::supervise(
                source,
                deps.credentials,
                handle.clone(),
                deps.view,
                connected_tx,
                shutdown_rx,
            ))),
            None => info!("no event source configured; server pushes disabled"),
        }

        Self {
            handle,
            shutdown,
            connected,
            tasks,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn connection(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    /// Cancel every timer, stream and in-flight request. Calling it again is a no-op.
    pub async fn stop(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        self.shutdown.send_replace(true);
        for task in self.tasks.drain(..) {
            if let Err(err) = task.await {
                warn!(error = %err, "sync session task ended abnormally");
            }
        }
        info!("sync session shut down");
    }
}
