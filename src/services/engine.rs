//! Session engine: the single task that owns the presence tracker, the event
//! coalescer and the open conversations.
//!
//! Every mutation goes through [`SessionCommand`]s or through completions of the
//! network requests the engine spawned itself, so none of the state needs a lock.

use std::{sync::Arc, time::SystemTime};

use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinSet,
    time::{Instant, MissedTickBehavior, interval, interval_at, sleep_until},
};
use tracing::{debug, info, warn};

use crate::{
    config::SyncTuning,
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
        chat::{ConversationResponse, RenderedMessage},
        events::{EventCategory, InboundEvent},
        presence::PresenceSnapshot,
        sse::NoticeEvent,
    },
    error::{ServiceError, ServiceResult},
    services::{
        coalescer::{EventCoalescer, RefreshContext},
        message_stream::Conversations,
        view_events::ViewSink,
    },
    state::{
        geo::PositionSample,
        messages::Viewport,
        surfaces::SurfaceVisibility,
        tracker::{Evaluation, GeoPresenceTracker, PresenceIntent},
    },
};

type Reply<T> = oneshot::Sender<T>;

/// Requests accepted by the session engine.
pub enum SessionCommand {
    Position(PositionSample),
    SensorUnavailable,
    StopWatch { reply: Reply<bool> },
    StartWatch { reply: Reply<bool> },
    Inbound(InboundEvent),
    /// Re-read the authoritative presence and refresh every visible surface.
    Reconcile,
    OpenConversation {
        scope: ConversationScope,
        reply: Reply<ServiceResult<ConversationResponse>>,
    },
    CloseConversation {
        scope: ConversationScope,
        reply: Reply<bool>,
    },
    Conversation {
        scope: ConversationScope,
        reply: Reply<Option<ConversationResponse>>,
    },
    Viewport {
        scope: ConversationScope,
        viewport: Viewport,
        reply: Reply<bool>,
    },
    Send {
        message: OutgoingMessage,
        reply: Reply<ServiceResult<RenderedMessage>>,
    },
    CheckIn {
        court_id: Option<CourtId>,
        reply: Reply<ServiceResult<PresenceSnapshot>>,
    },
    CheckOut {
        reply: Reply<ServiceResult<PresenceSnapshot>>,
    },
    Presence { reply: Reply<PresenceSnapshot> },
}

/// Result of a request spawned by the engine.
enum Completion {
    Courts(TransportResult<Vec<Court>>),
    Status {
        /// Tracker version when the request went out.
        version: usize,
        result: TransportResult<PresenceStatus>,
    },
    AutoAction {
        intent: PresenceIntent,
        result: TransportResult<()>,
    },
    Heartbeat {
        court_id: CourtId,
        result: TransportResult<PresenceStatus>,
    },
    History {
        scope: ConversationScope,
        result: TransportResult<Vec<ChatMessage>>,
        reply: Reply<ServiceResult<ConversationResponse>>,
    },
    Manual {
        target: Option<CourtId>,
        previous: Option<CourtId>,
        result: TransportResult<()>,
        reply: Reply<ServiceResult<PresenceSnapshot>>,
    },
    Sent {
        result: TransportResult<ChatMessage>,
        reply: Reply<ServiceResult<RenderedMessage>>,
    },
}

pub(crate) struct SessionEngine {
    tuning: SyncTuning,
    api: Arc<dyn CourtApi>,
    credentials: Credentials,
    surfaces: Arc<dyn SurfaceVisibility>,
    view: Arc<dyn ViewSink>,
    tracker: GeoPresenceTracker,
    coalescer: EventCoalescer,
    conversations: Conversations,
    /// Requests are tagged with the credential epoch they were issued under.
    tasks: JoinSet<(u64, Completion)>,
    epoch: u64,
    courts_in_flight: bool,
    status_in_flight: bool,
    heartbeat_in_flight: bool,
    seen_version: usize,
    changed_at: Option<SystemTime>,
}

impl SessionEngine {
    pub(crate) fn new(
        tuning: SyncTuning,
        api: Arc<dyn CourtApi>,
        credentials: Credentials,
        surfaces: Arc<dyn SurfaceVisibility>,
        view: Arc<dyn ViewSink>,
    ) -> Self {
        let tracker = GeoPresenceTracker::new(tuning.presence.clone());
        let seen_version = tracker.version();
        Self {
            coalescer: EventCoalescer::new(tuning.debounce),
            conversations: Conversations::new(
                tuning.message_buffer_limit,
                tuning.scroll_anchor_threshold_px,
            ),
            tuning,
            api,
            credentials,
            surfaces,
            view,
            tracker,
            tasks: JoinSet::new(),
            epoch: 0,
            courts_in_flight: false,
            status_in_flight: false,
            heartbeat_in_flight: false,
            seen_version,
            changed_at: None,
        }
    }

    /// Drive the engine until shutdown is signalled or every handle is dropped.
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut credentials = self.credentials.subscribe();
        let mut court_refresh = interval(self.tuning.court_refresh_interval);
        court_refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut heartbeat = interval_at(
            Instant::now() + self.tuning.heartbeat_interval,
            self.tuning.heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.tracker.set_auto_enabled(self.credentials.is_present());
        info!(
            authenticated = self.credentials.is_present(),
            "sync session started"
        );
        self.request_status();

        loop {
            let deadline = self.coalescer.next_deadline();
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => match joined {
                    Ok((epoch, completion)) => self.handle_completion(epoch, completion),
                    Err(err) => warn!(error = %err, "background request task failed"),
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.flush_refreshes();
                }
                _ = court_refresh.tick() => self.request_courts(),
                _ = heartbeat.tick() => self.send_heartbeat(PingSource::Interval),
                changed = credentials.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let present = credentials.borrow_and_update().is_some();
                    self.on_credential_changed(present);
                }
            }
        }

        let cancelled = self.coalescer.cancel_all();
        let closed = self.conversations.close_all();
        self.tasks.shutdown().await;
        info!(cancelled, closed, "sync session stopped");
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Position(sample) => self.on_position(sample),
            SessionCommand::SensorUnavailable => {
                let before = self.snapshot();
                self.tracker.mark_unavailable();
                info!("location unavailable; presence is manual only");
                self.sync_view(&before);
            }
            SessionCommand::StopWatch { reply } => {
                let before = self.snapshot();
                let stopped = self.tracker.stop_watch();
                self.sync_view(&before);
                let _ = reply.send(stopped);
            }
            SessionCommand::StartWatch { reply } => {
                let before = self.snapshot();
                let started = self.tracker.start_watch();
                self.sync_view(&before);
                let _ = reply.send(started);
            }
            SessionCommand::Inbound(InboundEvent::NewMessage(message)) => {
                self.deliver_message(&message);
            }
            SessionCommand::Inbound(event) => {
                debug!(event = event.name(), subject = ?event.subject(), "server event received");
                self.coalescer.push(event, Instant::now());
            }
            SessionCommand::Reconcile => {
                self.request_status();
                let now = Instant::now();
                for category in [
                    EventCategory::Presence,
                    EventCategory::Ranked,
                    EventCategory::Notification,
                ] {
                    self.coalescer
                        .schedule(category, RefreshContext::default(), now);
                }
            }
            SessionCommand::OpenConversation { scope, reply } => {
                self.open_conversation(scope, reply);
            }
            SessionCommand::CloseConversation { scope, reply } => {
                let closed = self.conversations.close(scope);
                if closed {
                    debug!(surface = %scope.surface_key(), "conversation closed");
                }
                let _ = reply.send(closed);
            }
            SessionCommand::Conversation { scope, reply } => {
                let _ = reply.send(self.conversations.view(scope));
            }
            SessionCommand::Viewport {
                scope,
                viewport,
                reply,
            } => {
                let _ = reply.send(self.conversations.report_viewport(scope, viewport));
            }
            SessionCommand::Send { message, reply } => self.send_message(message, reply),
            SessionCommand::CheckIn { court_id, reply } => self.manual_check_in(court_id, reply),
            SessionCommand::CheckOut { reply } => self.manual_check_out(reply),
            SessionCommand::Presence { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn handle_completion(&mut self, epoch: u64, completion: Completion) {
        let current = epoch == self.epoch;
        match completion {
            Completion::Courts(result) => {
                self.courts_in_flight = false;
                match result {
                    Ok(courts) => {
                        let before = self.snapshot();
                        debug!(count = courts.len(), "court list refreshed");
                        self.tracker.replace_courts(courts);
                        self.sync_view(&before);
                    }
                    Err(err) => debug!(error = %err, "failed to refresh court list; keeping previous"),
                }
            }
            Completion::Status { version, result } => {
                self.status_in_flight = false;
                if !current {
                    debug!("dropping presence status issued under a previous credential");
                    self.request_status();
                    return;
                }
                match result {
                    Ok(status) if version != self.tracker.version() => {
                        debug!(
                            server = ?status.active_court(),
                            local = ?self.tracker.checked_in_court(),
                            "local presence changed while status was pending; keeping it"
                        );
                    }
                    Ok(status) => {
                        let before = self.snapshot();
                        if self.tracker.reconcile(status) {
                            info!(court_id = ?status.active_court(), "presence reconciled with server");
                        }
                        self.sync_view(&before);
                        if self.tracker.checked_in_court().is_some() {
                            self.send_heartbeat(PingSource::Sync);
                        }
                    }
                    Err(err) => self.on_request_failed(err, "presence reconciliation failed", current),
                }
            }
            Completion::AutoAction { intent, result } => {
                if current {
                    self.on_auto_action(intent, result);
                } else {
                    debug!(court_id = intent.court_id(), "dropping automatic presence reply from a previous credential");
                }
            }
            Completion::Heartbeat { court_id, result } => {
                self.heartbeat_in_flight = false;
                if !current {
                    return;
                }
                match result {
                    Ok(status) => {
                        if self.tracker.checked_in_court() != Some(court_id) {
                            // Presence moved on while the ping was in flight.
                            return;
                        }
                        if status.active_court() != Some(court_id) {
                            let before = self.snapshot();
                            info!(court_id, server = ?status.active_court(), "heartbeat disagrees with local presence");
                            self.tracker.reconcile(status);
                            self.sync_view(&before);
                        }
                    }
                    Err(err) => self.on_request_failed(err, "presence heartbeat failed", current),
                }
            }
            Completion::History {
                scope,
                result,
                reply,
            } => {
                let response = match result {
                    Ok(history) => self
                        .conversations
                        .seed(scope, &history)
                        .ok_or_else(|| ServiceError::NotFound(format!(
                            "conversation {} was closed",
                            scope.surface_key()
                        ))),
                    Err(err) => {
                        if err.is_unauthorized() {
                            self.reject_credential(current);
                        } else {
                            warn!(surface = %scope.surface_key(), error = %err, "failed to load conversation history");
                        }
                        Err(err.into())
                    }
                };
                let _ = reply.send(response);
            }
            Completion::Manual {
                target,
                previous,
                result,
                reply,
            } => {
                if !current {
                    debug!(court_id = ?target, "credential changed while manual presence action was pending");
                    let _ = reply.send(Err(ServiceError::Unauthorized(
                        "credential changed while the request was pending".into(),
                    )));
                    return;
                }
                let response = match result {
                    Ok(()) => {
                        let before = self.snapshot();
                        self.tracker.adopt(target, Instant::now());
                        self.sync_view(&before);
                        let (subject, action) = match target {
                            Some(court_id) => (Some(court_id), "checkin"),
                            None => (previous, "checkout"),
                        };
                        self.coalescer.schedule(
                            EventCategory::Presence,
                            RefreshContext::about(subject, Some(action.to_string())),
                            Instant::now(),
                        );
                        if target.is_some() {
                            self.send_heartbeat(PingSource::Sync);
                        }
                        info!(court_id = ?target, "manual presence action confirmed");
                        Ok(self.snapshot())
                    }
                    Err(err) => {
                        let failed = if target.is_some() { "Check-in failed" } else { "Check-out failed" };
                        self.view.notice(NoticeEvent::error(failed));
                        if err.is_unauthorized() {
                            self.reject_credential(current);
                        } else {
                            warn!(court_id = ?target, error = %err, "manual presence action failed");
                        }
                        Err(err.into())
                    }
                };
                let _ = reply.send(response);
            }
            Completion::Sent { result, reply } => {
                let response = match result {
                    Ok(message) => {
                        let rendered = RenderedMessage::from(&message);
                        self.deliver_message(&message);
                        Ok(rendered)
                    }
                    Err(err) => {
                        self.view.notice(NoticeEvent::error("Message failed to send"));
                        if err.is_unauthorized() {
                            self.reject_credential(current);
                        } else {
                            warn!(error = %err, "failed to send chat message");
                        }
                        Err(err.into())
                    }
                };
                let _ = reply.send(response);
            }
        }
    }

    fn on_position(&mut self, sample: PositionSample) {
        let before = self.snapshot();
        match self.tracker.observe(sample, Instant::now()) {
            Evaluation::Ignored(reason) => debug!(?reason, "position sample ignored"),
            Evaluation::Hold(reason) => debug!(?reason, "presence unchanged"),
            Evaluation::Intent(intent) => self.dispatch_intent(intent),
        }
        self.sync_view(&before);
    }

    fn dispatch_intent(&mut self, intent: PresenceIntent) {
        let request = match &intent {
            PresenceIntent::CheckIn { court, distance_m } => {
                info!(court_id = court.id, distance_m, "automatic check-in");
                self.api.check_in(court.id)
            }
            PresenceIntent::CheckOut {
                court_id,
                distance_m,
            } => {
                info!(court_id, distance_m = ?distance_m, "automatic check-out");
                self.api.check_out()
            }
        };
        self.spawn_request(async move {
            let result = request.await;
            Completion::AutoAction { intent, result }
        });
    }

    fn on_auto_action(&mut self, intent: PresenceIntent, result: TransportResult<()>) {
        match result {
            Ok(()) => {
                let (notice, action) = match &intent {
                    PresenceIntent::CheckIn { court, .. } => {
                        (format!("Checked in at {}", court.name), "checkin")
                    }
                    PresenceIntent::CheckOut { court_id, .. } => {
                        let notice = match self.tracker.court(*court_id) {
                            Some(court) => format!("Checked out of {}", court.name),
                            None => "Checked out".to_string(),
                        };
                        (notice, "checkout")
                    }
                };
                self.view.notice(NoticeEvent::info(notice));
                self.coalescer.schedule(
                    EventCategory::Presence,
                    RefreshContext::about(Some(intent.court_id()), Some(action.to_string())),
                    Instant::now(),
                );
                if matches!(intent, PresenceIntent::CheckIn { .. }) {
                    self.send_heartbeat(PingSource::Sync);
                }
            }
            // The local transition stands; the next sample or reconcile corrects it.
            Err(err) => self.on_request_failed(err, "automatic presence request failed", true),
        }
    }

    fn open_conversation(
        &mut self,
        scope: ConversationScope,
        reply: Reply<ServiceResult<ConversationResponse>>,
    ) {
        if !self.credentials.is_present() {
            let _ = reply.send(Err(ServiceError::Unauthorized("sign in to chat".into())));
            return;
        }
        if self.conversations.open(scope) {
            debug!(surface = %scope.surface_key(), "conversation opened");
        }
        let request = self.api.conversation_messages(scope);
        self.spawn_request(async move {
            let result = request.await;
            Completion::History {
                scope,
                result,
                reply,
            }
        });
    }

    fn send_message(
        &mut self,
        message: OutgoingMessage,
        reply: Reply<ServiceResult<RenderedMessage>>,
    ) {
        if !self.credentials.is_present() {
            let _ = reply.send(Err(ServiceError::Unauthorized("sign in to chat".into())));
            return;
        }
        if message.content.trim().is_empty() {
            let _ = reply.send(Err(ServiceError::InvalidInput(
                "message content is empty".into(),
            )));
            return;
        }
        let request = self.api.send_message(message);
        self.spawn_request(async move {
            let result = request.await;
            Completion::Sent { result, reply }
        });
    }

    fn manual_check_in(
        &mut self,
        court_id: Option<CourtId>,
        reply: Reply<ServiceResult<PresenceSnapshot>>,
    ) {
        if !self.credentials.is_present() {
            let _ = reply.send(Err(ServiceError::Unauthorized(
                "sign in to check in".into(),
            )));
            return;
        }
        let Some(court_id) = court_id.or_else(|| self.tracker.nearby().map(|nearby| nearby.court_id))
        else {
            let _ = reply.send(Err(ServiceError::InvalidInput(
                "no court nearby; pass a court id".into(),
            )));
            return;
        };
        let previous = self.tracker.checked_in_court();
        let request = self.api.check_in(court_id);
        self.spawn_request(async move {
            let result = request.await;
            Completion::Manual {
                target: Some(court_id),
                previous,
                result,
                reply,
            }
        });
    }

    fn manual_check_out(&mut self, reply: Reply<ServiceResult<PresenceSnapshot>>) {
        if !self.credentials.is_present() {
            let _ = reply.send(Err(ServiceError::Unauthorized(
                "sign in to check out".into(),
            )));
            return;
        }
        let previous = self.tracker.checked_in_court();
        let request = self.api.check_out();
        self.spawn_request(async move {
            let result = request.await;
            Completion::Manual {
                target: None,
                previous,
                result,
                reply,
            }
        });
    }

    fn deliver_message(&mut self, message: &ChatMessage) {
        if let Some(event) = self.conversations.deliver(message) {
            self.view.message(event);
        }
    }

    fn flush_refreshes(&mut self) {
        for refresh in self
            .coalescer
            .fire_due(Instant::now(), self.surfaces.as_ref())
        {
            self.view.refresh(refresh);
        }
    }

    fn request_courts(&mut self) {
        if self.courts_in_flight {
            return;
        }
        self.courts_in_flight = true;
        let request = self.api.list_courts();
        self.spawn_request(async move { Completion::Courts(request.await) });
    }

    fn request_status(&mut self) {
        if !self.credentials.is_present() {
            let before = self.snapshot();
            self.tracker.reset();
            self.sync_view(&before);
            return;
        }
        if self.status_in_flight {
            return;
        }
        self.status_in_flight = true;
        let version = self.tracker.version();
        let request = self.api.presence_status();
        self.spawn_request(async move {
            let result = request.await;
            Completion::Status { version, result }
        });
    }

    fn send_heartbeat(&mut self, source: PingSource) {
        let Some(court_id) = self.tracker.checked_in_court() else {
            return;
        };
        if self.heartbeat_in_flight || !self.credentials.is_present() {
            return;
        }
        self.heartbeat_in_flight = true;
        debug!(court_id, source = source.as_str(), "sending presence heartbeat");
        let request = self.api.presence_ping(court_id, source);
        self.spawn_request(async move {
            let result = request.await;
            Completion::Heartbeat { court_id, result }
        });
    }

    fn spawn_request<F>(&mut self, request: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let epoch = self.epoch;
        self.tasks.spawn(async move { (epoch, request.await) });
    }

    fn on_credential_changed(&mut self, present: bool) {
        self.epoch += 1;
        self.tracker.set_auto_enabled(present);
        if present {
            info!("credential set; reconciling presence");
            self.request_status();
            self.request_courts();
        } else {
            info!("credential cleared; resetting presence");
            let before = self.snapshot();
            self.tracker.reset();
            self.sync_view(&before);
        }
    }

    fn on_request_failed(&mut self, err: TransportError, context: &'static str, current: bool) {
        if err.is_unauthorized() {
            self.reject_credential(current);
        } else {
            debug!(error = %err, "{context}");
        }
    }

    /// A 401 only clears the credential the request was issued under.
    fn reject_credential(&mut self, current: bool) {
        if current {
            self.clear_stale_credential();
        } else {
            debug!("ignoring rejection of a replaced credential");
        }
    }

    fn clear_stale_credential(&mut self) {
        warn!("credential rejected by court service; clearing session");
        self.credentials.clear();
        self.on_credential_changed(false);
    }

    fn snapshot(&self) -> PresenceSnapshot {
        self.tracker.snapshot().stamp(self.changed_at)
    }

    /// Publish the presence snapshot when it differs from `before`.
    fn sync_view(&mut self, before: &PresenceSnapshot) {
        if self.tracker.version() != self.seen_version {
            self.seen_version = self.tracker.version();
            self.changed_at = Some(SystemTime::now());
        }
        let after = self.snapshot();
        if after != *before {
            self.view.presence(after);
        }
    }
}
