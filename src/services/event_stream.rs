use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use tokio::{sync::watch, time::sleep};
use tracing::{debug, info, warn};

use crate::{
    dao::{credentials::Credentials, event_source::EventSource},
    services::{session::SessionHandle, view_events::ViewSink},
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);

enum StreamEnd {
    Shutdown,
    CredentialChanged,
    Dropped,
}

fn set_connected(connected: &watch::Sender<bool>, view: &dyn ViewSink, value: bool) {
    if connected.send_replace(value) != value {
        view.stream_status(value);
    }
}

/// Keep the server event stream connected for as long as a credential is set.
///
/// Reconnects with exponential backoff, restarts when the credential changes and
/// clears the credential when the server rejects it.
pub async fn supervise(
    source: Arc<dyn EventSource>,
    credentials: Credentials,
    session: SessionHandle,
    view: Arc<dyn ViewSink>,
    connected: watch::Sender<bool>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tokens = credentials.subscribe();
    let mut delay = INITIAL_DELAY;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let token = tokens.borrow_and_update().clone();
        let Some(token) = token else {
            debug!("no credential; event stream idle");
            let stop = tokio::select! {
                _ = shutdown.changed() => true,
                changed = tokens.changed() => changed.is_err(),
            };
            if stop {
                break;
            }
            delay = INITIAL_DELAY;
            continue;
        };

        let outcome = tokio::select! {
            _ = shutdown.changed() => break,
            changed = tokens.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            outcome = source.connect(token) => outcome,
        };

        match outcome {
            Ok(mut stream) => {
                info!("event stream connected");
                delay = INITIAL_DELAY;
                set_connected(&connected, view.as_ref(), true);
                if session.reconcile().is_err() {
                    break;
                }

                let end = loop {
                    tokio::select! {
                        _ = shutdown.changed() => break StreamEnd::Shutdown,
                        changed = tokens.changed() => {
                            if changed.is_err() {
                                break StreamEnd::Shutdown;
                            }
                            break StreamEnd::CredentialChanged;
                        }
                        item = stream.next() => match item {
                            Some(Ok(event)) => {
                                if session.push_event(event).is_err() {
                                    break StreamEnd::Shutdown;
                                }
                            }
                            Some(Err(err)) if err.is_unauthorized() => {
                                warn!("event stream rejected the credential; clearing session");
                                credentials.clear();
                                break StreamEnd::CredentialChanged;
                            }
                            Some(Err(err)) => {
                                warn!(error = %err, "event stream interrupted");
                                break StreamEnd::Dropped;
                            }
                            None => {
                                info!("event stream closed by server");
                                break StreamEnd::Dropped;
                            }
                        },
                    }
                };

                set_connected(&connected, view.as_ref(), false);
                match end {
                    StreamEnd::Shutdown => break,
                    StreamEnd::CredentialChanged => {
                        info!("credential changed; restarting event stream");
                        continue;
                    }
                    StreamEnd::Dropped => {}
                }
            }
            Err(err) if err.is_unauthorized() => {
                warn!("event stream rejected the credential; clearing session");
                credentials.clear();
                continue;
            }
            Err(err) => {
                warn!(
                    error = %err,
                    retry_in_ms = delay.as_millis() as u64,
                    "event stream connection failed"
                );
            }
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            changed = tokens.changed() => {
                if changed.is_err() {
                    break;
                }
                delay = INITIAL_DELAY;
                continue;
            }
            _ = sleep(delay) => {}
        }
        delay = (delay * 2).min(MAX_DELAY);
    }

    set_connected(&connected, view.as_ref(), false);
    info!("event stream supervisor stopped");
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use futures::{
        future::{self, BoxFuture},
        stream,
    };
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        dao::{
            event_source::EventStream,
            transport::{TransportError, TransportResult},
        },
        dto::{
            events::InboundEvent,
            presence::PresenceSnapshot,
            sse::{MessageEvent, NoticeEvent, RefreshEvent},
        },
        services::engine::SessionCommand,
    };

    /// Scripted connection outcomes; once exhausted every connect stays pending.
    #[derive(Default)]
    struct ScriptedSource {
        script: Mutex<VecDeque<TransportResult<Vec<InboundEvent>>>>,
        tokens: Mutex<Vec<String>>,
        attempts: AtomicUsize,
    }

    impl ScriptedSource {
        fn with(script: Vec<TransportResult<Vec<InboundEvent>>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                ..Self::default()
            })
        }
    }

    impl EventSource for ScriptedSource {
        fn connect(&self, token: String) -> BoxFuture<'static, TransportResult<EventStream>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.tokens.lock().unwrap().push(token);
            match self.script.lock().unwrap().pop_front() {
                Some(Ok(events)) => {
                    let stream: EventStream = stream::iter(events.into_iter().map(Ok)).boxed();
                    Box::pin(future::ready(Ok(stream)))
                }
                Some(Err(err)) => Box::pin(future::ready(Err(err))),
                None => Box::pin(future::pending()),
            }
        }
    }

    #[derive(Default)]
    struct StatusView {
        statuses: Mutex<Vec<bool>>,
    }

    impl ViewSink for StatusView {
        fn refresh(&self, _event: RefreshEvent) {}
        fn message(&self, _event: MessageEvent) {}
        fn presence(&self, _snapshot: PresenceSnapshot) {}
        fn notice(&self, _notice: NoticeEvent) {}
        fn stream_status(&self, connected: bool) {
            self.statuses.lock().unwrap().push(connected);
        }
    }

    struct Harness {
        source: Arc<ScriptedSource>,
        view: Arc<StatusView>,
        credentials: Credentials,
        commands: mpsc::UnboundedReceiver<SessionCommand>,
        shutdown: watch::Sender<bool>,
        task: tokio::task::JoinHandle<()>,
    }

    fn spawn(source: Arc<ScriptedSource>, token: Option<&str>) -> Harness {
        let view = Arc::new(StatusView::default());
        let credentials = Credentials::new(token.map(str::to_string));
        let (tx, commands) = mpsc::unbounded_channel();
        let (connected, _) = watch::channel(false);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(supervise(
            source.clone(),
            credentials.clone(),
            SessionHandle::new(tx),
            view.clone(),
            connected,
            shutdown_rx,
        ));
        Harness {
            source,
            view,
            credentials,
            commands,
            shutdown,
            task,
        }
    }

    fn drain(commands: &mut mpsc::UnboundedReceiver<SessionCommand>) -> Vec<SessionCommand> {
        let mut received = Vec::new();
        while let Ok(command) = commands.try_recv() {
            received.push(command);
        }
        received
    }

    fn unavailable() -> TransportError {
        TransportError::unavailable(
            "connection refused".into(),
            std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn idles_until_a_credential_is_set() {
        let source = ScriptedSource::with(vec![Ok(Vec::new())]);
        let harness = spawn(source, None);
        sleep(Duration::from_secs(30)).await;
        assert_eq!(harness.source.attempts.load(Ordering::SeqCst), 0);

        harness.credentials.set("fresh");
        sleep(Duration::from_millis(1)).await;
        assert_eq!(*harness.source.tokens.lock().unwrap(), vec!["fresh".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_forwards_events_after_reconcile() {
        let source = ScriptedSource::with(vec![Ok(vec![
            InboundEvent::NotificationUpdate,
            InboundEvent::NotificationUpdate,
        ])]);
        let mut harness = spawn(source, Some("t"));
        sleep(Duration::from_millis(1)).await;

        let commands = drain(&mut harness.commands);
        assert_eq!(commands.len(), 3);
        assert!(matches!(commands[0], SessionCommand::Reconcile));
        assert!(matches!(
            commands[1],
            SessionCommand::Inbound(InboundEvent::NotificationUpdate)
        ));
        // Connected, then dropped when the scripted stream ended.
        assert_eq!(*harness.view.statuses.lock().unwrap(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connects_back_off_exponentially() {
        let source = ScriptedSource::with(vec![
            Err(unavailable()),
            Err(unavailable()),
            Err(unavailable()),
        ]);
        let harness = spawn(source, Some("t"));

        sleep(Duration::from_millis(500)).await;
        assert_eq!(harness.source.attempts.load(Ordering::SeqCst), 1);
        // Retries after 1 s, then 2 s.
        sleep(Duration::from_millis(600)).await;
        assert_eq!(harness.source.attempts.load(Ordering::SeqCst), 2);
        sleep(Duration::from_millis(1_500)).await;
        assert_eq!(harness.source.attempts.load(Ordering::SeqCst), 2);
        sleep(Duration::from_millis(600)).await;
        assert_eq!(harness.source.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_credential_is_cleared() {
        let source = ScriptedSource::with(vec![Err(TransportError::Unauthorized {
            message: "expired".into(),
        })]);
        let harness = spawn(source, Some("stale"));
        sleep(Duration::from_millis(1)).await;

        assert!(!harness.credentials.is_present());
        sleep(Duration::from_secs(30)).await;
        assert_eq!(harness.source.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_a_pending_connect() {
        let source = ScriptedSource::with(Vec::new());
        let harness = spawn(source, Some("t"));
        sleep(Duration::from_millis(1)).await;
        assert_eq!(harness.source.attempts.load(Ordering::SeqCst), 1);

        harness.shutdown.send_replace(true);
        harness.task.await.unwrap();
    }
}
